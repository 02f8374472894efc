//! Whole-game state (spec §3, §9 DESIGN NOTES).
//!
//! `GameState` is an immutable, copy-on-write snapshot: every transition in
//! [`crate::round`] takes one by value and returns the next one. There is no
//! interior mutability and no I/O anywhere in this crate.

use serde::{Deserialize, Serialize};

use crate::meld::Meld;
use crate::tile::Tile;
use crate::wall::Wall;

pub const NUM_SEATS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wind {
    East,
    South,
    West,
    North,
}

impl Wind {
    pub fn next(self) -> Wind {
        match self {
            Wind::East => Wind::South,
            Wind::South => Wind::West,
            Wind::West => Wind::North,
            Wind::North => Wind::East,
        }
    }
}

/// A discarded tile and whether it is still callable (not yet passed on by
/// everyone, and not already claimed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discard {
    pub tile: Tile,
    pub called: bool,
    /// True if discarded as a declared riichi tile (rotated, in real tables).
    pub riichi_declaration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub seat: u8,
    pub seat_wind: Wind,
    pub hand: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub discards: Vec<Discard>,
    pub score: i64,
    pub riichi: bool,
    pub riichi_declared_on_discard_index: Option<usize>,
    pub ippatsu_active: bool,
    pub double_riichi: bool,
    /// Temporary furiten: a winning tile passed this seat's ron window this
    /// go-around (cleared at the seat's next draw).
    pub temporary_furiten: bool,
    /// Riichi furiten: this seat was in riichi and passed one of its own
    /// waits. Unlike `temporary_furiten` this never clears for the rest of
    /// the round.
    pub riichi_furiten: bool,
    pub is_ai: bool,
    pub connected: bool,
    /// Tile kinds this seat may not discard on the very next discard, set by
    /// a just-completed pon/chi (kuikae) and cleared after that one discard.
    #[serde(default)]
    pub kuikae_forbidden_kinds: Vec<u8>,
}

impl Seat {
    pub fn new(seat: u8, seat_wind: Wind, starting_score: i64) -> Self {
        Seat {
            seat,
            seat_wind,
            hand: Vec::new(),
            melds: Vec::new(),
            discards: Vec::new(),
            score: starting_score,
            riichi: false,
            riichi_declared_on_discard_index: None,
            ippatsu_active: false,
            double_riichi: false,
            temporary_furiten: false,
            riichi_furiten: false,
            is_ai: false,
            connected: true,
            kuikae_forbidden_kinds: Vec::new(),
        }
    }

    pub fn in_furiten(&self) -> bool {
        self.riichi_furiten || self.temporary_furiten || self.has_discard_furiten()
    }

    /// Classic discard furiten: any of this seat's current waits already
    /// sits in its own discard pile. Re-evaluated against the live hand
    /// rather than latched, since the wait set can change turn to turn.
    fn has_discard_furiten(&self) -> bool {
        if self.discards.is_empty() {
            return false;
        }
        let waits = crate::hand_rules::waiting_tiles(&self.hand, &self.melds);
        if waits.is_empty() {
            return false;
        }
        self.discards.iter().any(|d| waits.iter().any(|w| w.kind() == d.tile.kind()))
    }

    pub fn is_closed(&self) -> bool {
        self.melds.iter().all(|m| !m.is_open())
    }
}

/// What the table is waiting on right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    AwaitingDraw { seat: u8 },
    AwaitingDiscard { seat: u8, drawn_from_wall: bool },
    /// One or more seats may call on the most recent discard; `responded`
    /// tracks who has already answered (pass or a pending call) so the
    /// resolver knows when every live seat has weighed in. Non-pass answers
    /// are buffered by the orchestrator and resolved by priority via
    /// [`crate::call_resolution`] before being applied here.
    AwaitingCallResponses {
        discarding_seat: u8,
        discarded_tile: Tile,
        eligible_seats: Vec<u8>,
        responded: Vec<u8>,
    },
    /// A closed/added kan was just declared; other seats may chankan-ron.
    AwaitingChankanResponses {
        kan_seat: u8,
        kan_tile: Tile,
        eligible_seats: Vec<u8>,
        responded: Vec<u8>,
    },
    RoundEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameRules {
    Hanchan,
    Tonpuusen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub rules: GameRules,
    pub starting_score: i64,
    pub kan_dora_revealed_immediately_for_closed_kan: bool,
    pub kan_dora_revealed_immediately_for_open_kan: bool,
    /// Minimum number of distinct seats that must each complete a kan for
    /// suukaikan (four-kans abortive draw) to trigger; when all four kans
    /// belong to one seat, the hand continues instead.
    pub four_kans_min_distinct_seats_to_continue: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rules: GameRules::Hanchan,
            starting_score: 25_000,
            kan_dora_revealed_immediately_for_closed_kan: true,
            kan_dora_revealed_immediately_for_open_kan: true,
            four_kans_min_distinct_seats_to_continue: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub round_wind: Wind,
    pub round_number: u8,
    pub honba: u32,
    pub riichi_sticks: u32,
    pub dealer_seat: u8,
    pub wall: Wall,
    pub phase: TurnPhase,
    pub current_discard_index: u32,
    /// Seats that have completed at least one kan this round, used for the
    /// suukaikan abortive-draw check.
    pub kan_seats: Vec<u8>,
    /// Total riichi declarations this round, for the four-riichi check.
    pub riichi_count: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub settings: Settings,
    pub seats: [Seat; NUM_SEATS],
    pub round: RoundState,
    pub game_over: bool,
}

impl GameState {
    pub fn seat(&self, seat: u8) -> &Seat {
        &self.seats[seat as usize]
    }

    pub fn seat_mut(&mut self, seat: u8) -> &mut Seat {
        &mut self.seats[seat as usize]
    }

    pub fn next_seat(seat: u8) -> u8 {
        (seat + 1) % NUM_SEATS as u8
    }
}
