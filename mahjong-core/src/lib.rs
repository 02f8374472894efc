//! Pure, synchronous Mahjong rules engine.
//!
//! Nothing in this crate touches a socket, a clock, or a mutex: every public
//! function is a plain state transition, `GameState -> Result<(GameState,
//! Vec<GameEvent>), _>`. Orchestration, networking, timers, and persistence
//! all live one level up; this crate only knows how a round of Mahjong is
//! played.

pub mod call_resolution;
pub mod errors;
pub mod events;
pub mod hand_rules;
pub mod meld;
pub mod round;
pub mod scoring;
pub mod state;
pub mod tile;
pub mod wall;

pub use errors::{ReactionError, RoundError};
pub use events::{AbortiveReason, GameEvent, RoundResult};
pub use meld::{Meld, SeatIndex};
pub use scoring::{HanFu, ScoreDelta, ScoringEngine, StandardScoringEngine};
pub use state::{Discard, GameRules, GameState, RoundState, Seat, Settings, TurnPhase, Wind, NUM_SEATS};
pub use tile::{NUM_TILES, NUM_TILE_TYPES, Tile, TileCounts};
pub use wall::{RNG_VERSION, Wall};

/// Builds a fresh `GameState` for a new hand: a freshly dealt wall, four
/// empty seats with 13-tile starting hands, and `AwaitingDraw` parked on the
/// dealer.
pub fn deal_new_round(
    game_id: impl Into<String>,
    settings: Settings,
    seed: u64,
    round_wind: Wind,
    round_number: u8,
    dealer_seat: u8,
    honba: u32,
    riichi_sticks: u32,
    starting_scores: [i64; 4],
) -> GameState {
    let mut wall = Wall::deal(seed);
    let seat_winds = [Wind::East, Wind::South, Wind::West, Wind::North];
    let mut seats: [Seat; 4] = std::array::from_fn(|i| {
        let wind_index = (4 + i as u8 - dealer_seat) % 4;
        Seat::new(i as u8, seat_winds[wind_index as usize], starting_scores[i])
    });
    for _ in 0..3 {
        for seat in seats.iter_mut() {
            for _ in 0..4 {
                if let Some(tile) = wall.draw() {
                    seat.hand.push(tile);
                }
            }
        }
    }
    for seat in seats.iter_mut() {
        if let Some(tile) = wall.draw() {
            seat.hand.push(tile);
        }
    }

    GameState {
        game_id: game_id.into(),
        settings,
        seats,
        round: RoundState {
            round_wind,
            round_number,
            honba,
            riichi_sticks,
            dealer_seat,
            wall,
            phase: TurnPhase::AwaitingDraw { seat: dealer_seat },
            current_discard_index: 0,
            kan_seats: Vec::new(),
            riichi_count: 0,
        },
        game_over: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_new_round_gives_every_seat_thirteen_tiles() {
        let state = deal_new_round("g1", Settings::default(), 42, Wind::East, 1, 0, 0, 0, [25_000; 4]);
        for seat in &state.seats {
            assert_eq!(seat.hand.len(), 13);
        }
        assert_eq!(state.round.phase, TurnPhase::AwaitingDraw { seat: 0 });
    }

    #[test]
    fn seat_winds_are_assigned_relative_to_the_dealer() {
        let state = deal_new_round("g1", Settings::default(), 1, Wind::East, 1, 2, 0, 0, [25_000; 4]);
        assert_eq!(state.seats[2].seat_wind, Wind::East);
        assert_eq!(state.seats[3].seat_wind, Wind::South);
    }
}
