//! Pure domain events emitted by a state transition.
//!
//! These are distinct from the wire-level `ServerEvent`s in the `protocol`
//! crate: orchestration code translates a `Vec<GameEvent>` into whatever
//! connections need to see, attaching seat-scoping and redaction along the
//! way. Nothing in this crate knows about sockets.

use serde::{Deserialize, Serialize};

use crate::meld::Meld;
use crate::state::Wind;
use crate::tile::Tile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortiveReason {
    FourWinds,
    FourKans,
    FourRiichi,
    TripleRon,
    KyuushuKyuuhai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundResult {
    Tsumo {
        winner: u8,
    },
    Ron {
        winner: u8,
        discarder: u8,
    },
    DoubleRon {
        winners: Vec<u8>,
        discarder: u8,
    },
    ExhaustiveDraw {
        tenpai_seats: Vec<u8>,
    },
    NagashiMangan {
        seat: u8,
    },
    AbortiveDraw {
        reason: AbortiveReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    TileDrawn { seat: u8 },
    TileDiscarded { seat: u8, tile: Tile, riichi_declaration: bool },
    MeldCalled { meld: Meld },
    DoraRevealed { indicators: Vec<Tile> },
    RiichiDeclared { seat: u8 },
    IppatsuCleared { seat: u8 },
    FuritenChanged { seat: u8, furiten: bool },
    RoundEnded { result: RoundResult, scores_delta: [i64; 4] },
    GameEnded { final_scores: [i64; 4], placements: [u8; 4] },
    /// Round advanced to the next dealer/round-wind combination, or the
    /// dealer repeated (honba incremented) without ending the game.
    RoundAdvanced { round_wind: Wind, round_number: u8, dealer_seat: u8, honba: u32 },
}
