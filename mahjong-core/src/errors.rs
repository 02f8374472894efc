//! Typed, closed error sets for every fallible pure-function entry point.

use thiserror::Error;

use crate::tile::Tile;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("seat {seat} is not the one awaited by the current phase")]
    NotAwaitingThisSeat { seat: u8 },
    #[error("seat {seat} tried to act outside its expected phase")]
    WrongPhase { seat: u8 },
    #[error("tile {0:?} is not in seat {1}'s hand")]
    TileNotInHand(Tile, u8),
    #[error("seat {seat} cannot discard: it has not drawn yet")]
    MustDrawFirst { seat: u8 },
    #[error("seat {seat} is in riichi and may only discard the drawn tile (tsumogiri)")]
    RiichiLocksDiscardChoice { seat: u8 },
    #[error("discard {tile:?} by seat {seat} violates kuikae after the preceding call")]
    KuikaeViolation { seat: u8, tile: Tile },
    #[error("seat {seat} already declared riichi")]
    AlreadyInRiichi { seat: u8 },
    #[error("seat {seat} cannot declare riichi: hand is not closed and tenpai on a discard")]
    RiichiNotEligible { seat: u8 },
    #[error("seat {seat} cannot declare riichi with fewer than 1000 points")]
    InsufficientScoreForRiichi { seat: u8 },
    #[error("seat {seat} cannot declare riichi with fewer than four live walls remaining")]
    InsufficientWallForRiichi { seat: u8 },
    #[error("seat {seat} cannot call pon on this tile")]
    InvalidPon { seat: u8 },
    #[error("seat {seat} cannot call chi on this tile")]
    InvalidChi { seat: u8 },
    #[error("seat {seat} cannot call kan with the given tiles")]
    InvalidKan { seat: u8 },
    #[error("seat {seat} is in furiten and may not declare ron")]
    Furiten { seat: u8 },
    #[error("seat {seat}'s hand is not a winning hand")]
    NotAWinningHand { seat: u8 },
    #[error("the wall is exhausted; no further draws are possible")]
    WallExhausted,
    #[error("round is not awaiting any call response right now")]
    NoPendingCall,
    #[error("seat {seat} already responded to this call window")]
    AlreadyResponded { seat: u8 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactionError {
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error("two or more seats declared a simultaneous kan (suukaikan ambiguity)")]
    ConflictingKanClaims,
}
