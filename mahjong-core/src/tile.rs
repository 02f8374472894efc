//! Tile identity (spec §3).
//!
//! A [`Tile`] is a small integer in 0..135: four physical copies of each of
//! the 34 distinct tile types. `tile.kind()` (`tile_id / 4` in spec terms)
//! identifies the type; the tile id itself never changes once dealt, only
//! its location (wall, hand, meld, discard pile) does.

use serde::{Deserialize, Serialize};

pub const NUM_TILE_TYPES: u8 = 34;
pub const NUM_TILES: u16 = 136;

/// Suit grouping for a tile kind (0..34).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suit {
    Man,
    Pin,
    Sou,
    Honor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tile(pub u8);

impl Tile {
    pub fn new(id: u8) -> Self {
        debug_assert!((id as u16) < NUM_TILES);
        Tile(id)
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// The tile type in 0..34, shared by all four physical copies.
    pub fn kind(self) -> u8 {
        self.0 / 4
    }

    pub fn suit(self) -> Suit {
        match self.kind() {
            0..=8 => Suit::Man,
            9..=17 => Suit::Pin,
            18..=26 => Suit::Sou,
            _ => Suit::Honor,
        }
    }

    /// 1-indexed rank within the suit: 1..9 for suited tiles, 1..4 for winds
    /// (East, South, West, North) and 1..3 for dragons (Haku, Hatsu, Chun)
    /// when `suit() == Honor`.
    pub fn rank(self) -> u8 {
        match self.suit() {
            Suit::Man => self.kind() - 0 + 1,
            Suit::Pin => self.kind() - 9 + 1,
            Suit::Sou => self.kind() - 18 + 1,
            Suit::Honor => self.kind() - 27 + 1,
        }
    }

    pub fn is_wind(self) -> bool {
        matches!(self.suit(), Suit::Honor) && self.rank() <= 4
    }

    pub fn is_dragon(self) -> bool {
        matches!(self.suit(), Suit::Honor) && self.rank() > 4
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self.suit(), Suit::Honor) && (self.rank() == 1 || self.rank() == 9)
    }

    pub fn is_honor(self) -> bool {
        matches!(self.suit(), Suit::Honor)
    }

    pub fn is_terminal_or_honor(self) -> bool {
        self.is_terminal() || self.is_honor()
    }

    /// True if `self` and `other` are the same tile type (ignoring which of
    /// the four physical copies each is).
    pub fn same_kind(self, other: Tile) -> bool {
        self.kind() == other.kind()
    }
}

/// A fixed-size tile-type histogram: `counts[kind] == how many of that kind`.
/// Used pervasively for hand/meld validation instead of scanning `Vec<Tile>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCounts {
    pub counts: [u8; NUM_TILE_TYPES as usize],
}

impl TileCounts {
    pub fn from_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut counts = [0u8; NUM_TILE_TYPES as usize];
        for t in tiles {
            counts[t.kind() as usize] += 1;
        }
        TileCounts { counts }
    }

    pub fn get(&self, kind: u8) -> u8 {
        self.counts[kind as usize]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }

    pub fn distinct_kinds(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}
