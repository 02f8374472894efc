//! Melds (spec §3, GLOSSARY).

use serde::{Deserialize, Serialize};

use crate::tile::Tile;

pub type SeatIndex = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KanKind {
    Open,
    Closed,
    Added,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meld {
    /// Three tiles sharing one type, one called from a discard.
    Pon {
        owner: SeatIndex,
        tiles: [Tile; 3],
        called_tile: Tile,
        source_seat: SeatIndex,
    },
    /// Three consecutive tiles within one numbered suit, one called from
    /// the kamicha's discard.
    Chi {
        owner: SeatIndex,
        tiles: [Tile; 3],
        called_tile: Tile,
        source_seat: SeatIndex,
    },
    /// A four-tile kan of any kind.
    Kan {
        kind: KanKind,
        owner: SeatIndex,
        tiles: [Tile; 4],
        called_tile: Option<Tile>,
        source_seat: Option<SeatIndex>,
    },
}

impl Meld {
    pub fn owner(&self) -> SeatIndex {
        match self {
            Meld::Pon { owner, .. } | Meld::Chi { owner, .. } | Meld::Kan { owner, .. } => *owner,
        }
    }

    /// All tiles, including any melded-from tile, that belong to this meld.
    pub fn tiles(&self) -> Vec<Tile> {
        match self {
            Meld::Pon { tiles, .. } | Meld::Chi { tiles, .. } => tiles.to_vec(),
            Meld::Kan { tiles, .. } => tiles.to_vec(),
        }
    }

    /// Only the tiles consumed from the owner's own concealed hand (i.e.
    /// excluding the called tile for pon/chi/open-kan; a closed kan and an
    /// added kan's upgrade tile are fully/partially from hand).
    pub fn tiles_from_hand(&self) -> Vec<Tile> {
        match self {
            Meld::Pon { tiles, called_tile, .. } | Meld::Chi { tiles, called_tile, .. } => {
                tiles.iter().copied().filter(|t| t != called_tile).collect()
            }
            Meld::Kan { kind: KanKind::Closed, tiles, .. } => tiles.to_vec(),
            Meld::Kan { kind: KanKind::Added, tiles, called_tile, .. } => {
                // The added tile is the 4th physical tile, added from hand
                // on top of an existing pon; the other three came from the
                // earlier pon (one of which was itself a call).
                match called_tile {
                    Some(called) => {
                        let mut from_hand: Vec<Tile> = tiles.to_vec();
                        if let Some(pos) = from_hand.iter().position(|t| t == called) {
                            from_hand.remove(pos);
                        }
                        from_hand
                    }
                    None => tiles.to_vec(),
                }
            }
            Meld::Kan { kind: KanKind::Open, tiles, called_tile, .. } => {
                let mut from_hand: Vec<Tile> = tiles.to_vec();
                if let Some(called) = called_tile {
                    if let Some(pos) = from_hand.iter().position(|t| t == called) {
                        from_hand.remove(pos);
                    }
                }
                from_hand
            }
        }
    }

    pub fn is_kan(&self) -> bool {
        matches!(self, Meld::Kan { .. })
    }

    pub fn is_open(&self) -> bool {
        match self {
            Meld::Pon { .. } | Meld::Chi { .. } => true,
            Meld::Kan { kind, .. } => *kind != KanKind::Closed,
        }
    }

    /// The tile type this meld is built on (all melds but Chi are
    /// single-type; for Chi this is the lowest of the three ranks).
    pub fn kind34(&self) -> u8 {
        match self {
            Meld::Pon { tiles, .. } => tiles[0].kind(),
            Meld::Kan { tiles, .. } => tiles[0].kind(),
            Meld::Chi { tiles, .. } => tiles.iter().map(|t| t.kind()).min().unwrap(),
        }
    }
}

/// Validates a pon: the two non-called tiles must be in hand and share the
/// called tile's type.
pub fn validate_pon(hand: &[Tile], own0: Tile, own1: Tile, called: Tile) -> bool {
    own0.same_kind(called) && own1.same_kind(called) && own0 != own1
        && hand.iter().filter(|t| **t == own0).count() >= 1
        && hand.iter().filter(|t| **t == own1).count() >= 1
}

/// Validates a chi: `own0`/`own1` plus `called` must form three consecutive
/// ranks within one numbered suit.
pub fn validate_chi(own0: Tile, own1: Tile, called: Tile) -> bool {
    use crate::tile::Suit;
    if called.suit() == Suit::Honor {
        return false;
    }
    if own0.suit() != called.suit() || own1.suit() != called.suit() {
        return false;
    }
    let mut ranks = [own0.rank(), own1.rank(), called.rank()];
    ranks.sort_unstable();
    ranks[0] + 1 == ranks[1] && ranks[1] + 1 == ranks[2]
}

/// All `(own0, own1)` chi options kamicha's `called` tile admits, given the
/// responder's hand.
pub fn chi_options(hand: &[Tile], called: Tile) -> Vec<(Tile, Tile)> {
    use crate::tile::Suit;
    if called.suit() == Suit::Honor {
        return Vec::new();
    }
    let rank = called.rank() as i16;
    let mut options = Vec::new();
    // Three possible runs: called is low/mid/high of the sequence.
    for offsets in [[-2, -1], [-1, 1], [1, 2]] {
        let r0 = rank + offsets[0];
        let r1 = rank + offsets[1];
        if !(1..=9).contains(&r0) || !(1..=9).contains(&r1) {
            continue;
        }
        let kind0 = called.kind() as i16 - (rank - r0);
        let kind1 = called.kind() as i16 - (rank - r1);
        let find_tile = |kind: i16| hand.iter().copied().find(|t| t.kind() as i16 == kind);
        if let (Some(t0), Some(t1)) = (find_tile(kind0), find_tile(kind1)) {
            options.push((t0, t1));
        }
    }
    options
}
