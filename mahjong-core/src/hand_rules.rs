//! Win-shape predicates (spec §3 "Hand Rules").
//!
//! This module answers one question only: *is this collection of tiles a
//! complete (or tenpai, or kokushi-eligible) hand shape?* It does not score
//! anything - see [`crate::scoring`] for that, and it is deliberately not a
//! full competition-grade decomposer: standard-shape decomposition here is a
//! direct recursive search over melds-plus-pair, not the lookup-table
//! approach a full engine would use, since nothing downstream needs the
//! complete waiting-tile enumeration at million-hands-per-second speed.

use crate::meld::Meld;
use crate::tile::{NUM_TILE_TYPES, Tile, TileCounts};

/// Checks whether `counts` decomposes fully into sets of three (runs or
/// triplets) plus exactly one pair, given `melds_already_called` completed
/// sets that don't need re-checking.
pub fn is_standard_winning_shape(hand: &[Tile], called_melds: &[Meld]) -> bool {
    let needed_sets = 4usize.saturating_sub(called_melds.len());
    let mut counts = TileCounts::from_tiles(hand.iter().copied());
    if counts.total() as usize != needed_sets * 3 + 2 {
        return false;
    }
    decompose(&mut counts.counts, needed_sets, true)
}

/// Recursive search: consumes one pair (if `allow_pair`) or one run/triplet
/// from the lowest remaining tile kind, then recurses. `counts` is mutated
/// and restored in place (backtracking) rather than cloned, since hands are
/// at most 14 tiles and the search tree is shallow.
fn decompose(counts: &mut [u8; NUM_TILE_TYPES as usize], sets_needed: usize, allow_pair: bool) -> bool {
    if sets_needed == 0 {
        return !allow_pair || counts.iter().all(|&c| c == 0);
    }
    let Some(kind) = counts.iter().position(|&c| c > 0) else {
        return false;
    };

    // Try the pair first (only ever taken once, at any point where it's
    // still available).
    if allow_pair && counts[kind] >= 2 {
        counts[kind] -= 2;
        if decompose(counts, sets_needed, false) {
            counts[kind] += 2;
            return true;
        }
        counts[kind] += 2;
    }

    // Triplet.
    if counts[kind] >= 3 {
        counts[kind] -= 3;
        if decompose(counts, sets_needed - 1, allow_pair) {
            counts[kind] += 3;
            return true;
        }
        counts[kind] += 3;
    }

    // Run: only for suited tiles (kind < 27) not crossing a suit boundary,
    // and only within the same suit's nine ranks.
    if kind < 27 && kind % 9 <= 6 && counts[kind + 1] >= 1 && counts[kind + 2] >= 1 {
        counts[kind] -= 1;
        counts[kind + 1] -= 1;
        counts[kind + 2] -= 1;
        if decompose(counts, sets_needed - 1, allow_pair) {
            counts[kind] += 1;
            counts[kind + 1] += 1;
            counts[kind + 2] += 1;
            return true;
        }
        counts[kind] += 1;
        counts[kind + 1] += 1;
        counts[kind + 2] += 1;
    }

    false
}

/// Seven distinct pairs, no melds called.
pub fn is_chiitoitsu(hand: &[Tile], called_melds: &[Meld]) -> bool {
    if !called_melds.is_empty() || hand.len() != 14 {
        return false;
    }
    let counts = TileCounts::from_tiles(hand.iter().copied());
    counts.distinct_kinds() == 7 && counts.counts.iter().all(|&c| c == 0 || c == 2)
}

const KOKUSHI_KINDS: [u8; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

/// Thirteen orphans: one of every terminal/honor, plus a pair of one of them.
pub fn is_kokushi(hand: &[Tile], called_melds: &[Meld]) -> bool {
    if !called_melds.is_empty() || hand.len() != 14 {
        return false;
    }
    let counts = TileCounts::from_tiles(hand.iter().copied());
    let mut has_pair = false;
    for kind in 0..NUM_TILE_TYPES {
        let c = counts.get(kind);
        if KOKUSHI_KINDS.contains(&kind) {
            if c == 0 {
                return false;
            }
            if c == 2 {
                has_pair = true;
            }
        } else if c > 0 {
            return false;
        }
    }
    has_pair
}

pub fn is_winning_hand(hand: &[Tile], called_melds: &[Meld]) -> bool {
    is_kokushi(hand, called_melds)
        || is_chiitoitsu(hand, called_melds)
        || is_standard_winning_shape(hand, called_melds)
}

/// True if adding `candidate` to `hand` produces a winning hand.
pub fn can_win_with(hand: &[Tile], called_melds: &[Meld], candidate: Tile) -> bool {
    let mut extended = hand.to_vec();
    extended.push(candidate);
    is_winning_hand(&extended, called_melds)
}

/// All tile kinds (0..34, one representative [`Tile`] per kind) that would
/// complete `hand` if drawn or claimed.
pub fn waiting_tiles(hand: &[Tile], called_melds: &[Meld]) -> Vec<Tile> {
    let mut waits = Vec::new();
    for kind in 0..NUM_TILE_TYPES {
        let candidate = Tile::new(kind * 4);
        if can_win_with(hand, called_melds, candidate) {
            waits.push(candidate);
        }
    }
    waits
}

/// Tenpai: one tile away from winning (concealed hand one short, given
/// already-called melds).
pub fn is_tenpai(hand: &[Tile], called_melds: &[Meld]) -> bool {
    !waiting_tiles(hand, called_melds).is_empty()
}

/// Kyuushu kyuuhai eligibility: a first-turn, no-calls-yet hand holding nine
/// or more distinct terminal/honor kinds.
pub fn is_kyuushu_kyuuhai_eligible(hand: &[Tile]) -> bool {
    let counts = TileCounts::from_tiles(hand.iter().copied());
    let distinct_terminal_honor = (0..NUM_TILE_TYPES)
        .filter(|&k| KOKUSHI_KINDS.contains(&k) && counts.get(k) > 0)
        .count();
    distinct_terminal_honor >= 9
}

/// Whether `tile` would complete `hand` via chankan (robbing a kan): same
/// predicate as a normal ron wait, evaluated against the pre-kan hand.
pub fn can_chankan(hand: &[Tile], called_melds: &[Meld], robbed_tile: Tile) -> bool {
    can_win_with(hand, called_melds, robbed_tile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: u8) -> Tile {
        Tile::new(id)
    }

    #[test]
    fn recognizes_a_simple_four_sets_plus_pair_hand() {
        // 123m 456p 789s 111z(honor triplet) + 22m pair
        let hand = vec![
            t(0), t(4), t(8), // 1m2m3m
            t(12 * 4 + 0), t(13 * 4 + 0), t(14 * 4 + 0), // 4p5p6p
            t(24 * 4 + 0), t(25 * 4 + 0), t(26 * 4 + 0), // 7s8s9s
            t(27 * 4 + 0), t(27 * 4 + 1), t(27 * 4 + 2), // East triplet
            t(1 * 4 + 0), t(1 * 4 + 1), // pair of 2m
        ];
        assert!(is_standard_winning_shape(&hand, &[]));
    }

    #[test]
    fn recognizes_chiitoitsu() {
        let kinds = [0u8, 5, 9, 14, 18, 22, 27];
        let hand: Vec<Tile> = kinds.iter().flat_map(|&k| [t(k * 4), t(k * 4 + 1)]).collect();
        assert!(is_chiitoitsu(&hand, &[]));
        assert!(!is_standard_winning_shape(&hand, &[]));
    }

    #[test]
    fn recognizes_kokushi() {
        let mut hand: Vec<Tile> = KOKUSHI_KINDS.iter().map(|&k| t(k * 4)).collect();
        hand.push(t(0 * 4 + 1)); // pair the 1m
        assert!(is_kokushi(&hand, &[]));
    }

    #[test]
    fn tenpai_detects_a_single_tile_short_hand() {
        // 123m 456p 789s 111z + single 2m, waiting on the 2m pair.
        let hand = vec![
            t(0), t(4), t(8),
            t(12 * 4), t(13 * 4), t(14 * 4),
            t(24 * 4), t(25 * 4), t(26 * 4),
            t(27 * 4), t(27 * 4 + 1), t(27 * 4 + 2),
            t(1 * 4),
        ];
        assert!(is_tenpai(&hand, &[]));
        assert!(waiting_tiles(&hand, &[]).iter().any(|w| w.kind() == 1));
    }
}
