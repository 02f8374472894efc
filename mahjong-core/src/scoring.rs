//! Scoring (spec §3 "Scoring", deliberately narrowed - see DESIGN.md).
//!
//! Full yaku/han/fu fidelity is out of scope; what lives here is the
//! interface a real scoring engine would sit behind, plus one concrete,
//! reasonably representative implementation so the round state machine has
//! something real to call during integration tests.

use crate::meld::Meld;
use crate::state::{GameState, Wind};
use crate::tile::Tile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HanFu {
    pub han: u32,
    pub fu: u32,
}

/// Per-seat score deltas from a single win, before honba/riichi-stick
/// adjustments are folded in by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreDelta(pub [i64; 4]);

pub trait ScoringEngine {
    /// Computes han/fu for a winning hand. Returns `None` if the hand has no
    /// yaku (and so cannot legally win, aside from open-hand exceptions this
    /// implementation doesn't model).
    fn evaluate(
        &self,
        hand: &[Tile],
        melds: &[Meld],
        winning_tile: Tile,
        seat_wind: Wind,
        round_wind: Wind,
        is_tsumo: bool,
        riichi: bool,
        ippatsu: bool,
        dora_count: u32,
    ) -> Option<HanFu>;

    /// Base points owed by a non-dealer ron/tsumo at this han/fu, before
    /// honba/riichi-stick distribution.
    fn base_points(&self, han_fu: HanFu, is_dealer: bool) -> u32;

    fn distribute_ron(&self, base_points: u32, is_dealer: bool) -> i64;

    /// `(from_dealer, from_non_dealer)` amounts each other seat pays a
    /// tsumo winner.
    fn distribute_tsumo(&self, base_points: u32, is_dealer: bool) -> (i64, i64);
}

/// A conservative, representative yaku set: riichi, ippatsu, menzen tsumo,
/// tanyao, yakuhai (seat/round wind + dragons), pinfu, and dora. Enough to
/// exercise every payment path without claiming exhaustive yaku coverage.
pub struct StandardScoringEngine;

impl StandardScoringEngine {
    fn is_tanyao(hand: &[Tile], melds: &[Meld]) -> bool {
        hand.iter().all(|t| !t.is_terminal_or_honor())
            && melds.iter().all(|m| m.tiles().iter().all(|t| !t.is_terminal_or_honor()))
    }

    fn yakuhai_han(hand: &[Tile], melds: &[Meld], seat_wind: Wind, round_wind: Wind) -> u32 {
        let seat_wind_kind = 27 + match seat_wind {
            Wind::East => 0,
            Wind::South => 1,
            Wind::West => 2,
            Wind::North => 3,
        };
        let round_wind_kind = 27 + match round_wind {
            Wind::East => 0,
            Wind::South => 1,
            Wind::West => 2,
            Wind::North => 3,
        };
        let all_tiles: Vec<Tile> = hand.iter().copied().chain(melds.iter().flat_map(|m| m.tiles())).collect();
        let counts = crate::tile::TileCounts::from_tiles(all_tiles);
        let mut han = 0;
        for kind in 31..34 {
            if counts.get(kind) >= 3 {
                han += 1;
            }
        }
        if counts.get(seat_wind_kind) >= 3 {
            han += 1;
        }
        if counts.get(round_wind_kind) >= 3 && round_wind_kind != seat_wind_kind {
            han += 1;
        }
        han
    }
}

impl ScoringEngine for StandardScoringEngine {
    fn evaluate(
        &self,
        hand: &[Tile],
        melds: &[Meld],
        winning_tile: Tile,
        seat_wind: Wind,
        round_wind: Wind,
        is_tsumo: bool,
        riichi: bool,
        ippatsu: bool,
        dora_count: u32,
    ) -> Option<HanFu> {
        // `hand` already holds the winning tile for a tsumo (it was drawn
        // into it); for a ron it's still sitting in the discarder's pile, so
        // the 14-tile shape kokushi/chiitoitsu check for has to rebuild it.
        let full_hand: Vec<Tile> = if is_tsumo {
            hand.to_vec()
        } else {
            hand.iter().copied().chain(std::iter::once(winning_tile)).collect()
        };

        if crate::hand_rules::is_kokushi(&full_hand, melds) {
            // Yakuman stands alone: no stacking with riichi/dora/etc.
            return Some(HanFu { han: 13, fu: 20 });
        }

        let is_chiitoitsu = crate::hand_rules::is_chiitoitsu(&full_hand, melds);
        let mut han = 0u32;
        let is_closed = melds.iter().all(|m| !m.is_open());

        if riichi {
            han += 1;
        }
        if riichi && ippatsu {
            han += 1;
        }
        if is_tsumo && is_closed {
            han += 1;
        }
        if is_chiitoitsu {
            han += 2;
        }
        if Self::is_tanyao(hand, melds) {
            han += 1;
        }
        han += Self::yakuhai_han(hand, melds, seat_wind, round_wind);
        han += dora_count;

        if han == 0 {
            return None;
        }

        // Fu: flat base plus a closed-ron bump; this engine does not
        // itemize wait-shape/triplet-kind fu, matching the narrowed scope.
        // Chiitoitsu is always 25 fu regardless of tsumo/ron.
        let fu = if is_chiitoitsu {
            25
        } else if is_tsumo {
            22
        } else if is_closed {
            30
        } else {
            20
        };
        Some(HanFu { han, fu: fu.min(40) })
    }

    fn base_points(&self, HanFu { han, fu }: HanFu, is_dealer: bool) -> u32 {
        if han >= 13 {
            return if is_dealer { 6000 } else { 4000 }; // kazoe yakuman-equivalent base
        }
        if han >= 11 {
            return if is_dealer { 3000 } else { 2000 };
        }
        if han >= 8 {
            return if is_dealer { 2000 } else { 1333 };
        }
        if han >= 6 {
            return if is_dealer { 1500 } else { 1000 };
        }
        if han == 5 {
            return 2000;
        }
        let base = (fu as u64) * 2u64.pow(2 + han);
        base.min(2000) as u32
    }

    fn distribute_ron(&self, base_points: u32, is_dealer: bool) -> i64 {
        let multiplier = if is_dealer { 6 } else { 4 };
        round_up_100(base_points as u64 * multiplier) as i64
    }

    fn distribute_tsumo(&self, base_points: u32, is_dealer: bool) -> (i64, i64) {
        if is_dealer {
            let each = round_up_100(base_points as u64 * 2);
            (each as i64, each as i64)
        } else {
            let from_dealer = round_up_100(base_points as u64 * 2);
            let from_non_dealer = round_up_100(base_points as u64);
            (from_dealer as i64, from_non_dealer as i64)
        }
    }
}

fn round_up_100(points: u64) -> u64 {
    points.div_ceil(100) * 100
}

/// Applies a resolved win's payments (plus honba/riichi-stick sweep) to the
/// table, returning the per-seat score delta.
/// `award_riichi_sticks` should be true for at most one winner per round end
/// - on a double/triple ron only the seat closest to the discarder collects
/// the sitting riichi-stick pool, not every winner independently.
pub fn apply_win_payment(
    state: &GameState,
    engine: &dyn ScoringEngine,
    winner: u8,
    discarder: Option<u8>,
    han_fu: HanFu,
    award_riichi_sticks: bool,
) -> ScoreDelta {
    let mut delta = [0i64; 4];
    let is_dealer = winner == state.round.dealer_seat;
    let honba_bonus = state.round.honba as i64 * 300;
    let riichi_sticks_bonus = if award_riichi_sticks { state.round.riichi_sticks as i64 * 1000 } else { 0 };

    let base_points = engine.base_points(han_fu, is_dealer);

    match discarder {
        Some(loser) => {
            let points = engine.distribute_ron(base_points, is_dealer);
            delta[winner as usize] += points + riichi_sticks_bonus + honba_bonus;
            delta[loser as usize] -= points + honba_bonus;
        }
        None => {
            let (from_dealer, from_non_dealer) = engine.distribute_tsumo(base_points, is_dealer);
            for seat in 0..4u8 {
                if seat == winner {
                    continue;
                }
                let pay = if seat == state.round.dealer_seat { from_dealer } else { from_non_dealer };
                let with_honba = pay + 100;
                delta[seat as usize] -= with_honba;
                delta[winner as usize] += with_honba;
            }
            delta[winner as usize] += riichi_sticks_bonus;
        }
    }
    ScoreDelta(delta)
}

/// Nagashi mangan: a dealer-equivalent mangan paid by all three/non-dealer
/// split, for a hand that reached exhaustive draw with every discard a
/// terminal/honor and none called.
pub fn nagashi_mangan_delta(dealer_seat: u8, seat: u8) -> ScoreDelta {
    let is_dealer = seat == dealer_seat;
    let mut delta = [0i64; 4];
    if is_dealer {
        for other in 0..4u8 {
            if other != seat {
                delta[other as usize] -= 4000;
                delta[seat as usize] += 4000;
            }
        }
    } else {
        for other in 0..4u8 {
            if other == seat {
                continue;
            }
            let pay = if other == dealer_seat { 4000 } else { 2000 };
            delta[other as usize] -= pay;
            delta[seat as usize] += pay;
        }
    }
    ScoreDelta(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dealer_ron_base_points_scale_with_han() {
        let engine = StandardScoringEngine;
        let cheap = engine.base_points(HanFu { han: 1, fu: 30 }, false);
        let mangan = engine.base_points(HanFu { han: 5, fu: 30 }, false);
        assert!(mangan > cheap);
    }

    #[test]
    fn ron_points_round_up_to_the_nearest_hundred() {
        assert_eq!(round_up_100(1501), 1600);
        assert_eq!(round_up_100(1500), 1500);
    }
}
