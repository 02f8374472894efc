//! Priority resolution among simultaneous claims on one discard.
//!
//! [`crate::round`] applies a single claim at a time to a `GameState`; this
//! module is the pure decision function the orchestrator consults once every
//! eligible seat has answered (pass or claim) a call window, to pick which
//! one to actually apply. Priority is ron > kan > pon > chi; ties within a
//! tier are broken counter-clockwise from the discarder (the seat order
//! already used for turn advancement).

use crate::tile::Tile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallClaim {
    Ron,
    Kan { tiles: [Tile; 3] },
    Pon { tile0: Tile, tile1: Tile },
    Chi { tile0: Tile, tile1: Tile },
}

impl CallClaim {
    fn priority(&self) -> u8 {
        match self {
            CallClaim::Ron => 3,
            CallClaim::Kan { .. } => 2,
            CallClaim::Pon { .. } => 1,
            CallClaim::Chi { .. } => 0,
        }
    }
}

/// Distance counter-clockwise (i.e. in turn order) from `discarder` to
/// `seat`, used to break same-tier ties: the seat whose turn would come
/// soonest wins.
fn turn_distance(discarder: u8, seat: u8) -> u8 {
    (seat + 4 - discarder) % 4
}

/// Picks the single claim to apply out of every claim submitted during one
/// call window. Ron claims are handled specially by the caller: if more
/// than one seat declares ron, all of them win (double/triple ron) rather
/// than only the highest priority - this function returns every ron seat in
/// that case, or a single `(seat, claim)` for kan/pon/chi.
pub fn resolve(discarder: u8, claims: &[(u8, CallClaim)]) -> Resolution {
    let ron_seats: Vec<u8> = claims
        .iter()
        .filter(|(_, c)| matches!(c, CallClaim::Ron))
        .map(|(seat, _)| *seat)
        .collect();
    if !ron_seats.is_empty() {
        let mut sorted = ron_seats;
        sorted.sort_by_key(|&seat| turn_distance(discarder, seat));
        return Resolution::Ron(sorted);
    }

    let best = claims
        .iter()
        .filter(|(_, c)| !matches!(c, CallClaim::Ron))
        .max_by_key(|(seat, claim)| {
            // Higher priority wins; within a tier, the seat nearer in turn
            // order (smaller distance) wins, so invert distance for max_by_key.
            (claim.priority(), 4 - turn_distance(discarder, *seat))
        });
    match best {
        Some((seat, claim)) => Resolution::Single(*seat, claim.clone()),
        None => Resolution::NoClaims,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One or more simultaneous ron declarations, ordered counter-clockwise
    /// from the discarder (first entry resolves first in a double/triple ron).
    Ron(Vec<u8>),
    Single(u8, CallClaim),
    NoClaims,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: u8) -> Tile {
        Tile::new(id)
    }

    #[test]
    fn ron_beats_pon_and_kan() {
        let claims = vec![
            (1, CallClaim::Pon { tile0: t(0), tile1: t(1) }),
            (2, CallClaim::Ron),
        ];
        assert_eq!(resolve(0, &claims), Resolution::Ron(vec![2]));
    }

    #[test]
    fn kan_beats_pon_beats_chi() {
        let claims = vec![
            (1, CallClaim::Chi { tile0: t(0), tile1: t(4) }),
            (2, CallClaim::Pon { tile0: t(8), tile1: t(9) }),
            (3, CallClaim::Kan { tiles: [t(12), t(13), t(14)] }),
        ];
        assert_eq!(resolve(0, &claims), Resolution::Single(3, CallClaim::Kan { tiles: [t(12), t(13), t(14)] }));
    }

    #[test]
    fn double_ron_orders_counter_clockwise_from_discarder() {
        let claims = vec![(3, CallClaim::Ron), (1, CallClaim::Ron)];
        assert_eq!(resolve(0, &claims), Resolution::Ron(vec![1, 3]));
    }
}
