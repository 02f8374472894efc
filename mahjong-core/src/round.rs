//! The per-round state machine (spec §4.1).
//!
//! Every function here is `fn(GameState, ...) -> Result<(GameState, Vec<GameEvent>), RoundError>`:
//! no mutation of the input, no I/O, no randomness beyond what the
//! already-seeded [`crate::wall::Wall`] provides. The orchestrator crate
//! drives this machine one action at a time under its own lock.

use crate::errors::RoundError;
use crate::events::{AbortiveReason, GameEvent, RoundResult};
use crate::hand_rules::{is_kyuushu_kyuuhai_eligible, is_tenpai, is_winning_hand};
use crate::meld::{Meld, validate_chi, validate_pon};
use crate::scoring::{ScoringEngine, apply_win_payment, nagashi_mangan_delta};
use crate::state::{GameState, TurnPhase};
use crate::tile::Tile;

type StepResult = Result<(GameState, Vec<GameEvent>), RoundError>;

/// Draws a tile for the seat the phase is currently waiting on.
pub fn draw_tile(mut state: GameState, seat: u8) -> StepResult {
    let TurnPhase::AwaitingDraw { seat: awaited } = state.round.phase else {
        return Err(RoundError::WrongPhase { seat });
    };
    if awaited != seat {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    let Some(tile) = state.round.wall.draw() else {
        return end_exhaustive_draw(state);
    };
    state.seat_mut(seat).hand.push(tile);
    state.round.phase = TurnPhase::AwaitingDiscard { seat, drawn_from_wall: true };
    Ok((state, vec![GameEvent::TileDrawn { seat }]))
}

/// Discards `tile` from `seat`'s hand.
pub fn discard_tile(mut state: GameState, seat: u8, tile: Tile, declare_riichi: bool) -> StepResult {
    let TurnPhase::AwaitingDiscard { seat: awaited, drawn_from_wall } = state.round.phase else {
        return Err(RoundError::WrongPhase { seat });
    };
    if awaited != seat {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    {
        let s = state.seat(seat);
        if !s.hand.contains(&tile) {
            return Err(RoundError::TileNotInHand(tile, seat));
        }
        if s.riichi && drawn_from_wall {
            let last_drawn = *s.hand.last().unwrap();
            if tile != last_drawn {
                return Err(RoundError::RiichiLocksDiscardChoice { seat });
            }
        }
        if s.kuikae_forbidden_kinds.contains(&tile.kind()) {
            return Err(RoundError::KuikaeViolation { seat, tile });
        }
    }
    state.seat_mut(seat).kuikae_forbidden_kinds.clear();

    if declare_riichi {
        state = declare_riichi_on_discard(state, seat)?;
    }

    let mut events = Vec::new();
    {
        let s = state.seat_mut(seat);
        let pos = s.hand.iter().position(|t| *t == tile).unwrap();
        s.hand.remove(pos);
        let index = state.round.current_discard_index;
        s.discards.push(crate::state::Discard { tile, called: false, riichi_declaration: declare_riichi });
        if declare_riichi {
            events.push(GameEvent::RiichiDeclared { seat });
        }
        events.push(GameEvent::TileDiscarded { seat, tile, riichi_declaration: declare_riichi });
        let _ = index;
    }
    state.round.current_discard_index += 1;

    // Clear temporary furiten/ippatsu for the discarder's own turn ending.
    // Ippatsu for *other* seats is cleared the moment anyone calls; it
    // survives a pass.
    for other in 0..4u8 {
        if other != seat {
            state.seats[other as usize].ippatsu_active = false;
        }
    }

    let eligible = eligible_callers(&state, seat, tile);
    if eligible.is_empty() {
        let (next_state, advance_events) = advance_after_discard(state, seat)?;
        events.extend(advance_events);
        Ok((next_state, events))
    } else {
        state.round.phase = TurnPhase::AwaitingCallResponses {
            discarding_seat: seat,
            discarded_tile: tile,
            eligible_seats: eligible,
            responded: Vec::new(),
        };
        Ok((state, events))
    }
}

fn declare_riichi_on_discard(mut state: GameState, seat: u8) -> Result<GameState, RoundError> {
    let s = state.seat(seat);
    if s.riichi {
        return Err(RoundError::AlreadyInRiichi { seat });
    }
    if !s.is_closed() {
        return Err(RoundError::RiichiNotEligible { seat });
    }
    if s.score < 1000 {
        return Err(RoundError::InsufficientScoreForRiichi { seat });
    }
    if state.round.wall.remaining_live() < 4 {
        return Err(RoundError::InsufficientWallForRiichi { seat });
    }
    if !is_tenpai(&s.hand, &s.melds) {
        return Err(RoundError::RiichiNotEligible { seat });
    }
    let is_first_discard = state.seat(seat).discards.is_empty();
    let no_calls_yet = state.round.kan_seats.is_empty();
    let s = state.seat_mut(seat);
    s.riichi = true;
    s.score -= 1000;
    s.ippatsu_active = true;
    s.double_riichi = is_first_discard && no_calls_yet;
    state.round.riichi_sticks += 1;
    state.round.riichi_count += 1;
    Ok(state)
}

fn eligible_callers(state: &GameState, discarder: u8, tile: Tile) -> Vec<u8> {
    let mut eligible = Vec::new();
    for seat in 0..4u8 {
        if seat == discarder {
            continue;
        }
        let s = state.seat(seat);
        let can_ron = !s.in_furiten() && is_winning_hand(
            &{ let mut h = s.hand.clone(); h.push(tile); h },
            &s.melds,
        );
        let can_pon = s.hand.iter().filter(|t| t.same_kind(tile)).count() >= 2;
        let can_kan = s.hand.iter().filter(|t| t.same_kind(tile)).count() >= 3;
        let can_chi = seat == GameState::next_seat(discarder)
            && !crate::meld::chi_options(&s.hand, tile).is_empty();
        if can_ron || can_pon || can_kan || can_chi {
            eligible.push(seat);
        }
    }
    eligible
}

fn advance_after_discard(mut state: GameState, discarder: u8) -> StepResult {
    let next = GameState::next_seat(discarder);
    if four_riichi_should_abort(&state) {
        return abort_round(state, AbortiveReason::FourRiichi);
    }
    if four_winds_should_abort(&state) {
        return abort_round(state, AbortiveReason::FourWinds);
    }
    if state.round.wall.is_exhausted() {
        return end_exhaustive_draw(state);
    }
    state.round.phase = TurnPhase::AwaitingDraw { seat: next };
    state.seats[next as usize].temporary_furiten = false;
    Ok((state, Vec::new()))
}

/// A seat passes on the current call window.
pub fn pass_call(mut state: GameState, seat: u8) -> StepResult {
    let TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, eligible_seats, mut responded } =
        state.round.phase.clone()
    else {
        return Err(RoundError::NoPendingCall);
    };
    if !eligible_seats.contains(&seat) {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    if responded.contains(&seat) {
        return Err(RoundError::AlreadyResponded { seat });
    }

    // A passed ron opportunity sets furiten: permanently for a riichi seat
    // (it can never ron again this round), only until its next discard-free
    // draw otherwise.
    let mut furiten_events = Vec::new();
    let s = state.seat(seat);
    if !s.in_furiten()
        && is_winning_hand(&{ let mut h = s.hand.clone(); h.push(discarded_tile); h }, &s.melds)
    {
        if s.riichi {
            state.seats[seat as usize].riichi_furiten = true;
        } else {
            state.seats[seat as usize].temporary_furiten = true;
        }
        furiten_events.push(GameEvent::FuritenChanged { seat, furiten: true });
    }

    responded.push(seat);
    if responded.len() == eligible_seats.len() {
        let (next_state, mut events) = advance_after_discard(state, discarding_seat)?;
        furiten_events.append(&mut events);
        return Ok((next_state, furiten_events));
    }
    state.round.phase = TurnPhase::AwaitingCallResponses {
        discarding_seat,
        discarded_tile,
        eligible_seats,
        responded,
    };
    Ok((state, furiten_events))
}

/// Declares ron against the currently pending discard (or chankan).
pub fn declare_ron(mut state: GameState, seat: u8, engine: &dyn ScoringEngine) -> StepResult {
    let (discarder, tile) = match &state.round.phase {
        TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, .. } => (*discarding_seat, *discarded_tile),
        TurnPhase::AwaitingChankanResponses { kan_seat, kan_tile, .. } => (*kan_seat, *kan_tile),
        _ => return Err(RoundError::NoPendingCall),
    };
    if state.seat(seat).in_furiten() {
        return Err(RoundError::Furiten { seat });
    }
    let winning = {
        let s = state.seat(seat);
        let mut h = s.hand.clone();
        h.push(tile);
        is_winning_hand(&h, &s.melds)
    };
    if !winning {
        return Err(RoundError::NotAWinningHand { seat });
    }
    end_round_with_win(state, vec![seat], Some(discarder), tile, engine)
}

/// Declares ron simultaneously for every seat in `winners` (double/triple
/// ron): every hand is validated before anything is committed, then the
/// round ends once with every winner paid out of the same discarder.
pub fn declare_multi_ron(state: GameState, winners: Vec<u8>, engine: &dyn ScoringEngine) -> StepResult {
    let (discarder, tile) = match &state.round.phase {
        TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, .. } => (*discarding_seat, *discarded_tile),
        TurnPhase::AwaitingChankanResponses { kan_seat, kan_tile, .. } => (*kan_seat, *kan_tile),
        _ => return Err(RoundError::NoPendingCall),
    };
    for &seat in &winners {
        if state.seat(seat).in_furiten() {
            return Err(RoundError::Furiten { seat });
        }
        let mut h = state.seat(seat).hand.clone();
        h.push(tile);
        if !is_winning_hand(&h, &state.seat(seat).melds) {
            return Err(RoundError::NotAWinningHand { seat });
        }
    }
    end_round_with_win(state, winners, Some(discarder), tile, engine)
}

/// Declares tsumo on the tile this seat just drew.
pub fn declare_tsumo(state: GameState, seat: u8, engine: &dyn ScoringEngine) -> StepResult {
    let TurnPhase::AwaitingDiscard { seat: awaited, .. } = state.round.phase else {
        return Err(RoundError::WrongPhase { seat });
    };
    if awaited != seat {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    let s = state.seat(seat);
    let winning_tile = *s.hand.last().unwrap();
    if !is_winning_hand(&s.hand, &s.melds) {
        return Err(RoundError::NotAWinningHand { seat });
    }
    end_round_with_win(state, vec![seat], None, winning_tile, engine)
}

fn end_round_with_win(
    mut state: GameState,
    winners: Vec<u8>,
    discarder: Option<u8>,
    winning_tile: Tile,
    engine: &dyn ScoringEngine,
) -> StepResult {
    let ura = if winners.iter().any(|w| state.seat(*w).riichi) {
        state.round.wall.reveal_ura_dora()
    } else {
        Vec::new()
    };
    let dora_indicators = state.round.wall.dora_indicators().to_vec();

    let mut total_delta = [0i64; 4];
    for &winner in &winners {
        let s = state.seat(winner);
        let dora_count = count_dora(&s.hand, &s.melds, &dora_indicators) + count_dora(&s.hand, &s.melds, &ura);
        let han_fu = engine
            .evaluate(
                &s.hand,
                &s.melds,
                winning_tile,
                s.seat_wind,
                state.round.round_wind,
                discarder.is_none(),
                s.riichi,
                s.ippatsu_active,
                dora_count,
            )
            .ok_or(RoundError::NotAWinningHand { seat: winner })?;
        // On a double/triple ron only the seat closest to the discarder (the
        // first in call_resolution's turn-distance-sorted list) takes the
        // sitting riichi sticks.
        let award_riichi_sticks = winner == winners[0];
        let delta = apply_win_payment(&state, engine, winner, discarder, han_fu, award_riichi_sticks);
        for i in 0..4 {
            total_delta[i] += delta.0[i];
        }
    }
    for (seat, amount) in total_delta.iter().enumerate() {
        state.seats[seat].score += amount;
    }
    state.round.riichi_sticks = 0;
    state.round.phase = TurnPhase::RoundEnded;

    let result = match (winners.len(), discarder) {
        (1, Some(d)) => RoundResult::Ron { winner: winners[0], discarder: d },
        (1, None) => RoundResult::Tsumo { winner: winners[0] },
        (_, Some(d)) => RoundResult::DoubleRon { winners, discarder: d },
        _ => unreachable!("tsumo cannot have multiple winners"),
    };
    Ok((state, vec![GameEvent::RoundEnded { result, scores_delta: total_delta }]))
}

fn count_dora(hand: &[Tile], melds: &[Meld], indicators: &[Tile]) -> u32 {
    let all_tiles: Vec<Tile> = hand.iter().copied().chain(melds.iter().flat_map(|m| m.tiles())).collect();
    let mut count = 0u32;
    for indicator in indicators {
        let dora_kind = next_dora_kind(indicator.kind());
        count += all_tiles.iter().filter(|t| t.kind() == dora_kind).count() as u32;
    }
    count
}

fn next_dora_kind(indicator_kind: u8) -> u8 {
    match indicator_kind {
        0..=8 => (indicator_kind + 1) % 9,
        9..=17 => 9 + (indicator_kind - 9 + 1) % 9,
        18..=26 => 18 + (indicator_kind - 18 + 1) % 9,
        27..=30 => 27 + (indicator_kind - 27 + 1) % 4, // winds cycle E S W N
        _ => 31 + (indicator_kind - 31 + 1) % 3, // dragons cycle haku hatsu chun
    }
}

fn end_exhaustive_draw(mut state: GameState) -> StepResult {
    let tenpai_seats: Vec<u8> = (0..4u8)
        .filter(|&seat| {
            let s = state.seat(seat);
            is_tenpai(&s.hand, &s.melds)
        })
        .collect();

    let nagashi_seat = (0..4u8).find(|&seat| {
        let s = state.seat(seat);
        !s.discards.is_empty()
            && s.discards.iter().all(|d| !d.called && d.tile.is_terminal_or_honor())
    });

    if let Some(seat) = nagashi_seat {
        let delta = nagashi_mangan_delta(state.round.dealer_seat, seat);
        for (i, amount) in delta.0.iter().enumerate() {
            state.seats[i].score += amount;
        }
        state.round.phase = TurnPhase::RoundEnded;
        return Ok((
            state,
            vec![GameEvent::RoundEnded { result: RoundResult::NagashiMangan { seat }, scores_delta: delta.0 }],
        ));
    }

    let tenpai_count = tenpai_seats.len() as i64;
    let mut delta = [0i64; 4];
    if tenpai_count > 0 && tenpai_count < 4 {
        let gains = 3000 / tenpai_count;
        let losers = 4 - tenpai_count;
        let costs = 3000 / losers;
        for seat in 0..4u8 {
            if tenpai_seats.contains(&seat) {
                delta[seat as usize] += gains;
            } else {
                delta[seat as usize] -= costs;
            }
        }
    }
    for (i, amount) in delta.iter().enumerate() {
        state.seats[i].score += amount;
    }
    state.round.phase = TurnPhase::RoundEnded;
    Ok((
        state,
        vec![GameEvent::RoundEnded { result: RoundResult::ExhaustiveDraw { tenpai_seats }, scores_delta: delta }],
    ))
}

/// Aborts the round for any of the four abortive-draw reasons.
/// Four-kans, four-winds and four-riichi are detected internally (see
/// `four_kans_should_abort`/`four_winds_should_abort`/`four_riichi_should_abort`,
/// wired into `finish_kan` and `advance_after_discard`). Nine-nine-hai and
/// triple-ron instead depend on a claim or an explicit player action the
/// orchestrator already has in hand, so it calls this directly once it has
/// confirmed eligibility via `can_declare_kyuushu_kyuuhai` or its own
/// triple-ron count.
pub fn abort_round(mut state: GameState, reason: AbortiveReason) -> StepResult {
    state.round.phase = TurnPhase::RoundEnded;
    Ok((state, vec![GameEvent::RoundEnded { result: RoundResult::AbortiveDraw { reason }, scores_delta: [0; 4] }]))
}

/// Checks kyuushu kyuuhai eligibility for the seat currently holding a fresh
/// first-go-around draw.
pub fn can_declare_kyuushu_kyuuhai(state: &GameState, seat: u8) -> bool {
    let s = state.seat(seat);
    state.round.current_discard_index < 4
        && state.round.kan_seats.is_empty()
        && is_kyuushu_kyuuhai_eligible(&s.hand)
}

/// Calls pon on the currently pending discard.
pub fn call_pon(mut state: GameState, seat: u8, tile0: Tile, tile1: Tile) -> StepResult {
    let TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, eligible_seats, .. } = state.round.phase.clone() else {
        return Err(RoundError::NoPendingCall);
    };
    if !eligible_seats.contains(&seat) {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    if !validate_pon(&state.seat(seat).hand, tile0, tile1, discarded_tile) {
        return Err(RoundError::InvalidPon { seat });
    }

    for other in 0..4u8 {
        state.seats[other as usize].ippatsu_active = false;
    }

    {
        let s = state.seat_mut(seat);
        s.hand.retain(|t| *t != tile0 && *t != tile1);
        s.melds.push(Meld::Pon {
            owner: seat,
            tiles: [tile0, tile1, discarded_tile],
            called_tile: discarded_tile,
            source_seat: discarding_seat,
        });
        // Genbutsu-gaeshi: all three pon tiles share a kind, so there's no
        // suji side to worry about, just the called kind itself.
        s.kuikae_forbidden_kinds = vec![discarded_tile.kind()];
    }
    mark_discard_called(&mut state, discarding_seat);
    state.round.phase = TurnPhase::AwaitingDiscard { seat, drawn_from_wall: false };
    Ok((state, vec![GameEvent::MeldCalled {
        meld: Meld::Pon { owner: seat, tiles: [tile0, tile1, discarded_tile], called_tile: discarded_tile, source_seat: discarding_seat },
    }]))
}

/// Calls chi on the currently pending discard (must come from the player's
/// kamicha, enforced by `eligible_callers`).
pub fn call_chi(mut state: GameState, seat: u8, tile0: Tile, tile1: Tile) -> StepResult {
    let TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, eligible_seats, .. } = state.round.phase.clone() else {
        return Err(RoundError::NoPendingCall);
    };
    if !eligible_seats.contains(&seat) || seat != GameState::next_seat(discarding_seat) {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    if !validate_chi(tile0, tile1, discarded_tile) {
        return Err(RoundError::InvalidChi { seat });
    }

    for other in 0..4u8 {
        state.seats[other as usize].ippatsu_active = false;
    }

    {
        let s = state.seat_mut(seat);
        if !s.hand.contains(&tile0) || !s.hand.contains(&tile1) {
            return Err(RoundError::InvalidChi { seat });
        }
        s.hand.retain(|t| *t != tile0 && *t != tile1);
        s.melds.push(Meld::Chi {
            owner: seat,
            tiles: [tile0, tile1, discarded_tile],
            called_tile: discarded_tile,
            source_seat: discarding_seat,
        });
        s.kuikae_forbidden_kinds = kuikae_forbidden_kinds_for_chi(tile0, tile1, discarded_tile);
    }
    mark_discard_called(&mut state, discarding_seat);
    state.round.phase = TurnPhase::AwaitingDiscard { seat, drawn_from_wall: false };
    Ok((state, vec![GameEvent::MeldCalled {
        meld: Meld::Chi { owner: seat, tiles: [tile0, tile1, discarded_tile], called_tile: discarded_tile, source_seat: discarding_seat },
    }]))
}

/// Genbutsu-gaeshi (the called tile's own kind) plus suji-gaeshi: if the
/// called tile filled the run's low or high end, the tile three ranks past
/// the opposite end is also forbidden (e.g. calling 4p to complete 2p3p4p
/// also forbids discarding 7p).
fn kuikae_forbidden_kinds_for_chi(tile0: Tile, tile1: Tile, discarded_tile: Tile) -> Vec<u8> {
    let mut ranks = [tile0.rank(), tile1.rank(), discarded_tile.rank()];
    ranks.sort_unstable();
    let mut forbidden = vec![discarded_tile.kind()];
    let suit_base = discarded_tile.kind() - (discarded_tile.rank() - 1);
    if discarded_tile.rank() == ranks[0] && ranks[2] + 1 <= 9 {
        forbidden.push(suit_base + (ranks[2] + 1 - 1));
    } else if discarded_tile.rank() == ranks[2] && ranks[0] >= 2 {
        forbidden.push(suit_base + (ranks[0] - 1 - 1));
    }
    forbidden
}

fn mark_discard_called(state: &mut GameState, discarding_seat: u8) {
    if let Some(last) = state.seats[discarding_seat as usize].discards.last_mut() {
        last.called = true;
    }
}

/// Seats (other than `kan_seat`) who could legally chankan-ron the tile
/// being kan'd. For a closed kan this is restricted to kokushi musou; for
/// an open/added kan it's the ordinary ron predicate.
fn chankan_eligible_seats(state: &GameState, kan_seat: u8, tile: Tile, closed: bool) -> Vec<u8> {
    (0..4u8)
        .filter(|&seat| {
            if seat == kan_seat {
                return false;
            }
            let s = state.seat(seat);
            if s.in_furiten() {
                return false;
            }
            let mut h = s.hand.clone();
            h.push(tile);
            if closed {
                crate::hand_rules::is_kokushi(&h, &s.melds)
            } else {
                is_winning_hand(&h, &s.melds)
            }
        })
        .collect()
}

fn open_chankan_or_proceed(mut state: GameState, kan_seat: u8, tile: Tile, closed: bool) -> StepResult {
    let eligible = chankan_eligible_seats(&state, kan_seat, tile, closed);
    if eligible.is_empty() {
        finish_kan(state, kan_seat)
    } else {
        state.round.phase = TurnPhase::AwaitingChankanResponses {
            kan_seat,
            kan_tile: tile,
            eligible_seats: eligible,
            responded: Vec::new(),
        };
        Ok((state, Vec::new()))
    }
}

/// A seat passes on the current chankan window.
pub fn pass_chankan(mut state: GameState, seat: u8) -> StepResult {
    let TurnPhase::AwaitingChankanResponses { kan_seat, kan_tile, eligible_seats, mut responded } =
        state.round.phase.clone()
    else {
        return Err(RoundError::NoPendingCall);
    };
    if !eligible_seats.contains(&seat) {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    if responded.contains(&seat) {
        return Err(RoundError::AlreadyResponded { seat });
    }
    responded.push(seat);
    if responded.len() == eligible_seats.len() {
        return finish_kan(state, kan_seat);
    }
    state.round.phase = TurnPhase::AwaitingChankanResponses { kan_seat, kan_tile, eligible_seats, responded };
    Ok((state, Vec::new()))
}

fn finish_kan(mut state: GameState, kan_seat: u8) -> StepResult {
    let mut events = Vec::new();
    if !state.round.kan_seats.contains(&kan_seat) {
        state.round.kan_seats.push(kan_seat);
    }
    if four_kans_should_abort(&state) {
        return abort_round(state, AbortiveReason::FourKans);
    }
    let Some(rinshan) = state.round.wall.draw_rinshan() else {
        let (next_state, exhaust_events) = end_exhaustive_draw(state)?;
        return Ok((next_state, exhaust_events));
    };
    state.seat_mut(kan_seat).hand.push(rinshan);
    let revealed = state.round.wall.reveal_pending_dora();
    if !revealed.is_empty() {
        events.push(GameEvent::DoraRevealed { indicators: revealed });
    }
    state.round.phase = TurnPhase::AwaitingDiscard { seat: kan_seat, drawn_from_wall: true };
    events.push(GameEvent::TileDrawn { seat: kan_seat });
    Ok((state, events))
}

/// Calls an open kan (three matching tiles from hand plus the pending
/// discard).
pub fn call_open_kan(mut state: GameState, seat: u8, tiles: [Tile; 3]) -> StepResult {
    let TurnPhase::AwaitingCallResponses { discarding_seat, discarded_tile, eligible_seats, .. } = state.round.phase.clone() else {
        return Err(RoundError::NoPendingCall);
    };
    if !eligible_seats.contains(&seat) {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    if tiles.iter().any(|t| !t.same_kind(discarded_tile)) {
        return Err(RoundError::InvalidKan { seat });
    }
    {
        let s = state.seat(seat);
        for t in &tiles {
            if s.hand.iter().filter(|h| *h == t).count() < tiles.iter().filter(|x| *x == t).count() {
                return Err(RoundError::InvalidKan { seat });
            }
        }
    }
    for other in 0..4u8 {
        state.seats[other as usize].ippatsu_active = false;
    }
    let full_tiles = [tiles[0], tiles[1], tiles[2], discarded_tile];
    {
        let s = state.seat_mut(seat);
        for t in &tiles {
            if let Some(pos) = s.hand.iter().position(|h| h == t) {
                s.hand.remove(pos);
            }
        }
        s.melds.push(Meld::Kan {
            kind: crate::meld::KanKind::Open,
            owner: seat,
            tiles: full_tiles,
            called_tile: Some(discarded_tile),
            source_seat: Some(discarding_seat),
        });
    }
    mark_discard_called(&mut state, discarding_seat);
    if state.settings.kan_dora_revealed_immediately_for_open_kan {
        state.round.wall.reveal_dora_now();
    } else {
        state.round.wall.defer_dora();
    }
    let mut events = vec![GameEvent::MeldCalled {
        meld: Meld::Kan {
            kind: crate::meld::KanKind::Open,
            owner: seat,
            tiles: full_tiles,
            called_tile: Some(discarded_tile),
            source_seat: Some(discarding_seat),
        },
    }];
    let (next_state, finish_events) = finish_kan(state, seat)?;
    events.extend(finish_events);
    Ok((next_state, events))
}

/// Declares a closed kan using four matching tiles from `seat`'s own hand,
/// taken during its own discard phase (post-draw). Opens a kokushi-robbing
/// chankan window before proceeding.
pub fn declare_closed_kan(mut state: GameState, seat: u8, tiles: [Tile; 4]) -> StepResult {
    let TurnPhase::AwaitingDiscard { seat: awaited, .. } = state.round.phase else {
        return Err(RoundError::WrongPhase { seat });
    };
    if awaited != seat {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    {
        let s = state.seat(seat);
        if tiles.iter().any(|t| !t.same_kind(tiles[0])) {
            return Err(RoundError::InvalidKan { seat });
        }
        let mut remaining = s.hand.clone();
        for t in &tiles {
            let Some(pos) = remaining.iter().position(|h| h == t) else {
                return Err(RoundError::InvalidKan { seat });
            };
            remaining.remove(pos);
        }
    }
    for other in 0..4u8 {
        state.seats[other as usize].ippatsu_active = false;
    }
    {
        let s = state.seat_mut(seat);
        for t in &tiles {
            if let Some(pos) = s.hand.iter().position(|h| h == t) {
                s.hand.remove(pos);
            }
        }
        s.melds.push(Meld::Kan {
            kind: crate::meld::KanKind::Closed,
            owner: seat,
            tiles,
            called_tile: None,
            source_seat: None,
        });
    }
    if state.settings.kan_dora_revealed_immediately_for_closed_kan {
        state.round.wall.reveal_dora_now();
    } else {
        state.round.wall.defer_dora();
    }
    open_chankan_or_proceed(state, seat, tiles[0], true)
}

/// Upgrades an existing pon into an added kan using the fourth tile from
/// hand. Opens the ordinary chankan (robbing-a-kan) window.
pub fn declare_added_kan(mut state: GameState, seat: u8, tile: Tile) -> StepResult {
    let TurnPhase::AwaitingDiscard { seat: awaited, .. } = state.round.phase else {
        return Err(RoundError::WrongPhase { seat });
    };
    if awaited != seat {
        return Err(RoundError::NotAwaitingThisSeat { seat });
    }
    let meld_index = {
        let s = state.seat(seat);
        if !s.hand.contains(&tile) {
            return Err(RoundError::TileNotInHand(tile, seat));
        }
        s.melds.iter().position(|m| matches!(m, Meld::Pon { tiles, .. } if tiles[0].same_kind(tile)))
    };
    let Some(meld_index) = meld_index else {
        return Err(RoundError::InvalidKan { seat });
    };
    {
        let s = state.seat_mut(seat);
        let Meld::Pon { tiles, called_tile, source_seat, .. } = s.melds[meld_index].clone() else {
            unreachable!()
        };
        let pos = s.hand.iter().position(|h| *h == tile).unwrap();
        s.hand.remove(pos);
        s.melds[meld_index] = Meld::Kan {
            kind: crate::meld::KanKind::Added,
            owner: seat,
            tiles: [tiles[0], tiles[1], tiles[2], tile],
            called_tile: Some(called_tile),
            source_seat: Some(source_seat),
        };
    }
    if state.settings.kan_dora_revealed_immediately_for_open_kan {
        state.round.wall.reveal_dora_now();
    } else {
        state.round.wall.defer_dora();
    }
    open_chankan_or_proceed(state, seat, tile, false)
}

/// Checks suukaikan (four-kans abortive draw) eligibility: four kans total
/// have been declared and they don't all belong to one seat (unless the
/// configured minimum distinct-seat threshold says otherwise).
pub fn four_kans_should_abort(state: &GameState) -> bool {
    let total_kans: usize = state
        .seats
        .iter()
        .flat_map(|s| s.melds.iter())
        .filter(|m| m.is_kan())
        .count();
    if total_kans < 4 {
        return false;
    }
    let distinct_seats = state.round.kan_seats.len() as u8;
    distinct_seats >= state.settings.four_kans_min_distinct_seats_to_continue
}

/// Checks suufon renda (four-winds abortive draw): all four seats discard
/// the same wind tile on their first go-around, with no calls yet.
pub fn four_winds_should_abort(state: &GameState) -> bool {
    if !state.round.kan_seats.is_empty() || state.round.current_discard_index != 4 {
        return false;
    }
    let first_discards: Vec<Tile> = state.seats.iter().filter_map(|s| s.discards.first()).map(|d| d.tile).collect();
    first_discards.len() == 4
        && first_discards.iter().all(|t| t.is_wind())
        && first_discards.windows(2).all(|w| w[0].same_kind(w[1]))
}

/// Checks suucha riichi (four-riichi abortive draw): all four seats are in
/// riichi simultaneously.
pub fn four_riichi_should_abort(state: &GameState) -> bool {
    state.seats.iter().all(|s| s.riichi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StandardScoringEngine;
    use crate::state::Settings;

    fn fresh_state() -> GameState {
        crate::deal_new_round("g1", Settings::default(), 7, crate::state::Wind::East, 1, 0, 0, 0, [25_000; 4])
    }

    #[test]
    fn discard_with_no_callers_advances_to_the_next_seat_draw() {
        let state = fresh_state();
        let (state, _) = draw_tile(state, 0).unwrap();
        let tile = *state.seat(0).hand.last().unwrap();
        // Force a tile nobody can call: drop every other seat's hand so no
        // pon/chi/ron is possible regardless of what was dealt.
        let mut state = state;
        for seat in 1..4u8 {
            state.seats[seat as usize].hand.clear();
        }
        let (state, _events) = discard_tile(state, 0, tile, false).unwrap();
        assert_eq!(state.round.phase, TurnPhase::AwaitingDraw { seat: 1 });
    }

    #[test]
    fn wrong_seat_cannot_discard_out_of_turn() {
        let state = fresh_state();
        let (state, _) = draw_tile(state, 0).unwrap();
        let tile = *state.seat(0).hand.last().unwrap();
        let err = discard_tile(state, 1, tile, false).unwrap_err();
        assert_eq!(err, RoundError::NotAwaitingThisSeat { seat: 1 });
    }

    #[test]
    fn pon_call_removes_two_hand_tiles_and_skips_to_the_caller() {
        let mut state = fresh_state();
        // Rig seat 2's hand to hold a pair matching whatever seat 0 draws.
        let (mut state2, _) = draw_tile(state.clone(), 0).unwrap();
        let tile = *state2.seat(0).hand.last().unwrap();
        let base = tile.kind() * 4;
        let other_copies: Vec<Tile> = (0..4).map(|offset| Tile::new(base + offset)).filter(|t| *t != tile).take(2).collect();
        state2.seats[2].hand = vec![other_copies[0], other_copies[1], Tile::new((tile.kind() + 1).min(33) * 4)];
        state = state2;
        for seat in [1u8, 3u8] {
            state.seats[seat as usize].hand.clear();
        }
        let (state, _) = discard_tile(state, 0, tile, false).unwrap();
        let called = match &state.round.phase {
            TurnPhase::AwaitingCallResponses { eligible_seats, .. } => eligible_seats.contains(&2),
            _ => false,
        };
        assert!(called);
        let (state, _) = call_pon(state, 2, other_copies[0], other_copies[1]).unwrap();
        assert_eq!(state.seat(2).hand.len(), 1);
        assert_eq!(state.round.phase, TurnPhase::AwaitingDiscard { seat: 2, drawn_from_wall: false });
    }

    #[test]
    fn ron_ends_the_round_and_pays_the_discarder() {
        let mut state = fresh_state();
        // Hand: 123m 456p 789s 111z + single 2m, waits on its pair.
        let hand = vec![
            Tile::new(0), Tile::new(4), Tile::new(8), // 1m 2m 3m
            Tile::new(12 * 4), Tile::new(13 * 4), Tile::new(14 * 4), // 4p5p6p
            Tile::new(24 * 4), Tile::new(25 * 4), Tile::new(26 * 4), // 7s8s9s
            Tile::new(27 * 4), Tile::new(27 * 4 + 1), Tile::new(27 * 4 + 2), // East triplet
            Tile::new(1 * 4), // single 2m, waits on its pair
        ];
        state.seats[1].hand = hand;
        state.seats[0].hand = vec![Tile::new(1 * 4 + 1)]; // the winning 2m, about to be discarded
        for seat in [2u8, 3u8] {
            state.seats[seat as usize].hand.clear();
        }
        state.round.phase = TurnPhase::AwaitingDiscard { seat: 0, drawn_from_wall: true };

        let (state, _) = discard_tile(state, 0, Tile::new(1 * 4 + 1), false).unwrap();
        let engine = StandardScoringEngine;
        let (state, events) = declare_ron(state, 1, &engine).unwrap();
        assert_eq!(state.round.phase, TurnPhase::RoundEnded);
        match &events[0] {
            GameEvent::RoundEnded { result: RoundResult::Ron { winner, discarder }, scores_delta } => {
                assert_eq!(*winner, 1);
                assert_eq!(*discarder, 0);
                assert!(scores_delta[1] > 0);
                assert!(scores_delta[0] < 0);
            }
            other => panic!("expected a Ron result, got {other:?}"),
        }
    }
}
