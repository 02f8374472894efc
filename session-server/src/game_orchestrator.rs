//! Dispatches one inbound action to the pure rules engine and fans the
//! resulting domain events back out as wire events (spec §4.2, §4.3).
//!
//! Grounded on the teacher's `backbone-lib::traits::BackEndArchitecture`
//! (there, a locally embedded game backend was polled once a frame; here the
//! same "one authority mutates the whole table, then the result goes out to
//! everyone" shape is invoked once per inbound action instead, always under
//! `game.lock`). Every entry point here takes the lock for its whole body
//! and releases it before anything that can block on a socket - see
//! [`crate::session_manager`] for why that matters.

use std::sync::Arc;

use mahjong_core::call_resolution::{self, CallClaim};
use mahjong_core::events::{AbortiveReason as CoreAbortiveReason, GameEvent, RoundResult as CoreRoundResult};
use mahjong_core::{GameState, RoundError, StandardScoringEngine, TurnPhase, Wind, round};
use protocol::{
    AbortiveReasonWire, AvailableActionWire, CallTypeWire, CallerWire, ErrorCode, GameActionData, GameActionKind,
    GameErrorCode, KanTypeWire, MeldTypeWire, PlayerInfoWire, RoundResultWire, ServerEvent, StandingWire,
};

use crate::models::ActiveGame;
use crate::session_manager::AppState;

type ActionError = (ErrorCode, String);

pub struct GameOrchestrator;

impl GameOrchestrator {
    /// Entry point for every `ClientMessage::GameAction`. Returns `true` if
    /// the action was applied cleanly.
    pub async fn handle_action(
        app: &AppState,
        game: &Arc<ActiveGame>,
        seat: u8,
        action: GameActionKind,
        data: GameActionData,
    ) -> bool {
        match Self::apply(app, game, seat, action, data).await {
            Ok(()) => {
                game.offense_counts.lock().await[seat as usize] = 0;
                true
            }
            Err((code, message)) => {
                app.send_to_seat(game, seat, ServerEvent::Error { code, message }).await;
                let strikes = {
                    let mut offenses = game.offense_counts.lock().await;
                    offenses[seat as usize] += 1;
                    offenses[seat as usize]
                };
                if strikes >= 3 {
                    app.leave_game(game, seat).await;
                }
                false
            }
        }
    }

    async fn apply(
        app: &AppState,
        game: &Arc<ActiveGame>,
        seat: u8,
        action: GameActionKind,
        data: GameActionData,
    ) -> Result<(), ActionError> {
        let engine = StandardScoringEngine;
        let mut guard = game.lock.lock().await;

        let result: Result<(GameState, Vec<GameEvent>), RoundError> = match action {
            GameActionKind::Discard => {
                let tile_id = data.tile_id.ok_or_else(|| game_err(GameErrorCode::InvalidDiscard, "missing tile_id"))?;
                let declare_riichi = {
                    let mut pending = game.pending_riichi.write().await;
                    std::mem::replace(&mut pending[seat as usize], false)
                };
                round::discard_tile(guard.clone(), seat, mahjong_core::Tile::new(tile_id), declare_riichi)
            }
            GameActionKind::DeclareRiichi => {
                game.pending_riichi.write().await[seat as usize] = true;
                return Ok(());
            }
            GameActionKind::DeclareTsumo => round::declare_tsumo(guard.clone(), seat, &engine),
            GameActionKind::CallRon => return Self::on_ron_claim(app, game, &mut guard, seat, &engine).await,
            GameActionKind::CallPon => {
                let (t0, t1) =
                    data.sequence_tiles.ok_or_else(|| game_err(GameErrorCode::InvalidPon, "missing sequence_tiles"))?;
                let claim =
                    CallClaim::Pon { tile0: mahjong_core::Tile::new(t0), tile1: mahjong_core::Tile::new(t1) };
                return Self::on_meld_claim(app, game, &mut guard, seat, claim).await;
            }
            GameActionKind::CallChi => {
                let (t0, t1) =
                    data.sequence_tiles.ok_or_else(|| game_err(GameErrorCode::InvalidChi, "missing sequence_tiles"))?;
                let claim =
                    CallClaim::Chi { tile0: mahjong_core::Tile::new(t0), tile1: mahjong_core::Tile::new(t1) };
                return Self::on_meld_claim(app, game, &mut guard, seat, claim).await;
            }
            GameActionKind::CallKan => return Self::on_kan_action(app, game, &mut guard, seat, &data).await,
            GameActionKind::Pass => return Self::on_pass(app, game, &mut guard, seat).await,
            GameActionKind::CallKyuushu => {
                if !round::can_declare_kyuushu_kyuuhai(&guard, seat) {
                    return Err(game_err(GameErrorCode::CannotCallKyuushu, "not eligible"));
                }
                round::abort_round(guard.clone(), CoreAbortiveReason::KyuushuKyuuhai)
            }
            GameActionKind::ConfirmRound => {
                if !matches!(guard.round.phase, TurnPhase::RoundEnded) {
                    return Err(game_err(GameErrorCode::GameError, "round has not ended"));
                }
                drop(guard);
                Self::confirm_round(app, game, seat).await;
                return Ok(());
            }
        };

        Self::commit(app, game, &mut guard, result).await
    }

    /// Applies a resolved step result to the held lock and fans its events
    /// out, then drains any automatic draws the new phase now owes.
    async fn commit(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        result: Result<(GameState, Vec<GameEvent>), RoundError>,
    ) -> Result<(), ActionError> {
        match result {
            Ok(step) => {
                Self::apply_step(app, game, guard, step).await;
                Self::drain_auto_draws(app, game, guard).await;
                Ok(())
            }
            Err(err) => Err(round_error_to_wire(err)),
        }
    }

    /// Applies one already-resolved transition: swaps the state, folds in
    /// the game-over check, syncs timers, fans events out, and journals
    /// them. Shared by [`Self::commit`] and the auto-draw drain below so
    /// both paths stay byte-for-byte identical in what they emit.
    async fn apply_step(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        (new_state, events): (GameState, Vec<GameEvent>),
    ) {
        let old_phase = guard.round.phase.clone();
        *guard = new_state;
        if matches!(events.last(), Some(GameEvent::RoundEnded { .. })) && Self::should_end_game(guard) {
            guard.game_over = true;
        }
        let snapshot = guard.clone();
        Self::sync_timers(app, game, &old_phase, &snapshot).await;
        Self::emit(app, game, &snapshot, &events).await;
        if !events.is_empty() {
            app.replays.record(&game.game_id, &events).await;
        }
        if matches!(snapshot.round.phase, TurnPhase::RoundEnded) {
            let ai_seats: Vec<u8> = (0..4u8).filter(|&s| snapshot.seat(s).is_ai).collect();
            for seat in ai_seats {
                Box::pin(Self::confirm_round_locked(app, game, guard, seat)).await;
            }
        }
    }

    /// The wire protocol has no explicit "draw" action: a seat's draw is an
    /// automatic engine step the moment the table is waiting on it, not a
    /// player decision. Whenever a transition leaves the table in
    /// `AwaitingDraw`, perform that draw immediately so the client only
    /// ever sees the resulting `Draw` event.
    async fn drain_auto_draws(app: &AppState, game: &Arc<ActiveGame>, guard: &mut GameState) {
        while !guard.game_over {
            let TurnPhase::AwaitingDraw { seat } = guard.round.phase else { break };
            match round::draw_tile(guard.clone(), seat) {
                Ok(step) => Box::pin(Self::apply_step(app, game, guard, step)).await,
                Err(_) => break,
            }
        }
    }

    /// Stops whatever timer the previous phase owed, then starts whatever
    /// the new phase owes (spec §4.5): a turn timer for the seat now
    /// expected to discard, one meld/chankan timer per seat newly eligible
    /// to call, or a round-advance timer for every seat once the round ends.
    async fn sync_timers(app: &AppState, game: &Arc<ActiveGame>, old_phase: &TurnPhase, state: &GameState) {
        let game_id = &game.game_id;
        let durations: crate::timer_manager::TurnDurations = (&app.config.current.read().await.timers).into();

        // A partial pass keeps the same call window open for the
        // still-undecided seats; only the seat that just answered should
        // have its meld timer stopped, not the whole window restarted.
        if let (
            TurnPhase::AwaitingCallResponses { eligible_seats: old_eligible, responded: old_responded, .. }
            | TurnPhase::AwaitingChankanResponses { eligible_seats: old_eligible, responded: old_responded, .. },
            TurnPhase::AwaitingCallResponses { eligible_seats: new_eligible, responded: new_responded, .. }
            | TurnPhase::AwaitingChankanResponses { eligible_seats: new_eligible, responded: new_responded, .. },
        ) = (old_phase, &state.round.phase)
        {
            if old_eligible == new_eligible {
                for &seat in new_responded {
                    if !old_responded.contains(&seat) {
                        app.timers.cancel_meld_timer(game_id, seat).await;
                    }
                }
                return;
            }
        }

        match old_phase {
            TurnPhase::AwaitingDiscard { seat, .. } => app.timers.stop_turn_timer(game_id, *seat).await,
            TurnPhase::AwaitingCallResponses { eligible_seats, .. }
            | TurnPhase::AwaitingChankanResponses { eligible_seats, .. } => {
                for &seat in eligible_seats {
                    app.timers.cancel_meld_timer(game_id, seat).await;
                }
            }
            _ => {}
        }
        match &state.round.phase {
            TurnPhase::AwaitingDiscard { seat, .. } => {
                app.timers.start_turn_timer(game_id, *seat, durations.turn_increment).await;
            }
            TurnPhase::AwaitingCallResponses { eligible_seats, .. }
            | TurnPhase::AwaitingChankanResponses { eligible_seats, .. } => {
                for &seat in eligible_seats {
                    app.timers.start_meld_timer(game_id, seat, durations.call_response).await;
                }
            }
            TurnPhase::RoundEnded => {
                app.timers.apply_round_bonus(game_id, durations.round_bonus).await;
                for seat in 0..4u8 {
                    app.timers.start_round_advance_timer(game_id, seat, durations.round_advance).await;
                }
            }
            TurnPhase::AwaitingDraw { .. } => {}
        }
    }

    async fn on_meld_claim(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        seat: u8,
        claim: CallClaim,
    ) -> Result<(), ActionError> {
        let discarding_seat = match &guard.round.phase {
            TurnPhase::AwaitingCallResponses { discarding_seat, .. } => *discarding_seat,
            _ => return Err(game_err(GameErrorCode::InvalidPon, "no pending call window")),
        };
        {
            let mut claims = game.pending_claims.lock().await;
            claims.retain(|(s, _)| *s != seat);
            claims.push((seat, claim));
        }
        Self::maybe_resolve_claims(app, game, guard, discarding_seat).await
    }

    async fn on_ron_claim(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        seat: u8,
        engine: &StandardScoringEngine,
    ) -> Result<(), ActionError> {
        match guard.round.phase.clone() {
            TurnPhase::AwaitingChankanResponses { .. } => {
                let result = round::declare_ron(guard.clone(), seat, engine);
                Self::commit(app, game, guard, result).await
            }
            TurnPhase::AwaitingCallResponses { discarding_seat, .. } => {
                {
                    let mut claims = game.pending_claims.lock().await;
                    claims.retain(|(s, _)| *s != seat);
                    claims.push((seat, CallClaim::Ron));
                }
                Self::maybe_resolve_claims(app, game, guard, discarding_seat).await
            }
            _ => Err(game_err(GameErrorCode::InvalidRon, "no pending call window")),
        }
    }

    async fn on_pass(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        seat: u8,
    ) -> Result<(), ActionError> {
        match &guard.round.phase {
            TurnPhase::AwaitingChankanResponses { .. } => {
                let result = round::pass_chankan(guard.clone(), seat);
                Self::commit(app, game, guard, result).await
            }
            TurnPhase::AwaitingCallResponses { discarding_seat, .. } => {
                let discarding_seat = *discarding_seat;
                let result = round::pass_call(guard.clone(), seat);
                match result {
                    Err(RoundError::NoPendingCall) => Ok(()), // window already resolved by a claim
                    other => {
                        Self::commit(app, game, guard, other).await?;
                        // A pass never resolves the window by itself when
                        // other eligible seats already buffered a claim
                        // (pon/chi/kan/ron) instead of passing - those never
                        // touch `responded`, so the same check `on_meld_claim`
                        // / `on_ron_claim` make after buffering has to run
                        // here too.
                        Self::maybe_resolve_claims(app, game, guard, discarding_seat).await
                    }
                }
            }
            _ => Err(game_err(GameErrorCode::InvalidPass, "no pending call window")),
        }
    }

    async fn on_kan_action(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        seat: u8,
        data: &GameActionData,
    ) -> Result<(), ActionError> {
        let kan_type = data.kan_type.ok_or_else(|| game_err(GameErrorCode::InvalidKan, "missing kan_type"))?;
        match kan_type {
            KanTypeWire::Open => {
                let discarded = match &guard.round.phase {
                    TurnPhase::AwaitingCallResponses { discarded_tile, .. } => *discarded_tile,
                    _ => return Err(game_err(GameErrorCode::InvalidKan, "no pending call window")),
                };
                let matching: Vec<mahjong_core::Tile> =
                    guard.seat(seat).hand.iter().copied().filter(|t| t.same_kind(discarded)).collect();
                if matching.len() != 3 {
                    return Err(game_err(GameErrorCode::InvalidKan, "need three matching tiles in hand"));
                }
                let claim = CallClaim::Kan { tiles: [matching[0], matching[1], matching[2]] };
                let discarding_seat = match &guard.round.phase {
                    TurnPhase::AwaitingCallResponses { discarding_seat, .. } => *discarding_seat,
                    _ => unreachable!("phase checked above"),
                };
                {
                    let mut claims = game.pending_claims.lock().await;
                    claims.retain(|(s, _)| *s != seat);
                    claims.push((seat, claim));
                }
                Self::maybe_resolve_claims(app, game, guard, discarding_seat).await
            }
            KanTypeWire::Closed => {
                let tile_id = data.tile_id.ok_or_else(|| game_err(GameErrorCode::InvalidKan, "missing tile_id"))?;
                let kind = mahjong_core::Tile::new(tile_id).kind();
                let matching: Vec<mahjong_core::Tile> =
                    guard.seat(seat).hand.iter().copied().filter(|t| t.kind() == kind).collect();
                if matching.len() != 4 {
                    return Err(game_err(GameErrorCode::InvalidKan, "need four matching tiles in hand"));
                }
                let result = round::declare_closed_kan(
                    guard.clone(),
                    seat,
                    [matching[0], matching[1], matching[2], matching[3]],
                );
                Self::commit(app, game, guard, result).await
            }
            KanTypeWire::Added => {
                let tile_id = data.tile_id.ok_or_else(|| game_err(GameErrorCode::InvalidKan, "missing tile_id"))?;
                let result = round::declare_added_kan(guard.clone(), seat, mahjong_core::Tile::new(tile_id));
                Self::commit(app, game, guard, result).await
            }
        }
    }

    /// Resolves the buffered claims for the current call window once every
    /// eligible seat has been heard from, either via a pass already folded
    /// into `state.round.phase.responded` or a buffered non-pass claim.
    async fn maybe_resolve_claims(
        app: &AppState,
        game: &Arc<ActiveGame>,
        guard: &mut GameState,
        discarder: u8,
    ) -> Result<(), ActionError> {
        let (eligible_seats, responded) = match &guard.round.phase {
            TurnPhase::AwaitingCallResponses { eligible_seats, responded, .. } => {
                (eligible_seats.clone(), responded.clone())
            }
            _ => return Ok(()),
        };
        let claims = game.pending_claims.lock().await.clone();
        let claimed: std::collections::HashSet<u8> = claims.iter().map(|(s, _)| *s).collect();
        let heard_from = responded.len() + claimed.len();
        if heard_from < eligible_seats.len() {
            return Ok(());
        }
        game.pending_claims.lock().await.clear();

        let engine = StandardScoringEngine;
        let resolution = call_resolution::resolve(discarder, &claims);
        let result = match resolution {
            call_resolution::Resolution::NoClaims => round::pass_call(guard.clone(), eligible_seats[0]),
            call_resolution::Resolution::Ron(seats) if seats.len() >= 3 => {
                round::abort_round(guard.clone(), CoreAbortiveReason::TripleRon)
            }
            call_resolution::Resolution::Ron(seats) => round::declare_multi_ron(guard.clone(), seats, &engine),
            call_resolution::Resolution::Single(winner, claim) => match claim {
                CallClaim::Pon { tile0, tile1 } => round::call_pon(guard.clone(), winner, tile0, tile1),
                CallClaim::Chi { tile0, tile1 } => round::call_chi(guard.clone(), winner, tile0, tile1),
                CallClaim::Kan { tiles } => round::call_open_kan(guard.clone(), winner, tiles),
                CallClaim::Ron => unreachable!("ron claims always take the Ron branch above"),
            },
        };
        Self::commit(app, game, guard, result).await
    }

    /// Records one seat's ack that it has seen `RoundEnded` and is ready to
    /// continue; advances to the next round once every seat (AI seats
    /// auto-confirm, see [`Self::apply_step`]) has done so. Takes the lock
    /// itself - callers must not already hold it.
    pub async fn confirm_round(app: &AppState, game: &Arc<ActiveGame>, seat: u8) {
        let mut guard = game.lock.lock().await;
        Self::confirm_round_locked(app, game, &mut guard, seat).await;
    }

    async fn confirm_round_locked(app: &AppState, game: &Arc<ActiveGame>, guard: &mut GameState, seat: u8) {
        let all_confirmed = {
            let mut confirmations = game.round_confirmations.lock().await;
            confirmations[seat as usize] = true;
            confirmations.iter().all(|c| *c)
        };
        app.timers.cancel_round_advance_timer(&game.game_id, seat).await;
        if all_confirmed {
            Self::advance_to_next_round_locked(app, game, guard).await;
        }
    }

    async fn advance_to_next_round(app: &AppState, game: &Arc<ActiveGame>) {
        let mut guard = game.lock.lock().await;
        Self::advance_to_next_round_locked(app, game, &mut guard).await;
    }

    async fn advance_to_next_round_locked(app: &AppState, game: &Arc<ActiveGame>, guard: &mut GameState) {
        if !matches!(guard.round.phase, TurnPhase::RoundEnded) || guard.game_over {
            return;
        }
        let settings = guard.settings.clone();
        // Dealer always rotates; dealer-repeat-on-win/tenpai (renchan) isn't
        // tracked since the round result isn't retained past RoundEnded.
        let next_dealer = GameState::next_seat(guard.round.dealer_seat);
        let round_wind = if next_dealer == 0 { guard.round.round_wind.next() } else { guard.round.round_wind };
        let round_number = if next_dealer == 0 { 1 } else { guard.round.round_number + 1 };
        let honba = guard.round.honba + 1;
        let scores = [guard.seats[0].score, guard.seats[1].score, guard.seats[2].score, guard.seats[3].score];
        let seed: u64 = rand::random();
        let new_state = mahjong_core::deal_new_round(
            guard.game_id.clone(),
            settings,
            seed,
            round_wind,
            round_number,
            next_dealer,
            honba,
            guard.round.riichi_sticks,
            scores,
        );
        *guard = new_state;
        *game.round_confirmations.lock().await = [false; 4];
        Self::drain_auto_draws(app, game, guard).await;
        let snapshot = guard.clone();
        Self::broadcast_round_started(app, game, &snapshot).await;
    }

    /// Deals and broadcasts the very first round once every seat in a
    /// freshly started game is accounted for (spec §4.2's `GameStarted`).
    pub async fn kickoff(app: &AppState, game: &Arc<ActiveGame>) {
        let players = {
            let guard = game.lock.lock().await;
            Self::player_infos(game, &guard)
        };
        app.broadcast(game, ServerEvent::GameStarted { game_id: game.game_id.clone(), players }).await;
        let mut guard = game.lock.lock().await;
        Self::drain_auto_draws(app, game, &mut guard).await;
        let snapshot = guard.clone();
        drop(guard);
        Self::broadcast_round_started(app, game, &snapshot).await;
    }

    fn should_end_game(state: &GameState) -> bool {
        if state.seats.iter().any(|s| s.score < 0) {
            return true;
        }
        let max_hands = match state.settings.rules {
            mahjong_core::GameRules::Tonpuusen => 4,
            mahjong_core::GameRules::Hanchan => 8,
        };
        let wind_index: u32 = match state.round.round_wind {
            Wind::East => 0,
            Wind::South => 1,
            Wind::West => 2,
            Wind::North => 3,
        };
        let hands_played = wind_index * 4 + (state.round.round_number as u32 - 1) + 1;
        hands_played >= max_hands
    }

    async fn broadcast_round_started(app: &AppState, game: &Arc<ActiveGame>, state: &GameState) {
        let players = Self::player_infos(game, state);
        let current_seat = match state.round.phase {
            TurnPhase::AwaitingDraw { seat } => seat,
            TurnPhase::AwaitingDiscard { seat, .. } => seat,
            _ => state.round.dealer_seat,
        };
        for seat in 0..4u8 {
            app.send_to_seat(
                game,
                seat,
                ServerEvent::RoundStarted {
                    seat,
                    round_wind: wind_to_wire(state.round.round_wind),
                    round_number: state.round.round_number as u32,
                    dealer_seat: state.round.dealer_seat,
                    current_seat,
                    dora_indicators: state.round.wall.dora_indicators().iter().map(|t| t.id()).collect(),
                    honba: state.round.honba,
                    riichi_sticks: state.round.riichi_sticks,
                    my_tiles: state.seat(seat).hand.iter().map(|t| t.id()).collect(),
                    players: players.clone(),
                },
            )
            .await;
        }
    }

    /// Builds the full-table snapshot sent on a successful reconnect (spec
    /// §4.4): everything a client would otherwise have pieced together from
    /// the event stream it missed while disconnected.
    pub fn reconnect_snapshot(
        game: &Arc<ActiveGame>,
        state: &GameState,
        seat: u8,
    ) -> protocol::ReconnectSnapshotWire {
        let current_seat = match state.round.phase {
            TurnPhase::AwaitingDraw { seat } => seat,
            TurnPhase::AwaitingDiscard { seat, .. } => seat,
            _ => state.round.dealer_seat,
        };
        let mut melds = Vec::new();
        let mut discards = Vec::new();
        for s in 0..4u8 {
            for meld in &state.seat(s).melds {
                melds.push((s, meld_to_wire(meld), meld.tiles().iter().map(|t| t.id()).collect()));
            }
            for discard in &state.seat(s).discards {
                discards.push((s, discard.tile.id()));
            }
        }
        protocol::ReconnectSnapshotWire {
            seat,
            round_wind: wind_to_wire(state.round.round_wind),
            round_number: state.round.round_number as u32,
            dealer_seat: state.round.dealer_seat,
            current_seat,
            dora_indicators: state.round.wall.dora_indicators().iter().map(|t| t.id()).collect(),
            honba: state.round.honba,
            riichi_sticks: state.round.riichi_sticks,
            my_tiles: state.seat(seat).hand.iter().map(|t| t.id()).collect(),
            melds,
            discards,
            players: Self::player_infos(game, state),
        }
    }

    /// Completes a reconnect once [`AppState::reconnect`] has validated the
    /// token and flipped the seat back to human (spec §4.4): sends the
    /// reconnecting seat its snapshot, tells the rest of the table, restores
    /// its chess-clock bank, and — if it's currently this seat's turn with
    /// no call prompt or round-advance pending — re-sends the `Draw` event
    /// directly (not through the replay journal, so it isn't double-recorded)
    /// and starts a fresh turn timer for it.
    pub async fn resume_after_reconnect(app: &AppState, game: &Arc<ActiveGame>, seat: u8) {
        let snapshot = {
            let guard = game.lock.lock().await;
            guard.clone()
        };
        let bank = app.timers.capture_remaining_bank(&game.game_id, seat).await;
        app.timers.restore_bank(&game.game_id, seat, bank).await;
        app.send_to_seat(
            game,
            seat,
            ServerEvent::GameReconnected { snapshot: Self::reconnect_snapshot(game, &snapshot, seat) },
        )
        .await;
        for other in (0..4u8).filter(|&s| s != seat) {
            app.send_to_seat(game, other, ServerEvent::PlayerReconnected { seat }).await;
        }
        if let TurnPhase::AwaitingDiscard { seat: acting, .. } = snapshot.round.phase {
            if acting == seat {
                if let Some(&tile) = snapshot.seat(seat).hand.last() {
                    let actions = available_actions_for(&snapshot, seat);
                    app.send_to_seat(
                        game,
                        seat,
                        ServerEvent::Draw { seat, tile_id: tile.id(), available_actions: Some(actions) },
                    )
                    .await;
                    let durations: crate::timer_manager::TurnDurations =
                        (&app.config.current.read().await.timers).into();
                    app.timers.start_turn_timer(&game.game_id, seat, durations.turn_increment).await;
                }
            }
        }
    }

    fn player_infos(game: &Arc<ActiveGame>, state: &GameState) -> Vec<PlayerInfoWire> {
        (0..4u8)
            .map(|seat| PlayerInfoWire {
                seat,
                name: game.players[seat as usize].name.clone(),
                score: state.seat(seat).score,
                is_ai: state.seat(seat).is_ai,
            })
            .collect()
    }

    /// Translates pure domain events into wire events and routes them to the
    /// seats that should see them.
    async fn emit(app: &AppState, game: &Arc<ActiveGame>, state: &GameState, events: &[GameEvent]) {
        for event in events {
            match event {
                GameEvent::TileDrawn { seat } => {
                    if let Some(tile) = state.seat(*seat).hand.last().copied() {
                        let actions = available_actions_for(state, *seat);
                        app.send_to_seat(
                            game,
                            *seat,
                            ServerEvent::Draw { seat: *seat, tile_id: tile.id(), available_actions: Some(actions) },
                        )
                        .await;
                    }
                }
                GameEvent::TileDiscarded { seat, tile, riichi_declaration } => {
                    app.broadcast(
                        game,
                        ServerEvent::Discard {
                            seat: *seat,
                            tile_id: tile.id(),
                            is_tsumogiri: false,
                            is_riichi: *riichi_declaration,
                        },
                    )
                    .await;
                    if let TurnPhase::AwaitingCallResponses { eligible_seats, discarded_tile, discarding_seat, .. } =
                        &state.round.phase
                    {
                        let callers = eligible_seats
                            .iter()
                            .map(|&s| CallerWire {
                                seat: s,
                                meld_type: None,
                                chi_options: if s == GameState::next_seat(*discarding_seat) {
                                    mahjong_core::meld::chi_options(&state.seat(s).hand, *discarded_tile)
                                        .into_iter()
                                        .map(|(a, b)| (a.id(), b.id()))
                                        .collect()
                                } else {
                                    Vec::new()
                                },
                            })
                            .collect();
                        app.broadcast(
                            game,
                            ServerEvent::CallPrompt {
                                call_type: CallTypeWire::Meld,
                                tile_id: discarded_tile.id(),
                                from_seat: *discarding_seat,
                                callers,
                            },
                        )
                        .await;
                    }
                }
                GameEvent::MeldCalled { meld } => {
                    app.broadcast(
                        game,
                        ServerEvent::Meld {
                            meld_type: meld_to_wire(meld),
                            caller_seat: meld.owner(),
                            tile_ids: meld.tiles().iter().map(|t| t.id()).collect(),
                            from_seat: None,
                            called_tile_id: None,
                        },
                    )
                    .await;
                }
                GameEvent::DoraRevealed { indicators } => {
                    for indicator in indicators {
                        app.broadcast(game, ServerEvent::DoraRevealed { tile_id: indicator.id() }).await;
                    }
                }
                GameEvent::RiichiDeclared { seat } => {
                    app.broadcast(game, ServerEvent::RiichiDeclared { seat: *seat }).await;
                }
                GameEvent::IppatsuCleared { .. } => {}
                GameEvent::FuritenChanged { seat, furiten } => {
                    app.send_to_seat(game, *seat, ServerEvent::Furiten { seat: *seat, is_furiten: *furiten }).await;
                }
                GameEvent::RoundEnded { result, scores_delta } => {
                    app.broadcast(game, ServerEvent::RoundEnd { result: round_result_to_wire(result, *scores_delta) })
                        .await;
                    if state.game_over {
                        app.replays.finish_game(&game.game_id).await;
                        app.timers.remove_game(&game.game_id).await;
                        let standings = Self::standings(game, state);
                        app.history
                            .finish_game(
                                &game.game_id,
                                crate::session_manager::unix_timestamp(),
                                crate::game_history::EndReason::Completed,
                                Some(state.round.round_number as u32),
                                Some(standings.iter().map(|s| (s.seat, s.name.clone(), s.score)).collect()),
                            )
                            .await;
                        app.broadcast(
                            game,
                            ServerEvent::GameEnded {
                                winner_seat: standings.first().map(|s| s.seat),
                                standings,
                                num_rounds: state.round.round_number as u32,
                            },
                        )
                        .await;
                    }
                }
                GameEvent::GameEnded { .. } => {}
                GameEvent::RoundAdvanced { .. } => {}
            }
        }
    }

    fn standings(game: &Arc<ActiveGame>, state: &GameState) -> Vec<StandingWire> {
        let mut standings: Vec<StandingWire> = (0..4u8)
            .map(|seat| StandingWire {
                seat,
                name: game.players[seat as usize].name.clone(),
                score: state.seat(seat).score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    /// Applies the default action a [`crate::timer_manager::TimeoutEvent`]
    /// owes (spec §4.5): tsumogiri on a turn timeout, a pass on a meld/
    /// chankan timeout, a synthetic confirm on a round-advance timeout.
    /// A no-op if the game has since moved past the phase the timer was for.
    pub async fn handle_timeout(app: &AppState, event: crate::timer_manager::TimeoutEvent) {
        let Some(game) = app.find_active_game(&event.game_id).await else { return };
        match event.kind {
            crate::timer_manager::TimeoutKind::RoundAdvance => {
                Self::confirm_round(app, &game, event.seat).await;
                return;
            }
            _ => {}
        }
        let mut guard = game.lock.lock().await;
        let result = match (&guard.round.phase, event.kind) {
            (TurnPhase::AwaitingDiscard { seat, .. }, crate::timer_manager::TimeoutKind::Turn)
                if *seat == event.seat =>
            {
                let Some(&tile) = guard.seat(event.seat).hand.last() else { return };
                Some(round::discard_tile(guard.clone(), event.seat, tile, false))
            }
            (TurnPhase::AwaitingCallResponses { eligible_seats, responded, .. }, crate::timer_manager::TimeoutKind::Meld)
                if eligible_seats.contains(&event.seat) && !responded.contains(&event.seat) =>
            {
                Some(round::pass_call(guard.clone(), event.seat))
            }
            (TurnPhase::AwaitingChankanResponses { eligible_seats, responded, .. }, crate::timer_manager::TimeoutKind::Meld)
                if eligible_seats.contains(&event.seat) && !responded.contains(&event.seat) =>
            {
                Some(round::pass_chankan(guard.clone(), event.seat))
            }
            _ => None,
        };
        if let Some(result) = result {
            let _ = Self::commit(app, &game, &mut guard, result).await;
        }
    }

    /// Drives every AI seat's turn to completion after a human is replaced
    /// (spec §4.3's "the AI plays on in the seat's place" substitution
    /// contract). Re-checks the phase after each step, since one AI action
    /// (a discard) can open a call window other AI seats must also answer
    /// before anyone's turn moves forward again.
    pub async fn drive_ai(app: &AppState, game: &Arc<ActiveGame>) {
        let engine = StandardScoringEngine;
        loop {
            let mut guard = game.lock.lock().await;
            if guard.game_over {
                break;
            }
            let step = match guard.round.phase.clone() {
                TurnPhase::AwaitingDraw { seat } if guard.seat(seat).is_ai => {
                    Some(round::draw_tile(guard.clone(), seat))
                }
                TurnPhase::AwaitingDiscard { seat, .. } if guard.seat(seat).is_ai => {
                    if mahjong_core::hand_rules::is_winning_hand(&guard.seat(seat).hand, &guard.seat(seat).melds) {
                        Some(round::declare_tsumo(guard.clone(), seat, &engine))
                    } else {
                        let tile = Self::ai_choose_discard(&guard, seat);
                        Some(round::discard_tile(guard.clone(), seat, tile, false))
                    }
                }
                TurnPhase::AwaitingCallResponses { eligible_seats, responded, .. } => {
                    eligible_seats
                        .iter()
                        .find(|s| !responded.contains(s) && guard.seat(**s).is_ai)
                        .map(|&seat| round::pass_call(guard.clone(), seat))
                }
                TurnPhase::AwaitingChankanResponses { eligible_seats, responded, .. } => {
                    eligible_seats
                        .iter()
                        .find(|s| !responded.contains(s) && guard.seat(**s).is_ai)
                        .map(|&seat| round::pass_chankan(guard.clone(), seat))
                }
                _ => None,
            };
            let Some(result) = step else { break };
            if Self::commit(app, game, &mut guard, result).await.is_err() {
                break;
            }
        }
    }

    /// A deliberately simple AI discard policy: the first tile that doesn't
    /// violate a live kuikae restriction. Not a competitive bot, just enough
    /// to keep a table moving once a seat has been handed to AI.
    fn ai_choose_discard(state: &GameState, seat: u8) -> mahjong_core::Tile {
        let s = state.seat(seat);
        s.hand
            .iter()
            .copied()
            .find(|t| !s.kuikae_forbidden_kinds.contains(&t.kind()))
            .unwrap_or(s.hand[0])
    }
}

/// Legal in-round actions for the seat that just drew, used to populate the
/// owning seat's `Draw` event so the client knows what buttons to show.
fn available_actions_for(state: &GameState, seat: u8) -> Vec<AvailableActionWire> {
    let mut actions = vec![AvailableActionWire::Discard];
    let s = state.seat(seat);

    if mahjong_core::hand_rules::is_winning_hand(&s.hand, &s.melds) {
        actions.push(AvailableActionWire::DeclareTsumo);
    }
    if round::can_declare_kyuushu_kyuuhai(state, seat) {
        actions.push(AvailableActionWire::CallKyuushu);
    }
    if !s.riichi {
        if let Some(&tile) = s.hand.last() {
            let mut without_drawn = s.hand.clone();
            if let Some(pos) = without_drawn.iter().position(|t| *t == tile) {
                without_drawn.remove(pos);
            }
            let eligible = s.is_closed()
                && s.score >= 1000
                && state.round.wall.remaining_live() >= 4
                && mahjong_core::hand_rules::is_tenpai(&without_drawn, &s.melds);
            if eligible {
                actions.push(AvailableActionWire::DeclareRiichi { tile_id: tile.id() });
            }
        }
    }

    let mut kind_counts = [0u8; mahjong_core::NUM_TILE_TYPES as usize];
    for tile in &s.hand {
        kind_counts[tile.kind() as usize] += 1;
    }
    for (kind, &count) in kind_counts.iter().enumerate() {
        if count == 4 {
            if let Some(tile) = s.hand.iter().find(|t| t.kind() as usize == kind) {
                actions.push(AvailableActionWire::CallKan { kan_type: KanTypeWire::Closed, tile_id: tile.id() });
            }
        }
    }
    for meld in &s.melds {
        if let mahjong_core::Meld::Pon { tiles, .. } = meld {
            if let Some(tile) = s.hand.iter().find(|t| t.same_kind(tiles[0])) {
                actions.push(AvailableActionWire::CallKan { kan_type: KanTypeWire::Added, tile_id: tile.id() });
            }
        }
    }
    actions
}

fn meld_to_wire(meld: &mahjong_core::Meld) -> MeldTypeWire {
    match meld {
        mahjong_core::Meld::Pon { .. } => MeldTypeWire::Pon,
        mahjong_core::Meld::Chi { .. } => MeldTypeWire::Chi,
        mahjong_core::Meld::Kan { kind, .. } => match kind {
            mahjong_core::meld::KanKind::Closed => MeldTypeWire::ClosedKan,
            mahjong_core::meld::KanKind::Open => MeldTypeWire::OpenKan,
            mahjong_core::meld::KanKind::Added => MeldTypeWire::AddedKan,
        },
    }
}

fn wind_to_wire(wind: Wind) -> u8 {
    match wind {
        Wind::East => 0,
        Wind::South => 1,
        Wind::West => 2,
        Wind::North => 3,
    }
}

fn round_result_to_wire(result: &CoreRoundResult, deltas: [i64; 4]) -> RoundResultWire {
    // `han`/`fu` aren't threaded through `GameEvent::RoundEnded`; only the
    // settled score delta is. Clients can infer payment size from the delta.
    match result {
        CoreRoundResult::Tsumo { winner } => RoundResultWire::Tsumo { winner_seat: *winner, han: 0, fu: 0, deltas },
        CoreRoundResult::Ron { winner, discarder } => {
            RoundResultWire::Ron { winner_seat: *winner, loser_seat: *discarder, han: 0, fu: 0, deltas }
        }
        CoreRoundResult::DoubleRon { winners, discarder } => RoundResultWire::DoubleRon {
            winner_seats: (winners[0], *winners.get(1).unwrap_or(&winners[0])),
            loser_seat: *discarder,
            deltas,
        },
        CoreRoundResult::ExhaustiveDraw { tenpai_seats } => {
            RoundResultWire::ExhaustiveDraw { tempai_seats: tenpai_seats.clone(), deltas }
        }
        CoreRoundResult::NagashiMangan { seat } => RoundResultWire::NagashiMangan { seats: vec![*seat], deltas },
        CoreRoundResult::AbortiveDraw { reason } => RoundResultWire::AbortiveDraw { reason: abortive_to_wire(*reason) },
    }
}

fn abortive_to_wire(reason: CoreAbortiveReason) -> AbortiveReasonWire {
    match reason {
        CoreAbortiveReason::FourWinds => AbortiveReasonWire::FourWinds,
        CoreAbortiveReason::FourKans => AbortiveReasonWire::FourKans,
        CoreAbortiveReason::FourRiichi => AbortiveReasonWire::FourRiichi,
        CoreAbortiveReason::TripleRon => AbortiveReasonWire::TripleRon,
        CoreAbortiveReason::KyuushuKyuuhai => AbortiveReasonWire::KyuushuKyuuhai,
    }
}

fn round_error_to_wire(err: RoundError) -> ActionError {
    let code = match err {
        RoundError::TileNotInHand(..) | RoundError::MustDrawFirst { .. } | RoundError::RiichiLocksDiscardChoice { .. } => {
            GameErrorCode::InvalidDiscard
        }
        RoundError::KuikaeViolation { .. } => GameErrorCode::InvalidDiscard,
        RoundError::AlreadyInRiichi { .. }
        | RoundError::RiichiNotEligible { .. }
        | RoundError::InsufficientScoreForRiichi { .. }
        | RoundError::InsufficientWallForRiichi { .. } => GameErrorCode::InvalidRiichi,
        RoundError::InvalidPon { .. } => GameErrorCode::InvalidPon,
        RoundError::InvalidChi { .. } => GameErrorCode::InvalidChi,
        RoundError::InvalidKan { .. } => GameErrorCode::InvalidKan,
        RoundError::Furiten { .. } | RoundError::NotAWinningHand { .. } => GameErrorCode::InvalidRon,
        RoundError::NotAwaitingThisSeat { .. } | RoundError::WrongPhase { .. } => GameErrorCode::NotYourTurn,
        RoundError::WallExhausted | RoundError::NoPendingCall | RoundError::AlreadyResponded { .. } => {
            GameErrorCode::GameError
        }
    };
    (ErrorCode::Game(code), err.to_string())
}

fn game_err(code: GameErrorCode, message: &str) -> ActionError {
    (ErrorCode::Game(code), message.to_string())
}
