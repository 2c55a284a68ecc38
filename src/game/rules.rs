use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    combat::{self, MoveOutcome},
    ledger,
    state::{
        BattleLogEntry, Combatant, IntegrityError, Match, MatchPhase, Move, MoveHistoryEntry,
        Side, VictoryState,
    },
    victory,
};
use crate::mirror::{MatchMirror, NoopMirror};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("match is already finished")]
    MatchFinished,
    #[error("expected match phase {expected:?}, found {actual:?}")]
    InvalidPhase {
        expected: MatchPhase,
        actual: MatchPhase,
    },
    #[error("{side} already submitted a move this turn")]
    SideAlreadyReady { side: Side },
    #[error("unknown move `{value}`")]
    UnknownMove { value: String },
    #[error("unknown side `{value}`")]
    UnknownSide { value: String },
    #[error("match invariant violated: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl FromStr for Move {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attack" => Ok(Move::Attack),
            "defend" => Ok(Move::Defend),
            "powerup" | "power-up" | "power_up" => Ok(Move::PowerUp),
            _ => Err(RuleError::UnknownMove {
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Side {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player1" => Ok(Side::Player1),
            "player2" => Ok(Side::Player2),
            _ => Err(RuleError::UnknownSide {
                value: s.to_string(),
            }),
        }
    }
}

/// 对局事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GameEvent {
    MatchStarted {
        player1: String,
        player2: String,
    },
    /// Deliberately omits the move so the opponent cannot read it.
    MoveSelected {
        side: Side,
        turn: u32,
    },
    ResolutionStarted {
        turn: u32,
    },
    TurnResolved {
        entry: BattleLogEntry,
    },
    MatchFinished {
        victory: VictoryState,
    },
    MatchReset,
    MirrorFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: Match,
    pub events: Vec<GameEvent>,
    /// Locked-in snapshot taken before the turn was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolving: Option<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl RuleResolution {
    pub fn new(state: Match, events: Vec<GameEvent>) -> Self {
        let victory = state.victory.clone();
        Self {
            state,
            events,
            resolving: None,
            victory,
        }
    }

    pub fn with_resolving(mut self, resolving: Match) -> Self {
        self.resolving = Some(resolving);
        self
    }
}

pub struct RuleEngine {
    mirror: Box<dyn MatchMirror>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            mirror: Box::new(NoopMirror),
        }
    }

    pub fn with_mirror(mirror: Box<dyn MatchMirror>) -> Self {
        Self { mirror }
    }

    pub fn set_mirror(&mut self, mirror: Box<dyn MatchMirror>) {
        self.mirror = mirror;
    }

    fn ensure_integrity(state: &Match) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_phase(state: &Match, expected: MatchPhase) -> Result<(), RuleError> {
        if state.phase == MatchPhase::Finished && expected != MatchPhase::Finished {
            return Err(RuleError::MatchFinished);
        }
        if state.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_side_open(state: &Match, side: Side) -> Result<(), RuleError> {
        if state.combatant(side).is_ready {
            return Err(RuleError::SideAlreadyReady { side });
        }
        Ok(())
    }

    fn mirror_snapshot(&mut self, state: &Match, events: &mut Vec<GameEvent>) {
        if let Err(error) = self.mirror.record(state) {
            warn!(%error, turn = state.current_turn, "match mirror failed");
            events.push(GameEvent::MirrorFailed {
                reason: error.to_string(),
            });
        }
    }

    pub fn start_match(
        &mut self,
        state: &Match,
        player1_name: &str,
        player2_name: &str,
    ) -> Result<RuleResolution, RuleError> {
        Self::ensure_phase(state, MatchPhase::Lobby)?;

        let next = Match::new(player1_name, player2_name);
        info!(player1 = player1_name, player2 = player2_name, "match started");

        let mut events = vec![GameEvent::MatchStarted {
            player1: next.player1.name.clone(),
            player2: next.player2.name.clone(),
        }];
        self.mirror_snapshot(&next, &mut events);
        Ok(RuleResolution::new(next, events))
    }

    /// Locks in a move; resolves the turn once both sides are ready.
    pub fn select_move(
        &mut self,
        state: &Match,
        side: Side,
        chosen: Move,
    ) -> Result<RuleResolution, RuleError> {
        if let Err(error) = Self::ensure_phase(state, MatchPhase::Playing)
            .and_then(|_| Self::ensure_side_open(state, side))
        {
            warn!(%side, %error, "move rejected");
            return Err(error);
        }
        Self::ensure_integrity(state)?;

        let mut next = state.clone();
        let combatant = next.combatant_mut(side);
        combatant.current_move = Some(chosen);
        combatant.is_ready = true;
        debug!(%side, turn = next.current_turn, "move locked in");

        let mut events = vec![GameEvent::MoveSelected {
            side,
            turn: next.current_turn,
        }];

        if !next.both_ready() {
            self.mirror_snapshot(&next, &mut events);
            return Ok(RuleResolution::new(next, events));
        }

        let resolving = begin_resolution(&next)?;
        events.push(GameEvent::ResolutionStarted {
            turn: resolving.current_turn,
        });

        let resolved = resolve_turn(&resolving)?;
        if let Some(entry) = resolved.last_entry() {
            events.push(GameEvent::TurnResolved {
                entry: entry.clone(),
            });
        }
        if let Some(victory) = &resolved.victory {
            info!(winner = %victory.label, turns = resolved.turns_played(), "match finished");
            events.push(GameEvent::MatchFinished {
                victory: victory.clone(),
            });
        }

        self.mirror_snapshot(&resolved, &mut events);
        Ok(RuleResolution::new(resolved, events).with_resolving(resolving))
    }

    /// Unconditionally returns to a fresh lobby.
    pub fn reset(&mut self) -> RuleResolution {
        let next = Match::lobby();
        info!("match reset");
        let mut events = vec![GameEvent::MatchReset];
        self.mirror_snapshot(&next, &mut events);
        RuleResolution::new(next, events)
    }
}

/// Moves a match whose sides are both ready into `resolving`.
pub fn begin_resolution(state: &Match) -> Result<Match, RuleError> {
    RuleEngine::ensure_phase(state, MatchPhase::Playing)?;
    for side in Side::ALL {
        if state.combatant(side).current_move.is_none() {
            return Err(RuleError::IntegrityViolation {
                error: IntegrityError::MissingMove { side },
            });
        }
    }

    let mut next = state.clone();
    next.phase = MatchPhase::Resolving;
    Ok(next)
}

/// Resolves one simultaneous round.
///
/// Both sides are computed from the pre-turn snapshot; neither observes the
/// other's post-turn state.
pub fn resolve_turn(state: &Match) -> Result<Match, RuleError> {
    RuleEngine::ensure_phase(state, MatchPhase::Resolving)?;
    RuleEngine::ensure_integrity(state)?;

    let p1 = &state.player1;
    let p2 = &state.player2;
    let move1 = locked_move(p1)?;
    let move2 = locked_move(p2)?;

    let outcome1 = combat::compute_outcome(p1, p2, move1, move2);
    let outcome2 = combat::compute_outcome(p2, p1, move2, move1);

    // Counter-damage lands on the side that attacked into a Defend.
    let taken1 = outcome2.damage + outcome1.counter_damage;
    let taken2 = outcome1.damage + outcome2.counter_damage;

    let turn = state.current_turn;
    let mut next = state.clone();
    next.player1 = settle_side(p1, move1, move2, taken1, outcome1, turn);
    next.player2 = settle_side(p2, move2, move1, taken2, outcome2, turn);

    let entry = BattleLogEntry {
        turn,
        player1_move: move1,
        player2_move: move2,
        player1_damage: taken1,
        player2_damage: taken2,
        player1_healing: outcome1.healing,
        player2_healing: outcome2.healing,
    };
    debug!(?entry, "turn resolved");
    next.battle_log.push(entry);
    next.current_turn += 1;

    let verdict = victory::evaluate(next.player1.hp, next.player2.hp, turn);
    match verdict.into_victory(&next.player1.name, &next.player2.name) {
        Some(victory) => next.declare_victory(victory),
        None => next.phase = MatchPhase::Playing,
    }

    RuleEngine::ensure_integrity(&next)?;
    Ok(next)
}

fn locked_move(combatant: &Combatant) -> Result<Move, RuleError> {
    combatant
        .current_move
        .ok_or(RuleError::IntegrityViolation {
            error: IntegrityError::MissingMove { side: combatant.id },
        })
}

fn settle_side(
    before: &Combatant,
    chosen: Move,
    opponent_move: Move,
    damage_taken: u32,
    own: MoveOutcome,
    turn: u32,
) -> Combatant {
    let mut next = before.clone();

    let hp = before.hp as i64 - damage_taken as i64 + own.healing as i64;
    next.hp = hp.clamp(0, before.max_hp as i64) as u8;
    ledger::settle(before, chosen, opponent_move).apply(&mut next);

    next.current_move = None;
    next.is_ready = false;
    next.move_history.push(MoveHistoryEntry {
        turn,
        chosen,
        damage_dealt: own.damage,
    });
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{VictoryReason, MAX_ENERGY, MAX_HP};
    use crate::game::victory::TURN_CAP;
    use crate::mirror::MirrorError;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn playing() -> Match {
        Match::new("Ayla", "Bram")
    }

    fn play_turn(engine: &mut RuleEngine, state: &Match, m1: Move, m2: Move) -> RuleResolution {
        let first = engine
            .select_move(state, Side::Player1, m1)
            .expect("player1 move should be accepted");
        engine
            .select_move(&first.state, Side::Player2, m2)
            .expect("player2 move should be accepted")
    }

    #[derive(Clone, Default)]
    struct RecordingMirror {
        snapshots: Rc<RefCell<Vec<Match>>>,
    }

    impl MatchMirror for RecordingMirror {
        fn record(&mut self, snapshot: &Match) -> Result<(), MirrorError> {
            self.snapshots.borrow_mut().push(snapshot.clone());
            Ok(())
        }
    }

    struct FailingMirror;

    impl MatchMirror for FailingMirror {
        fn record(&mut self, _snapshot: &Match) -> Result<(), MirrorError> {
            Err(MirrorError::Unavailable("network down".into()))
        }
    }

    #[test]
    fn attack_into_defend_scenario() {
        let mut engine = RuleEngine::new();
        let resolution = play_turn(&mut engine, &playing(), Move::Attack, Move::Defend);
        let state = resolution.state;

        assert_eq!(state.player2.hp, 92);
        assert_eq!(state.player1.hp, 95);
        assert_eq!(state.player1.energy, 45);
        assert_eq!(state.player2.energy, 65);

        let entry = state.last_entry().expect("turn should be logged");
        assert_eq!(entry.player1_damage, 5);
        assert_eq!(entry.player2_damage, 8);
        assert_eq!(state.player1.move_history[0].damage_dealt, 8);
    }

    #[test]
    fn power_up_into_attack_scenario() {
        let mut engine = RuleEngine::new();
        let state = play_turn(&mut engine, &playing(), Move::PowerUp, Move::Attack).state;

        assert_eq!(state.player1.hp, 85);
        assert_eq!(state.player1.energy, 65);
        assert_eq!(state.player1.power_up_multiplier, 1.5);
        assert!(state.player1.has_attack_buff);

        assert_eq!(state.player2.hp, 100);
        assert_eq!(state.player2.energy, 45);
        assert_eq!(state.player2.power_up_multiplier, 1.0);
        assert!(!state.player2.has_attack_buff);

        let entry = state.last_entry().expect("turn should be logged");
        assert_eq!(entry.player1_damage, 25);
        assert_eq!(entry.player1_healing, 10);
    }

    #[test]
    fn attack_buff_is_consumed_next_turn() {
        let mut engine = RuleEngine::new();
        let first = play_turn(&mut engine, &playing(), Move::PowerUp, Move::Attack).state;
        let second = play_turn(&mut engine, &first, Move::Attack, Move::PowerUp).state;

        // 25 * 1.5 multiplier * 1.5 buff = 56.25
        assert_eq!(second.player1.move_history[1].damage_dealt, 56);
        assert!(!second.player1.has_attack_buff);
        assert_eq!(second.player1.power_up_multiplier, 1.0);
    }

    #[test]
    fn consecutive_attacks_bring_fatigue() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        let mut dealt = Vec::new();
        for _ in 0..3 {
            state = play_turn(&mut engine, &state, Move::Attack, Move::Attack).state;
            dealt.push(state.last_entry().map(|e| e.player2_damage).unwrap_or_default());
        }

        assert_eq!(state.player1.consecutive_attacks, 3);
        assert_eq!(state.player2.consecutive_attacks, 3);
        assert_eq!(dealt, vec![33, 23, 23]);
        assert!(dealt[1] < dealt[0]);
    }

    #[test]
    fn simultaneous_knockout_is_draw() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        state.player1.hp = 20;
        state.player2.hp = 20;

        let resolution = play_turn(&mut engine, &state, Move::Attack, Move::Attack);
        let state = resolution.state;
        assert_eq!(state.phase, MatchPhase::Finished);
        assert_eq!(state.winner(), Some("Draw"));
        assert_eq!(
            resolution.victory.map(|v| v.reason),
            Some(VictoryReason::DoubleKnockout)
        );
    }

    #[test]
    fn knockout_names_the_survivor() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        state.player2.hp = 8;

        let state = play_turn(&mut engine, &state, Move::Attack, Move::Defend).state;
        assert_eq!(state.player2.hp, 0);
        assert_eq!(state.winner(), Some("Ayla"));
        assert!(state.player1.current_move.is_none());
    }

    #[test]
    fn turn_cap_ends_the_match_by_hp() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        for _ in 1..TURN_CAP {
            state = play_turn(&mut engine, &state, Move::Defend, Move::PowerUp).state;
            assert_eq!(state.phase, MatchPhase::Playing);
        }
        state.player1.hp = 60;

        let state = play_turn(&mut engine, &state, Move::Defend, Move::Defend).state;
        assert_eq!(state.phase, MatchPhase::Finished);
        assert_eq!(state.winner(), Some("Bram"));
        assert_eq!(state.turns_played(), TURN_CAP);
        assert_eq!(
            state.victory.as_ref().map(|v| v.reason),
            Some(VictoryReason::TurnLimit)
        );
    }

    #[test]
    fn turn_and_log_advance_together() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        let script = [
            (Move::Attack, Move::Defend),
            (Move::PowerUp, Move::PowerUp),
            (Move::Defend, Move::Attack),
            (Move::Attack, Move::Attack),
        ];
        for (turn, (m1, m2)) in script.into_iter().enumerate() {
            let half = engine
                .select_move(&state, Side::Player2, m2)
                .expect("player2 move should be accepted");
            assert_eq!(half.state.current_turn, state.current_turn);
            assert_eq!(half.state.battle_log.len(), state.battle_log.len());

            state = engine
                .select_move(&half.state, Side::Player1, m1)
                .expect("player1 move should be accepted")
                .state;
            assert_eq!(state.current_turn, turn as u32 + 2);
            assert_eq!(state.battle_log.len() as u32, state.current_turn - 1);
        }
    }

    #[test]
    fn bounds_hold_across_a_long_match() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        let cycle = [Move::PowerUp, Move::PowerUp, Move::PowerUp, Move::PowerUp, Move::Attack];
        let mut turn = 0;
        while !state.is_finished() {
            let m1 = cycle[turn % cycle.len()];
            let m2 = cycle[(turn + 2) % cycle.len()];
            state = play_turn(&mut engine, &state, m1, m2).state;
            for side in Side::ALL {
                let fighter = state.combatant(side);
                assert!(fighter.hp <= MAX_HP);
                assert!(fighter.energy <= MAX_ENERGY);
                assert!((1.0..=2.5).contains(&fighter.power_up_multiplier));
            }
            turn += 1;
        }
        assert!(state.turns_played() <= TURN_CAP);
    }

    #[test]
    fn healing_never_exceeds_max_hp() {
        let mut engine = RuleEngine::new();
        let state = play_turn(&mut engine, &playing(), Move::PowerUp, Move::Defend).state;
        assert_eq!(state.player1.hp, MAX_HP);
        assert_eq!(state.player1.energy, 65);
    }

    #[test]
    fn resolution_exposes_locked_snapshot() {
        let mut engine = RuleEngine::new();
        let resolution = play_turn(&mut engine, &playing(), Move::Attack, Move::Defend);
        let resolving = resolution.resolving.expect("resolving snapshot should be attached");

        assert_eq!(resolving.phase, MatchPhase::Resolving);
        assert_eq!(resolving.player1.current_move, Some(Move::Attack));
        assert_eq!(resolving.player2.hp, 100);
        assert!(resolution
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::ResolutionStarted { turn: 1 })));
        assert_eq!(resolution.state.phase, MatchPhase::Playing);
        assert!(!resolution.state.player1.is_ready);
    }

    #[test]
    fn side_cannot_submit_twice() {
        let mut engine = RuleEngine::new();
        let first = engine
            .select_move(&playing(), Side::Player1, Move::Attack)
            .expect("first move should be accepted");
        let error = engine
            .select_move(&first.state, Side::Player1, Move::Defend)
            .expect_err("second move should be rejected");
        assert_eq!(error, RuleError::SideAlreadyReady { side: Side::Player1 });
        assert_eq!(first.state.player1.current_move, Some(Move::Attack));
    }

    #[test]
    fn moves_rejected_outside_playing() {
        let mut engine = RuleEngine::new();
        let lobby = Match::lobby();
        assert_eq!(
            engine.select_move(&lobby, Side::Player1, Move::Attack).err(),
            Some(RuleError::InvalidPhase {
                expected: MatchPhase::Playing,
                actual: MatchPhase::Lobby
            })
        );
    }

    #[test]
    fn finished_match_is_terminal() {
        let mut engine = RuleEngine::new();
        let mut state = playing();
        state.player2.hp = 5;
        let finished = play_turn(&mut engine, &state, Move::Attack, Move::PowerUp).state;
        assert!(finished.is_finished());

        for side in Side::ALL {
            let error = engine
                .select_move(&finished, side, Move::Attack)
                .expect_err("finished match should reject moves");
            assert_eq!(error, RuleError::MatchFinished);
        }
        assert_eq!(finished.current_turn, 2);
    }

    #[test]
    fn resolving_without_moves_is_an_invariant_violation() {
        let mut state = playing();
        state.phase = MatchPhase::Resolving;
        let error = resolve_turn(&state).expect_err("resolution must not invent moves");
        assert!(matches!(error, RuleError::IntegrityViolation { .. }));
    }

    #[test]
    fn resolve_requires_resolving_phase() {
        let mut state = playing();
        for side in Side::ALL {
            let fighter = state.combatant_mut(side);
            fighter.current_move = Some(Move::Defend);
            fighter.is_ready = true;
        }
        assert!(matches!(
            resolve_turn(&state),
            Err(RuleError::InvalidPhase { .. })
        ));
        let resolving = begin_resolution(&state).expect("both sides are ready");
        assert!(resolve_turn(&resolving).is_ok());
    }

    #[test]
    fn start_requires_lobby_and_reset_always_works() {
        let mut engine = RuleEngine::new();
        let started = engine
            .start_match(&Match::lobby(), "Ayla", "Bram")
            .expect("lobby should start");
        assert_eq!(started.state.phase, MatchPhase::Playing);
        assert_eq!(started.state.player2.name, "Bram");

        assert!(engine.start_match(&started.state, "X", "Y").is_err());

        let reset = engine.reset();
        assert_eq!(reset.state, Match::lobby());
        assert!(matches!(reset.events.as_slice(), [GameEvent::MatchReset]));
    }

    #[test]
    fn mirror_sees_committed_snapshots_only() {
        let mirror = RecordingMirror::default();
        let snapshots = Rc::clone(&mirror.snapshots);
        let mut engine = RuleEngine::with_mirror(Box::new(mirror));

        let started = engine
            .start_match(&Match::lobby(), "Ayla", "Bram")
            .expect("lobby should start");
        play_turn(&mut engine, &started.state, Move::Attack, Move::Defend);

        let phases: Vec<MatchPhase> = snapshots.borrow().iter().map(|m| m.phase).collect();
        assert_eq!(
            phases,
            vec![MatchPhase::Playing, MatchPhase::Playing, MatchPhase::Playing]
        );
        assert_eq!(snapshots.borrow().last().map(|m| m.current_turn), Some(2));
    }

    #[test]
    fn mirror_failure_does_not_change_outcome() {
        let mut quiet = RuleEngine::new();
        let mut failing = RuleEngine::with_mirror(Box::new(FailingMirror));

        let expected = play_turn(&mut quiet, &playing(), Move::PowerUp, Move::Attack);
        let actual = play_turn(&mut failing, &playing(), Move::PowerUp, Move::Attack);

        assert_eq!(expected.state, actual.state);
        assert!(actual
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::MirrorFailed { .. })));
    }

    #[test]
    fn parses_host_spellings() {
        assert_eq!("PowerUp".parse::<Move>(), Ok(Move::PowerUp));
        assert_eq!("power-up".parse::<Move>(), Ok(Move::PowerUp));
        assert_eq!("player2".parse::<Side>(), Ok(Side::Player2));
        assert!(matches!(
            "fireball".parse::<Move>(),
            Err(RuleError::UnknownMove { .. })
        ));
    }
}
