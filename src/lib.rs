pub mod ai;
pub mod config;
pub mod game;
pub mod mirror;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Function, Promise};

pub use ai::{choose_move_with_roll, AiAgent, AiDecision, DecisionRule};
pub use config::EngineConfig;
pub use game::{
    begin_resolution, compute_outcome, evaluate, resolve_turn, BattleLogEntry, CombatStats,
    Combatant, GameEvent, IntegrityError, Match, MatchPhase, Move, MoveHistoryEntry, MoveOutcome,
    RuleEngine, RuleError, RuleResolution, Side, Verdict, VictoryReason, VictoryState, TURN_CAP,
};
pub use mirror::{
    MatchMirror, MatchResultRecord, MatchStateRecord, MirrorError, MirrorPayload, MirrorStatus,
    MoveRecord, NoopMirror,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: &RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

fn parse_side(value: &str) -> Result<Side, JsValue> {
    value.parse::<Side>().map_err(to_js_error)
}

fn parse_move(value: &str) -> Result<Move, JsValue> {
    value.parse::<Move>().map_err(to_js_error)
}

/// Forwards snapshots to a host callback; whatever the callback returns is ignored.
struct JsCallbackMirror {
    callback: Function,
}

impl MatchMirror for JsCallbackMirror {
    fn record(&mut self, snapshot: &Match) -> Result<(), MirrorError> {
        let payload = MirrorPayload::from_match(snapshot);
        let value = to_value(&payload).map_err(|err| MirrorError::Encode(err.to_string()))?;
        self.callback
            .call1(&JsValue::NULL, &value)
            .map(|_| ())
            .map_err(|err| {
                let reason = err.as_string().unwrap_or_else(|| format!("{err:?}"));
                web_sys::console::warn_1(&format!("match mirror failed: {reason}").into());
                MirrorError::Rejected(reason)
            })
    }
}

#[derive(Serialize)]
struct AiMoveResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<AiDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<RuleResolution>,
}

#[wasm_bindgen]
pub struct BattleEngine {
    engine: RuleEngine,
    state: Match,
    agent: AiAgent,
    config: EngineConfig,
}

#[wasm_bindgen]
impl BattleEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<BattleEngine, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => EngineConfig::default(),
        };
        Ok(BattleEngine {
            engine: RuleEngine::new(),
            state: Match::lobby(),
            agent: AiAgent::from_config(&config),
            config,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.config).map_err(serde_to_js_error)
    }

    pub fn stats_json(&self) -> Result<String, JsValue> {
        let stats = [self.state.player1.stats(), self.state.player2.stats()];
        serde_json::to_string(&stats).map_err(serde_to_js_error)
    }

    pub fn start_match(&mut self, player1_name: &str, player2_name: &str) -> Result<String, JsValue> {
        let resolution = self
            .engine
            .start_match(&self.state, player1_name, player2_name)
            .map_err(to_js_error)?;
        self.commit(resolution)
    }

    pub fn select_move(&mut self, side: &str, chosen: &str) -> Result<String, JsValue> {
        let side = parse_side(side)?;
        let chosen = parse_move(chosen)?;
        let resolution = self
            .engine
            .select_move(&self.state, side, chosen)
            .map_err(to_js_error)?;
        self.commit(resolution)
    }

    pub fn reset(&mut self) -> Result<String, JsValue> {
        let resolution = self.engine.reset();
        self.commit(resolution)
    }

    pub fn apply_ai_move(&mut self, side: &str) -> Result<String, JsValue> {
        let side = parse_side(side)?;
        let response = if AiAgent::should_act(&self.state, side) {
            let decision = self.agent.decide(&self.state, side);
            let resolution = self
                .engine
                .select_move(&self.state, side, decision.action)
                .map_err(to_js_error)?;
            self.state = resolution.state.clone();
            AiMoveResponse {
                decision: Some(decision),
                applied: Some(resolution),
            }
        } else {
            AiMoveResponse {
                decision: None,
                applied: None,
            }
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    /// Resolves to the AI's decision JSON after the configured thinking pause.
    /// The engine state is not touched; submit the move with `select_move`.
    pub fn think_ai(&mut self, side: &str) -> Result<Promise, JsValue> {
        let side = parse_side(side)?;
        let state = self.state.clone();
        let delay = self.config.ai_think_delay_ms;
        let mut agent = self.agent.fork();

        Ok(future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let decision = agent.decide(&state, side);
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        }))
    }

    /// Resolves after the configured pause a host holds the resolving snapshot.
    pub fn settle(&self) -> Promise {
        let delay = self.config.resolve_settle_ms;
        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn set_mirror(&mut self, callback: Function) {
        self.engine.set_mirror(Box::new(JsCallbackMirror { callback }));
    }

    pub fn clear_mirror(&mut self) {
        self.engine.set_mirror(Box::new(NoopMirror));
    }
}

impl BattleEngine {
    fn commit(&mut self, resolution: RuleResolution) -> Result<String, JsValue> {
        let json = make_resolution_json(&resolution)?;
        self.state = resolution.state;
        Ok(json)
    }
}

#[wasm_bindgen(js_name = "startMatch")]
pub fn start_match(player1_name: &str, player2_name: &str) -> Result<JsValue, JsValue> {
    let mut engine = RuleEngine::new();
    match engine.start_match(&Match::lobby(), player1_name, player2_name) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "selectMove")]
pub fn select_move(state: JsValue, side: &str, chosen: &str) -> Result<JsValue, JsValue> {
    let state: Match = from_value(state).map_err(JsValue::from)?;
    let side = parse_side(side)?;
    let chosen = parse_move(chosen)?;
    let mut engine = RuleEngine::new();
    match engine.select_move(&state, side, chosen) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "resetMatch")]
pub fn reset_match() -> Result<JsValue, JsValue> {
    let mut engine = RuleEngine::new();
    to_value(&engine.reset()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(state: JsValue, side: &str, seed: Option<u64>) -> Result<JsValue, JsValue> {
    let state: Match = from_value(state).map_err(JsValue::from)?;
    let side = parse_side(side)?;
    let mut agent = seed.map(AiAgent::with_seed).unwrap_or_default();
    to_value(&agent.decide(&state, side)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "evaluateVictory")]
pub fn evaluate_victory(player1_hp: u8, player2_hp: u8, turn: u32) -> Result<JsValue, JsValue> {
    to_value(&evaluate(player1_hp, player2_hp, turn)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateMatch")]
pub fn validate_match(state: JsValue) -> Result<(), JsValue> {
    let state: Match = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

#[wasm_bindgen(js_name = "matchStats")]
pub fn match_stats(state: JsValue) -> Result<JsValue, JsValue> {
    let state: Match = from_value(state).map_err(JsValue::from)?;
    let stats: [CombatStats; 2] = [state.player1.stats(), state.player2.stats()];
    to_value(&stats).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
