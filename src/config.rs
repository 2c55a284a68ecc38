use serde::{Deserialize, Serialize};

const DEFAULT_AI_THINK_DELAY_MS: u32 = 800;
const DEFAULT_RESOLVE_SETTLE_MS: u32 = 1500;
const DEFAULT_TURN_TIME_LIMIT_SECS: u32 = 30;

/// Host pacing knobs. None of these affect how a turn resolves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub ai_think_delay_ms: u32,
    pub resolve_settle_ms: u32,
    /// Countdown shown by the host UI; the engine never enforces it.
    pub turn_time_limit_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_seed: Option<u64>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_ai_seed(mut self, seed: u64) -> Self {
        self.ai_seed = Some(seed);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ai_think_delay_ms: DEFAULT_AI_THINK_DELAY_MS,
            resolve_settle_ms: DEFAULT_RESOLVE_SETTLE_MS,
            turn_time_limit_secs: DEFAULT_TURN_TIME_LIMIT_SECS,
            ai_seed: None,
        }
    }
}
