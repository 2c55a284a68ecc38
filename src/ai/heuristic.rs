use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::game::{Combatant, Match, MatchPhase, Move, Side};

const LOW_HP: u8 = 30;
const OPPONENT_LOW_HP: u8 = 40;
const SURVIVAL_ENERGY: u8 = 15;
const CASH_IN_MULTIPLIER: f64 = 2.0;
const BUILD_MULTIPLIER_BELOW: f64 = 1.5;
const ATTACK_ENERGY: u8 = 20;
const REBUILD_BELOW_ENERGY: u8 = 30;
const POWER_UP_ENERGY: u8 = 15;
const DEFEND_ENERGY: u8 = 10;

/// Which rule of the priority list produced a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    Survival,
    CashIn,
    PressAdvantage,
    Rebuild,
    BuildMultiplier,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    pub side: Side,
    pub action: Move,
    pub rule: DecisionRule,
    pub roll: f64,
}

/// Priority-ordered decision list; the first matching rule wins.
///
/// `roll` is a uniform sample in `[0, 1)` and is only consulted by rules
/// that split between moves.
pub fn choose_move_with_roll(me: &Combatant, opponent: &Combatant, roll: f64) -> (Move, DecisionRule) {
    if me.hp < LOW_HP {
        let action = if me.energy < SURVIVAL_ENERGY || roll < 0.6 {
            Move::Defend
        } else {
            Move::PowerUp
        };
        return (action, DecisionRule::Survival);
    }

    if me.power_up_multiplier >= CASH_IN_MULTIPLIER && me.energy >= ATTACK_ENERGY {
        return (Move::Attack, DecisionRule::CashIn);
    }

    if opponent.hp < OPPONENT_LOW_HP && me.energy >= ATTACK_ENERGY {
        let action = if roll < 0.7 { Move::Attack } else { Move::PowerUp };
        return (action, DecisionRule::PressAdvantage);
    }

    if me.energy < REBUILD_BELOW_ENERGY {
        return (Move::PowerUp, DecisionRule::Rebuild);
    }

    if me.power_up_multiplier < BUILD_MULTIPLIER_BELOW && me.energy >= POWER_UP_ENERGY {
        let action = if roll < 0.5 { Move::PowerUp } else { Move::Attack };
        return (action, DecisionRule::BuildMultiplier);
    }

    (fallback_move(me.energy, roll), DecisionRule::Fallback)
}

fn fallback_move(energy: u8, roll: f64) -> Move {
    if energy >= ATTACK_ENERGY {
        if roll < 0.45 {
            Move::Attack
        } else if roll < 0.75 {
            Move::Defend
        } else {
            Move::PowerUp
        }
    } else if energy >= POWER_UP_ENERGY {
        if roll < 0.5 {
            Move::Defend
        } else {
            Move::PowerUp
        }
    } else if energy >= DEFEND_ENERGY {
        Move::Defend
    } else if roll < 0.5 {
        // out of energy for anything; gamble
        Move::Attack
    } else {
        Move::Defend
    }
}

#[derive(Debug, Clone)]
pub struct AiAgent {
    rng: SmallRng,
}

impl Default for AiAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl AiAgent {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        config.ai_seed.map(Self::with_seed).unwrap_or_default()
    }

    /// Independent agent seeded from this one's stream.
    pub fn fork(&mut self) -> Self {
        Self::with_seed(self.rng.gen())
    }

    /// The automated side moves only after the other side has committed.
    pub fn should_act(state: &Match, side: Side) -> bool {
        state.phase == MatchPhase::Playing
            && !state.combatant(side).is_ready
            && state.combatant(side.opponent()).is_ready
    }

    pub fn choose_move(&mut self, me: &Combatant, opponent: &Combatant) -> Move {
        let roll = self.rng.gen::<f64>();
        choose_move_with_roll(me, opponent, roll).0
    }

    pub fn decide(&mut self, state: &Match, side: Side) -> AiDecision {
        let roll = self.rng.gen::<f64>();
        let (action, rule) =
            choose_move_with_roll(state.combatant(side), state.combatant(side.opponent()), roll);
        AiDecision {
            side,
            action,
            rule,
            roll,
        }
    }
}
