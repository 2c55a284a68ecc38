//! 单方视角的伤害、治疗与反击计算。

use serde::{Deserialize, Serialize};

use super::state::{Combatant, Move};

pub const FULL_ATTACK_DAMAGE: f64 = 25.0;
pub const WEAK_ATTACK_DAMAGE: f64 = 10.0;
pub const FULL_ATTACK_ENERGY: u8 = 25;
pub const ATTACK_BUFF_FACTOR: f64 = 1.5;
pub const FATIGUE_FACTOR: f64 = 0.7;
pub const CLASH_FACTOR: f64 = 1.3;
pub const STRONG_DEFENSE_FACTOR: f64 = 0.3;
pub const WEAK_DEFENSE_FACTOR: f64 = 0.7;
pub const DEFENSE_ENERGY: u8 = 10;
pub const COUNTER_DAMAGE: u32 = 5;
pub const FULL_HEAL: u32 = 10;
pub const WEAK_HEAL: u32 = 5;
pub const FULL_HEAL_ENERGY: u8 = 15;

/// What one side's move produces in a single round.
///
/// `counter_damage` is inflicted on this side (the attacker) by a defending
/// opponent, not on the opponent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub damage: u32,
    pub healing: u32,
    pub counter_damage: u32,
}

pub fn compute_outcome(
    attacker: &Combatant,
    defender: &Combatant,
    attacker_move: Move,
    defender_move: Move,
) -> MoveOutcome {
    match attacker_move {
        Move::Attack => {
            let (damage, counter_damage) = attack_damage(attacker, defender, defender_move);
            MoveOutcome {
                damage,
                healing: 0,
                counter_damage,
            }
        }
        Move::Defend => MoveOutcome::default(),
        Move::PowerUp => MoveOutcome {
            healing: power_up_healing(attacker),
            ..MoveOutcome::default()
        },
    }
}

/// Returns `(damage, counter_damage)` for an Attack into `defender_move`.
fn attack_damage(attacker: &Combatant, defender: &Combatant, defender_move: Move) -> (u32, u32) {
    let base = if attacker.energy >= FULL_ATTACK_ENERGY {
        FULL_ATTACK_DAMAGE
    } else {
        WEAK_ATTACK_DAMAGE
    };

    // Factor order matters for rounding parity with recorded matches.
    let mut damage = base * attacker.power_up_multiplier;
    if attacker.has_attack_buff {
        damage *= ATTACK_BUFF_FACTOR;
    }
    if attacker.consecutive_attacks >= 1 {
        damage *= FATIGUE_FACTOR;
    }

    let mut counter_damage = 0;
    match defender_move {
        Move::Attack => damage *= CLASH_FACTOR,
        Move::Defend => {
            damage *= if defender.energy >= DEFENSE_ENERGY {
                STRONG_DEFENSE_FACTOR
            } else {
                WEAK_DEFENSE_FACTOR
            };
            counter_damage = COUNTER_DAMAGE;
        }
        Move::PowerUp => {}
    }

    (damage.round().max(0.0) as u32, counter_damage)
}

fn power_up_healing(attacker: &Combatant) -> u32 {
    if attacker.energy >= FULL_HEAL_ENERGY {
        FULL_HEAL
    } else {
        WEAK_HEAL
    }
}
