//! Next-turn energy, multiplier, fatigue and attack-buff bookkeeping.

use super::state::{Combatant, Move, BASE_MULTIPLIER, MAX_MULTIPLIER};

pub const BASE_REGEN: i32 = 20;
pub const MULTIPLIER_STEP: f64 = 0.5;
/// Pre-resolution energy needed for a Power-Up to grow the multiplier.
pub const CHARGE_ENERGY: u8 = 15;

pub fn bonus_regen(chosen: Move) -> i32 {
    match chosen {
        Move::Attack => 0,
        Move::Defend => 5,
        Move::PowerUp => 10,
    }
}

pub fn next_energy(energy: u8, max_energy: u8, chosen: Move) -> u8 {
    let next = energy as i32 - chosen.cost() as i32 + BASE_REGEN + bonus_regen(chosen);
    next.clamp(0, max_energy as i32) as u8
}

pub fn next_multiplier(multiplier: f64, energy: u8, chosen: Move) -> f64 {
    match chosen {
        Move::Attack => BASE_MULTIPLIER,
        Move::PowerUp if energy >= CHARGE_ENERGY => (multiplier + MULTIPLIER_STEP).min(MAX_MULTIPLIER),
        _ => multiplier,
    }
}

pub fn next_consecutive_attacks(previous: u32, chosen: Move) -> u32 {
    match chosen {
        Move::Attack => previous + 1,
        _ => 0,
    }
}

/// Recomputed every turn; never carried forward.
pub fn next_attack_buff(chosen: Move, opponent_move: Move) -> bool {
    chosen == Move::PowerUp && opponent_move == Move::Attack
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerUpdate {
    pub energy: u8,
    pub power_up_multiplier: f64,
    pub consecutive_attacks: u32,
    pub has_attack_buff: bool,
}

impl LedgerUpdate {
    pub fn apply(self, combatant: &mut Combatant) {
        combatant.energy = self.energy;
        combatant.power_up_multiplier = self.power_up_multiplier;
        combatant.consecutive_attacks = self.consecutive_attacks;
        combatant.has_attack_buff = self.has_attack_buff;
    }
}

/// Computes from the pre-turn snapshot only.
pub fn settle(combatant: &Combatant, chosen: Move, opponent_move: Move) -> LedgerUpdate {
    LedgerUpdate {
        energy: next_energy(combatant.energy, combatant.max_energy, chosen),
        power_up_multiplier: next_multiplier(
            combatant.power_up_multiplier,
            combatant.energy,
            chosen,
        ),
        consecutive_attacks: next_consecutive_attacks(combatant.consecutive_attacks, chosen),
        has_attack_buff: next_attack_buff(chosen, opponent_move),
    }
}
