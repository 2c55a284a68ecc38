use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_HP: u8 = 100;
pub const MAX_ENERGY: u8 = 100;
pub const STARTING_ENERGY: u8 = 50;
pub const BASE_MULTIPLIER: f64 = 1.0;
pub const MAX_MULTIPLIER: f64 = 2.5;
pub const FIRST_TURN: u32 = 1;
pub const DRAW_LABEL: &str = "Draw";

const DEFAULT_PLAYER1_NAME: &str = "Player 1";
const DEFAULT_PLAYER2_NAME: &str = "Player 2";

/// 对战中的一方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Player1, Side::Player2];

    pub fn opponent(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Player1 => "player1",
            Side::Player2 => "player2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每回合可选的三种行动。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Attack,
    Defend,
    PowerUp,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Attack, Move::Defend, Move::PowerUp];

    /// Energy deducted when the move resolves.
    pub fn cost(self) -> u8 {
        match self {
            Move::Attack => 25,
            Move::Defend => 10,
            Move::PowerUp => 15,
        }
    }

    /// Moves stay legal when unaffordable; they just resolve at reduced strength.
    pub fn is_affordable(self, energy: u8) -> bool {
        energy >= self.cost()
    }

    /// Numeric code used by mirrored move records.
    pub fn code(self) -> u8 {
        match self {
            Move::Attack => 0,
            Move::Defend => 1,
            Move::PowerUp => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Attack => "attack",
            Move::Defend => "defend",
            Move::PowerUp => "powerup",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveHistoryEntry {
    pub turn: u32,
    #[serde(rename = "move")]
    pub chosen: Move,
    pub damage_dealt: u32,
}

/// 对局结束后的统计数据。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CombatStats {
    pub final_hp: u8,
    pub attacks: u32,
    pub defends: u32,
    pub power_ups: u32,
    pub damage_dealt: u32,
}

/// 单个参战者的完整状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: Side,
    pub name: String,
    pub hp: u8,
    pub max_hp: u8,
    pub energy: u8,
    pub max_energy: u8,
    pub power_up_multiplier: f64,
    #[serde(default)]
    pub current_move: Option<Move>,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub consecutive_attacks: u32,
    #[serde(default)]
    pub has_attack_buff: bool,
    #[serde(default)]
    pub move_history: Vec<MoveHistoryEntry>,
}

impl Combatant {
    pub fn new(id: Side, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hp: MAX_HP,
            max_hp: MAX_HP,
            energy: STARTING_ENERGY,
            max_energy: MAX_ENERGY,
            power_up_multiplier: BASE_MULTIPLIER,
            current_move: None,
            is_ready: false,
            consecutive_attacks: 0,
            has_attack_buff: false,
            move_history: Vec::new(),
        }
    }

    pub fn is_knocked_out(&self) -> bool {
        self.hp == 0
    }

    pub fn affordable_moves(&self) -> Vec<Move> {
        Move::ALL
            .into_iter()
            .filter(|candidate| candidate.is_affordable(self.energy))
            .collect()
    }

    pub fn stats(&self) -> CombatStats {
        let mut stats = CombatStats {
            final_hp: self.hp,
            ..CombatStats::default()
        };
        for entry in &self.move_history {
            match entry.chosen {
                Move::Attack => stats.attacks += 1,
                Move::Defend => stats.defends += 1,
                Move::PowerUp => stats.power_ups += 1,
            }
            stats.damage_dealt += entry.damage_dealt;
        }
        stats
    }
}

/// 每个已结算回合的不可变记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BattleLogEntry {
    pub turn: u32,
    pub player1_move: Move,
    pub player2_move: Move,
    pub player1_damage: u32,
    pub player2_damage: u32,
    pub player1_healing: u32,
    pub player2_healing: u32,
}

impl BattleLogEntry {
    pub fn move_of(&self, side: Side) -> Move {
        match side {
            Side::Player1 => self.player1_move,
            Side::Player2 => self.player2_move,
        }
    }

    /// Attack damage plus any counter-damage the side received.
    pub fn damage_taken(&self, side: Side) -> u32 {
        match side {
            Side::Player1 => self.player1_damage,
            Side::Player2 => self.player2_damage,
        }
    }

    pub fn healing(&self, side: Side) -> u32 {
        match side {
            Side::Player1 => self.player1_healing,
            Side::Player2 => self.player2_healing,
        }
    }
}

/// 对局生命周期。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    #[default]
    Lobby,
    Playing,
    Resolving,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum VictoryReason {
    Knockout { loser: Side },
    DoubleKnockout,
    TurnLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    /// `None` for a draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
    pub label: String,
    pub reason: VictoryReason,
}

impl VictoryState {
    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    SideMismatch { expected: Side, actual: Side },
    HpOutOfRange { side: Side, value: u8 },
    EnergyOutOfRange { side: Side, value: u8 },
    MultiplierOutOfRange { side: Side, value: f64 },
    LogLengthMismatch { expected: usize, actual: usize },
    MissingMove { side: Side },
    WinnerMismatch,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::SideMismatch { expected, actual } => {
                write!(f, "slot for {expected} holds {actual}")
            }
            IntegrityError::HpOutOfRange { side, value } => {
                write!(f, "{side} hp {value} outside 0..={MAX_HP}")
            }
            IntegrityError::EnergyOutOfRange { side, value } => {
                write!(f, "{side} energy {value} outside 0..={MAX_ENERGY}")
            }
            IntegrityError::MultiplierOutOfRange { side, value } => {
                write!(f, "{side} multiplier {value} outside {BASE_MULTIPLIER}..={MAX_MULTIPLIER}")
            }
            IntegrityError::LogLengthMismatch { expected, actual } => {
                write!(f, "battle log has {actual} entries, expected {expected}")
            }
            IntegrityError::MissingMove { side } => write!(f, "{side} has no move to resolve"),
            IntegrityError::WinnerMismatch => f.write_str("winner label disagrees with outcome"),
        }
    }
}

/// 对局整体状态，每次状态转移都会生成新的快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(rename = "state")]
    pub phase: MatchPhase,
    pub current_turn: u32,
    pub player1: Combatant,
    pub player2: Combatant,
    #[serde(default)]
    pub battle_log: Vec<BattleLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl Match {
    pub fn lobby() -> Self {
        Self {
            phase: MatchPhase::Lobby,
            current_turn: FIRST_TURN,
            player1: Combatant::new(Side::Player1, DEFAULT_PLAYER1_NAME),
            player2: Combatant::new(Side::Player2, DEFAULT_PLAYER2_NAME),
            battle_log: Vec::new(),
            winner: None,
            victory: None,
        }
    }

    pub fn new(player1_name: impl Into<String>, player2_name: impl Into<String>) -> Self {
        Self {
            phase: MatchPhase::Playing,
            player1: Combatant::new(Side::Player1, player1_name),
            player2: Combatant::new(Side::Player2, player2_name),
            ..Self::lobby()
        }
    }

    pub fn combatant(&self, side: Side) -> &Combatant {
        match side {
            Side::Player1 => &self.player1,
            Side::Player2 => &self.player2,
        }
    }

    pub fn combatant_mut(&mut self, side: Side) -> &mut Combatant {
        match side {
            Side::Player1 => &mut self.player1,
            Side::Player2 => &mut self.player2,
        }
    }

    pub fn both_ready(&self) -> bool {
        self.player1.is_ready && self.player2.is_ready
    }

    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }

    pub fn turns_played(&self) -> u32 {
        self.battle_log.len() as u32
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn last_entry(&self) -> Option<&BattleLogEntry> {
        self.battle_log.last()
    }

    pub fn declare_victory(&mut self, victory: VictoryState) {
        self.winner = Some(victory.label.clone());
        self.victory = Some(victory);
        self.phase = MatchPhase::Finished;
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for side in Side::ALL {
            let combatant = self.combatant(side);
            if combatant.id != side {
                return Err(IntegrityError::SideMismatch {
                    expected: side,
                    actual: combatant.id,
                });
            }
            if combatant.max_hp != MAX_HP || combatant.hp > combatant.max_hp {
                return Err(IntegrityError::HpOutOfRange {
                    side,
                    value: combatant.hp,
                });
            }
            if combatant.max_energy != MAX_ENERGY || combatant.energy > combatant.max_energy {
                return Err(IntegrityError::EnergyOutOfRange {
                    side,
                    value: combatant.energy,
                });
            }
            let multiplier = combatant.power_up_multiplier;
            if !(BASE_MULTIPLIER..=MAX_MULTIPLIER).contains(&multiplier) {
                return Err(IntegrityError::MultiplierOutOfRange {
                    side,
                    value: multiplier,
                });
            }
            if combatant.is_ready != combatant.current_move.is_some() {
                return Err(IntegrityError::MissingMove { side });
            }
        }

        let expected = self.current_turn.saturating_sub(FIRST_TURN) as usize;
        if self.battle_log.len() != expected {
            return Err(IntegrityError::LogLengthMismatch {
                expected,
                actual: self.battle_log.len(),
            });
        }

        let label = self.victory.as_ref().map(|victory| victory.label.as_str());
        if label != self.winner.as_deref() {
            return Err(IntegrityError::WinnerMismatch);
        }

        Ok(())
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::lobby()
    }
}
