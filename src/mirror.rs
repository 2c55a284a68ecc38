//! Best-effort mirroring of match snapshots to an external store.
//!
//! A sink never influences resolution: the rule engine logs and reports a
//! failed `record` call and keeps going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{BattleLogEntry, Match, MatchPhase, Side};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror sink unavailable: {0}")]
    Unavailable(String),
    #[error("mirror sink rejected snapshot: {0}")]
    Rejected(String),
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

pub trait MatchMirror {
    fn record(&mut self, snapshot: &Match) -> Result<(), MirrorError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

impl MatchMirror for NoopMirror {
    fn record(&mut self, _snapshot: &Match) -> Result<(), MirrorError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    Waiting,
    Active,
    Finished,
    Cancelled,
}

impl MirrorStatus {
    pub fn code(self) -> u8 {
        match self {
            MirrorStatus::Waiting => 0,
            MirrorStatus::Active => 1,
            MirrorStatus::Finished => 2,
            MirrorStatus::Cancelled => 3,
        }
    }
}

impl From<MatchPhase> for MirrorStatus {
    fn from(phase: MatchPhase) -> Self {
        match phase {
            MatchPhase::Lobby => MirrorStatus::Waiting,
            MatchPhase::Playing | MatchPhase::Resolving => MirrorStatus::Active,
            MatchPhase::Finished => MirrorStatus::Finished,
        }
    }
}

/// Multiplier as stored by integer-only sinks (1.5 becomes 150).
pub fn encode_multiplier(multiplier: f64) -> u16 {
    (multiplier * 100.0).round() as u16
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchStateRecord {
    pub player1_hp: u8,
    pub player1_energy: u8,
    pub player1_power_multiplier: u16,
    pub player2_hp: u8,
    pub player2_energy: u8,
    pub player2_power_multiplier: u16,
    pub current_turn: u8,
    pub game_status: u8,
}

impl MatchStateRecord {
    pub fn from_match(state: &Match) -> Self {
        Self {
            player1_hp: state.player1.hp,
            player1_energy: state.player1.energy,
            player1_power_multiplier: encode_multiplier(state.player1.power_up_multiplier),
            player2_hp: state.player2.hp,
            player2_energy: state.player2.energy,
            player2_power_multiplier: encode_multiplier(state.player2.power_up_multiplier),
            current_turn: u8::try_from(state.current_turn).unwrap_or(u8::MAX),
            game_status: MirrorStatus::from(state.phase).code(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub side: Side,
    pub move_type: u8,
    pub turn_number: u8,
}

impl MoveRecord {
    pub fn from_entry(entry: &BattleLogEntry) -> [MoveRecord; 2] {
        let turn_number = u8::try_from(entry.turn).unwrap_or(u8::MAX);
        Side::ALL.map(|side| MoveRecord {
            side,
            move_type: entry.move_of(side).code(),
            turn_number,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResultRecord {
    pub winner: Side,
    pub loser: Side,
    pub total_turns: u8,
}

impl MatchResultRecord {
    /// `None` until the match finishes, and for draws.
    pub fn from_match(state: &Match) -> Option<Self> {
        let winner = state.victory.as_ref()?.winner?;
        Some(Self {
            winner,
            loser: winner.opponent(),
            total_turns: u8::try_from(state.turns_played()).unwrap_or(u8::MAX),
        })
    }
}

/// Everything a sink needs to persist one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPayload {
    pub state: MatchStateRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<MoveRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResultRecord>,
}

impl MirrorPayload {
    pub fn from_match(state: &Match) -> Self {
        Self {
            state: MatchStateRecord::from_match(state),
            moves: state
                .last_entry()
                .map(|entry| MoveRecord::from_entry(entry).to_vec())
                .unwrap_or_default(),
            result: MatchResultRecord::from_match(state),
        }
    }
}
