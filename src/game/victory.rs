use serde::{Deserialize, Serialize};

use super::state::{Side, VictoryReason, VictoryState, DRAW_LABEL};

/// Last turn that may be played before HP comparison decides the match.
pub const TURN_CAP: u32 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Verdict {
    Ongoing,
    Won { winner: Side, reason: VictoryReason },
    Draw { reason: VictoryReason },
}

impl Verdict {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, Verdict::Ongoing)
    }

    /// Attaches display names; `None` while the match continues.
    pub fn into_victory(self, player1_name: &str, player2_name: &str) -> Option<VictoryState> {
        match self {
            Verdict::Ongoing => None,
            Verdict::Won { winner, reason } => {
                let label = match winner {
                    Side::Player1 => player1_name,
                    Side::Player2 => player2_name,
                };
                Some(VictoryState {
                    winner: Some(winner),
                    label: label.to_string(),
                    reason,
                })
            }
            Verdict::Draw { reason } => Some(VictoryState {
                winner: None,
                label: DRAW_LABEL.to_string(),
                reason,
            }),
        }
    }
}

/// Decides the match from post-resolution HP and the turn just played.
pub fn evaluate(player1_hp: u8, player2_hp: u8, turn: u32) -> Verdict {
    match (player1_hp == 0, player2_hp == 0) {
        (true, true) => Verdict::Draw {
            reason: VictoryReason::DoubleKnockout,
        },
        (true, false) => Verdict::Won {
            winner: Side::Player2,
            reason: VictoryReason::Knockout {
                loser: Side::Player1,
            },
        },
        (false, true) => Verdict::Won {
            winner: Side::Player1,
            reason: VictoryReason::Knockout {
                loser: Side::Player2,
            },
        },
        (false, false) if turn >= TURN_CAP => {
            let reason = VictoryReason::TurnLimit;
            match player1_hp.cmp(&player2_hp) {
                std::cmp::Ordering::Greater => Verdict::Won {
                    winner: Side::Player1,
                    reason,
                },
                std::cmp::Ordering::Less => Verdict::Won {
                    winner: Side::Player2,
                    reason,
                },
                std::cmp::Ordering::Equal => Verdict::Draw { reason },
            }
        }
        (false, false) => Verdict::Ongoing,
    }
}
