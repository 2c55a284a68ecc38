//! 自动对手的启发式出招策略。

pub mod heuristic;

pub use heuristic::{choose_move_with_roll, AiAgent, AiDecision, DecisionRule};
