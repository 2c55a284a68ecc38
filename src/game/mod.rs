//! 回合结算引擎（战斗数值、能量账本、胜负判定、对局状态机）。

pub mod combat;
pub mod ledger;
pub mod rules;
pub mod state;
pub mod victory;

pub use combat::{compute_outcome, MoveOutcome};
pub use ledger::LedgerUpdate;
pub use rules::{
    begin_resolution, resolve_turn, GameEvent, RuleEngine, RuleError, RuleResolution,
};
pub use state::{
    BattleLogEntry,
    CombatStats,
    Combatant,
    IntegrityError,
    Match,
    MatchPhase,
    Move,
    MoveHistoryEntry,
    Side,
    VictoryReason,
    VictoryState,
};
pub use victory::{evaluate, Verdict, TURN_CAP};
