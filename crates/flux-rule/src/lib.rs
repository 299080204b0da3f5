//! 设备事件驱动的规则求值引擎
//!
//! 事件进入 [`RuleMatcher`]，合并进设备快照后按组织和设备加载启用的规则，
//! 条件从左到右组合，命中的规则先回写触发时间，再为每个动作生成派发请求。

pub mod cache;
pub mod combinator;
pub mod condition;
pub mod context;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod storage;
pub mod window;
pub mod worker;

pub use cache::SnapshotCache;
pub use combinator::{combine, CombineResult};
pub use condition::{evaluate, ConditionOutcome, Reason};
pub use context::{DeviceSnapshot, MetricReading, SnapshotView};
pub use directory::{DeviceDirectory, DeviceRecord, InMemoryDeviceDirectory};
pub use dispatcher::{ActionDispatchRequest, ActionDispatcher, DispatchContext, TriggerInfo};
pub use error::{Result, RuleError};
pub use executor::{ActionExecutor, ChannelActionExecutor};
pub use matcher::{FiredRule, MatchReport, MatcherConfig, RuleFailure, RuleMatcher};
pub use model::{
    Action, ActionType, Condition, ConditionKind, ConditionType, LogicOperator, Operator, Rule,
};
pub use storage::{InMemoryRuleStore, RuleStats, RuleStore, TriggerRecord};
pub use window::TimeWindow;
pub use worker::{RuleWorkerPool, WorkerPoolConfig};
