pub mod global;
pub mod loader;

pub use global::{MatcherSettings, MetricsSettings, RuleEngineConfig, SystemConfig, WorkerSettings};
pub use loader::ConfigLoader;
