pub mod sampler;
pub mod subscriber;

pub use sampler::{LogSampler, SampleDecision, SamplingStrategy};
pub use subscriber::{init_logging, LogFormat, LoggingConfig, LoggingError};
