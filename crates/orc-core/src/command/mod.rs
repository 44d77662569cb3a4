pub mod agent;
pub mod job_limits;
pub mod redirection;
pub mod spill_buffer;

pub use agent::{
    CommandAgent, CommandNotification, CommandRequest, ExecuteRequest, JobStatsSnapshot, TaskState,
    MAX_COMMAND_LINE_LEN,
};
pub use job_limits::{JobObjectLimits, JobObjectLimitsBuilder};
pub use redirection::{OnComplete, Redirection, RedirectionKind};
pub use spill_buffer::SpillBuffer;
