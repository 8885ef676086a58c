//! Domain model (ids, chain tasks, model templates, jobs, lifecycle events).

pub mod events;
pub mod ids;
pub mod job;
pub mod model;
pub mod task;

pub use events::{JobEvent, JobEventKind};
pub use ids::{JobId, ModelId, ParseIdError, TaskId};
pub use job::{JobRecord, JobState, NewJob, TimeoutPhase};
pub use model::{
    InputError, InputField, InputKind, ModelTemplate, OutputField, OutputKind, TemplateMeta,
};
pub use task::{ChainTaskRecord, Solution, SubmittedTask};
