pub mod collaborators;
pub mod error;
pub mod error_sink;
pub mod generation;
pub mod http;
pub mod marketplace;
pub mod oauth;
pub mod queue;
pub mod refresh;
pub mod store;
pub mod worker;

pub use error::{ErrorKind, PipelineError};
pub use queue::{NotificationQueue, NotificationReceiver, QueueClosed};
pub use worker::{Collaborators, Worker, WorkerSettings, WorkerStats};
