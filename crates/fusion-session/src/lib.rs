pub mod controller;
pub mod error;
pub mod events;
pub mod ingest;
pub mod job;
pub mod queue;
pub mod session;

pub use controller::{RecomputeController, RecomputeState};
pub use error::SessionError;
pub use events::SessionEvent;
pub use ingest::{FileUpload, UploadReport};
pub use job::{Job, JobAction, JobError, JobOutput};
pub use queue::{JobHandle, MutationQueue};
pub use session::{CombinatorKind, Session};
