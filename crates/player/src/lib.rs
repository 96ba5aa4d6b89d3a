pub mod backend;
mod error;
pub mod interruption;
pub mod loader;
pub mod queue;
pub mod runner;
pub mod session;
pub mod shuffle;

pub use backend::{AudioBackend, BackendEvent, CallState, LoadToken};
pub use error::{BackendError, PlayerError};
pub use interruption::{InterruptionAction, InterruptionCoordinator};
pub use loader::{SongLoader, DEFAULT_LOADER_INTERVAL};
pub use queue::{PlaybackQueue, QueueSource};
pub use runner::{run_session, SessionCommand};
pub use session::{PlaybackSession, PlaybackState, SessionEvent, SessionStatus};
