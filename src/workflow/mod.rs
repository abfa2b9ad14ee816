pub mod service;
pub mod session;

pub use service::{DocumentService, PollOutcome, ServiceSettings};
pub use session::{EditingSession, FieldGesture, GestureKind};
