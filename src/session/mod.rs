// src/session/mod.rs — Server-side tracking sessions

pub mod coordinator;
pub mod registry;
pub mod sweep;
pub mod types;

pub use coordinator::{EmailData, LegResult, SendCoordinator, SendOutcome, SendReport};
pub use registry::{SessionRegistry, SweepPolicy};
pub use types::{BillingSummary, Session, SessionStatus, SessionSummary};
