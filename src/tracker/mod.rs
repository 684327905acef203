// src/tracker/mod.rs — Client-side composition tracking
//
// Everything here runs next to the compose surface: the timer, the
// activity monitor that drives it, local snapshots, and the sync loop
// that mirrors transitions to the server.

pub mod clock;
pub mod monitor;
pub mod snapshot;
pub mod sync;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use monitor::{ActivityMonitor, MonitorConfig, Transition};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use sync::{drive, HttpSessionSync, SessionSync, Signal};
pub use timer::{Timer, TimerState};
