//! Live feed sessions.
//!
//! - [`FeedController`]: the synchronous Idle / Loading / Degraded state machine
//! - [`FeedProbe`]: decides whether a source URL loads
//! - [`FeedRunner`]: the task that owns a controller, its retry timer and probes

mod controller;
mod probe;
mod runner;

pub use controller::{FeedController, FeedSession, FeedSource, FeedState, LoadTicket};
pub use probe::{FeedProbe, HttpFeedProbe};
pub use runner::{FeedHandle, FeedRunner, FeedSnapshot};
