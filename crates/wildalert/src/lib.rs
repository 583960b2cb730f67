//! `wildalert` - Live wildlife-detection feed and manual sighting alerts
//!
//! This library provides the feed session controller that keeps a cache-busted
//! stream URL alive for the signed-in ranger, the alert dispatcher that reports
//! sightings, and the local capture device handling behind the live view.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alert;
#[cfg(test)]
mod canned_http;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod feed;
pub mod identity;
pub mod logging;

pub use alert::{AlertDispatcher, AlertOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{FeedController, FeedHandle, FeedRunner, FeedState};
pub use identity::SessionIdentity;
pub use logging::init_logging;
