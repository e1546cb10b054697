//! # rylie-store
//!
//! In-memory conversation cache for the Rylie chat client.
//!
//! A [`ThreadLog`] holds the ordered, duplicate-free messages of one thread.
//! The [`Synchronizer`] owns a log and merges the three inputs that feed it
//! (history pages, send responses, live pushes), republishing a snapshot to
//! subscribers after every change.

pub mod models;
pub mod synchronizer;
pub mod thread_log;

pub use models::*;
pub use synchronizer::{Snapshot, Synchronizer};
pub use thread_log::ThreadLog;
