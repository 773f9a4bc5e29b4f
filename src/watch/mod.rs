//! Change notification for open job directories
//!
//! - [`JobWatcher`] polls job directories on a background thread and sends
//!   [`ChangeEvent`]s over a bounded channel, in the order it observes them.
//! - [`ChangeDispatcher`] lives on the UI thread and hands each event to the
//!   viewers of the job directory it belongs to.
//!
//! # Testing mode
//!
//! Normally the dispatcher queues events until the UI loop calls
//! [`ChangeDispatcher::process_pending`]. With [`set_testing`] enabled it
//! delivers them synchronously, so a test observes the re-initialization as
//! soon as `notify` returns.

pub mod dispatcher;
pub mod watcher;

pub use dispatcher::ChangeDispatcher;
pub use watcher::{ChangeEvent, JobWatcher};

use std::sync::atomic::{AtomicBool, Ordering};

static IS_TESTING: AtomicBool = AtomicBool::new(false);

/// Switch synchronous delivery on or off for the whole process
pub fn set_testing(testing: bool) {
    IS_TESTING.store(testing, Ordering::SeqCst);
}

pub fn is_testing() -> bool {
    IS_TESTING.load(Ordering::SeqCst)
}
