//! Overflow policies for the event queue
//!
//! When the bounded queue between producers and the drain worker is full,
//! these policies determine what happens to the event being submitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling a full event queue
///
/// # Example
///
/// ```
/// use richlog::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: wait for space
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
///
/// // Wait a little, then give up on the new event
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Block until space is available
    ///
    /// No event is lost while the engine runs, at the cost of backpressure on
    /// the calling thread. Producers still blocked when shutdown starts are
    /// released and their events rejected.
    #[default]
    Block,

    /// Block with timeout, then drop the new event
    BlockWithTimeout(Duration),

    /// Drop the event being submitted
    DropNewest,

    /// Evict the oldest queued event to make room for the new one
    DropOldest,
}

impl OverflowPolicy {
    /// Parse a policy name as used in configuration properties.
    ///
    /// Accepts `BLOCK`, `DROP_NEWEST` and `DROP_OLDEST`, ignoring case and
    /// treating `-` like `_`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BLOCK" => Some(OverflowPolicy::Block),
            "DROP_NEWEST" => Some(OverflowPolicy::DropNewest),
            "DROP_OLDEST" => Some(OverflowPolicy::DropOldest),
            _ => None,
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when events are dropped due to queue overflow.
/// The parameter is the total count of dropped events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
