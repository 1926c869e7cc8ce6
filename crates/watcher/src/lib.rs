//! Follows the chain service's header stream and turns its transaction log
//! into an append-only, gap-free, duplicate-free sequence of transactions.

mod cursor;
mod errors;
mod watcher;

pub use cursor::WatcherCursor;
pub use errors::{ConsistencyViolation, WatcherError};
pub use watcher::ChainWatcher;
