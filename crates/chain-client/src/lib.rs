//! Narrow interface to the external chain service that sequences
//! transactions, and a JSON-RPC implementation of it.
//!
//! Consensus, networking and state commitment all live behind this
//! interface; the watcher only ever sees headers and the transaction log.

mod errors;
pub mod rpc;
mod traits;

pub use errors::ChainClientError;
pub use traits::{ChainService, ChainSession};
