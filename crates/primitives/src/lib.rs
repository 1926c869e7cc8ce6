//! Types shared between the chain watcher and the execution sequencer.

pub mod buf;
pub mod chain;
pub mod tx;

pub mod prelude {
    pub use crate::{
        buf::HexBytes,
        chain::{BlockHeader, ChainParams},
        tx::ChainTransaction,
    };
}
