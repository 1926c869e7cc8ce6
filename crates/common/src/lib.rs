//! Crate includes reusable utils for the executer services that handle common
//! behavior, such as initializing the tracing framework and retrying flaky
//! remote calls.

pub mod env;
pub mod logging;
pub mod retry;
