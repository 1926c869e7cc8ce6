//! Panic hook that routes panics through `tracing` with a backtrace, so that
//! panics inside supervised tasks end up in the same sink as the rest of the
//! logs.

use std::{backtrace, panic};

use tracing::*;

fn handle_panic(info: &panic::PanicHookInfo<'_>) {
    let bt = backtrace::Backtrace::force_capture();
    let location = info.location().map(|l| l.to_string());

    let reason = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str));

    match reason {
        Some(reason) => error!(%reason, ?location, "thread panicking\n{bt}"),
        None => error!(?location, "thread panicking\n{bt}"),
    }
}

/// Sets a panic hook to (1) log the backtrace and (2) call the previous hook.
pub fn set_panic_hook() {
    let old_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        handle_panic(info);
        old_hook(info);
    }));
}
