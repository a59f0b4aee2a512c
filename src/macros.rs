/*!
Crate-local logging macros.

These compile down to nothing unless the `logging` feature is enabled, so
hot paths can emit diagnostics without imposing a dependency on embedders
that don't want one.
*/

macro_rules! log_enabled {
    ($($tt:tt)*) => {
        #[cfg(feature = "logging")]
        {
            $($tt)*
        }
    };
}

macro_rules! debug {
    ($($tt:tt)*) => { log_enabled!(log::debug!($($tt)*)) };
}

macro_rules! trace {
    ($($tt:tt)*) => { log_enabled!(log::trace!($($tt)*)) };
}
