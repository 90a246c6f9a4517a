// Logging shims over `tracing`. Without the `tracing` feature the statements are compiled out, so
// the engine stays dependency-free by default.

macro_rules! vtrace {
    ($($tt:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "virtualist", $($tt)*);
    };
}

macro_rules! vdebug {
    ($($tt:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "virtualist", $($tt)*);
    };
}

macro_rules! vwarn {
    ($($tt:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(target: "virtualist", $($tt)*);
    };
}
