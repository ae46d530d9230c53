//! Shared tracing configuration.
//!
//! Cache and adapter events use one target so subscribers can filter them
//! apart from HTTP and lifecycle logs.

/// Target used by cache, build, and adapter events.
pub(crate) const LOG_TARGET: &str = "dmda::cache";
