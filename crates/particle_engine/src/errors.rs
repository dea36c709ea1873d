//! Errors for this library

/// All the known errors returned by the engine.
#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum EngineError {
    #[snafu(display("Invalid engine config: {reason}"))]
    /// The config can't describe a valid simulation, eg a zero-sized boundary
    InvalidConfig {
        /// What is wrong with the config
        reason: String,
    },

    #[snafu(display("The engine has been shut down"))]
    /// `emit()` or `update()` was called after `shutdown()`
    ShutDown,

    #[snafu(display("The engine's {lock} lock was poisoned by a panicking thread"))]
    /// A thread panicked whilst holding one of the engine's locks
    Poisoned {
        /// Which lock
        lock: &'static str,
    },

    #[snafu(display("Couldn't build the worker pool"))]
    /// Rayon failed to spawn the pool's threads
    WorkerPool {
        /// The parent error type
        source: rayon::ThreadPoolBuildError,
    },
}

/// Errors from parsing textual config values, such as the emission policy chosen in a UI.
#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ParseError {
    #[snafu(display("Unknown emission policy '{value}', expected 'continuous' or 'burst'"))]
    /// Not one of the known emission policies
    UnknownPolicy {
        /// The value that was given
        value: String,
    },
}
