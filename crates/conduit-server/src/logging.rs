//! `logging/setLevel` plumbing (spec.md §3 server capability `logging`).
//!
//! The engine only needs somewhere to forward a level change; it never
//! owns a subscriber itself. [`LogLevelSink`] is the narrow interface a
//! transport or facade wires in; [`ReloadLogSink`] is the concrete
//! `tracing-subscriber` implementation, feature-gated since not every
//! embedder uses that crate for its own tracing setup.

use conduit_protocol::logging::LogLevel;

/// Receives the level requested by a peer's `logging/setLevel` call.
/// Implementations decide what "level" means for their own subscriber;
/// the engine just forwards the MCP-level enum.
pub trait LogLevelSink: Send + Sync {
    fn set_level(&self, level: LogLevel);
}

#[cfg(feature = "log-reload")]
mod reload {
    use super::LogLevelSink;
    use conduit_protocol::logging::LogLevel;
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::reload::Handle;

    /// Wraps a `tracing_subscriber::reload::Handle` over a `LevelFilter`
    /// layer so an inbound `logging/setLevel` request changes the
    /// process's actual tracing output, not just a schema field.
    pub struct ReloadLogSink<S> {
        handle: Handle<LevelFilter, S>,
    }

    impl<S> ReloadLogSink<S> {
        pub fn new(handle: Handle<LevelFilter, S>) -> Self {
            Self { handle }
        }
    }

    impl<S> LogLevelSink for ReloadLogSink<S>
    where
        S: Send + Sync + 'static,
    {
        fn set_level(&self, level: LogLevel) {
            let filter = to_level_filter(level);
            if let Err(error) = self.handle.reload(filter) {
                tracing::warn!(%error, "failed to reload tracing level filter");
            }
        }
    }

    fn to_level_filter(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info | LogLevel::Notice => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                LevelFilter::ERROR
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn mcp_levels_map_onto_tracing_filters_monotonically() {
            assert_eq!(to_level_filter(LogLevel::Debug), LevelFilter::DEBUG);
            assert_eq!(to_level_filter(LogLevel::Emergency), LevelFilter::ERROR);
            assert!(to_level_filter(LogLevel::Warning) <= to_level_filter(LogLevel::Debug));
        }
    }
}

#[cfg(feature = "log-reload")]
pub use reload::ReloadLogSink;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    struct RecordingSink(AtomicU8);

    impl LogLevelSink for RecordingSink {
        fn set_level(&self, level: LogLevel) {
            self.0.store(level as u8, Ordering::SeqCst);
        }
    }

    #[test]
    fn a_sink_records_the_last_level_it_was_told() {
        let sink = RecordingSink(AtomicU8::new(0));
        sink.set_level(LogLevel::Error);
        assert_eq!(sink.0.load(Ordering::SeqCst), LogLevel::Error as u8);
    }
}
