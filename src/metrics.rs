//! Loader observability.
//!
//! With the `metrics` feature a process-wide [`METRICS`] instance records one
//! data point per flush. With the `tracing` feature [`tracing_helpers`] opens
//! spans around a whole `load` call and around each batched fetch.

#[cfg(feature = "metrics")]
pub use self::otel::{LoaderMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
        KeyValue,
    };
    use std::time::Duration;

    pub static METRICS: Lazy<LoaderMetrics> = Lazy::new(LoaderMetrics::init);

    pub struct LoaderMetrics {
        pub flushes_total: Counter<u64>,
        pub entities_total: Counter<u64>,
        pub flush_duration: Histogram<f64>,
    }

    impl LoaderMetrics {
        pub fn init() -> Self {
            let meter = global::meter("relations_loader");

            let flushes_total = meter
                .u64_counter("relations_loader_flushes_total")
                .with_description("Batched queries issued per entity class")
                .build();

            let entities_total = meter
                .u64_counter("relations_loader_entities_total")
                .with_description("Entities returned by batched queries")
                .build();

            let flush_duration = meter
                .f64_histogram("relations_loader_flush_duration_seconds")
                .with_description("Duration of one entity class flush")
                .build();

            Self {
                flushes_total,
                entities_total,
                flush_duration,
            }
        }

        pub fn record_flush(&self, entity_class: &str, queries: usize, loaded: usize, elapsed: Duration) {
            let attrs = [KeyValue::new("entity_class", entity_class.to_string())];
            self.flushes_total.add(queries as u64, &attrs);
            self.entities_total.add(loaded as u64, &attrs);
            self.flush_duration.record(elapsed.as_secs_f64(), &attrs);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span covering one `RelationsLoader::load` call.
    pub fn load_span(roots: usize) -> Span {
        tracing::debug_span!("relations_loader.load", roots)
    }

    /// Span covering the batched fetch of one entity class.
    pub fn flush_span(entity_class: &str, identifiers: usize) -> Span {
        tracing::debug_span!("relations_loader.flush", entity_class, identifiers)
    }
}
