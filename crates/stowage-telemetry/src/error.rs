//! Failures raised while installing logging or building metrics.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry helpers.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry setup and rendering failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Error from `try_init`.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A counter could not be built or added to the registry.
    #[error("metric {name} could not be {stage}")]
    Collector {
        /// Metric name.
        name: &'static str,
        /// `built` or `registered`.
        stage: &'static str,
        /// Error from prometheus.
        source: PrometheusError,
    },
    /// The text exposition could not be produced.
    #[error("metrics could not be rendered")]
    Render {
        /// Error from the text encoder.
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    #[error("rendered metrics are not utf-8")]
    RenderUtf8 {
        /// Conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) fn collector(
        name: &'static str,
        stage: &'static str,
    ) -> impl FnOnce(PrometheusError) -> Self {
        move |source| Self::Collector {
            name,
            stage,
            source,
        }
    }
}
