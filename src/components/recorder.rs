use tracing::info;

/// The scalar-metrics sink handed to every algorithm at construction.
///
/// Metrics are emitted as structured tracing events under the `metrics`
/// target, so any installed subscriber (see [`crate::logging`]) can route
/// them to stdout, a file, or both.
pub struct Recorder {
    scope: String,
}

impl Recorder {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn log_scalar(
        &self,
        name: &str,
        value: f64,
        step: u64,
    ) {
        info!(
            target: "metrics",
            scope = %self.scope,
            name = %name,
            value = %value,
            step = %step,
        );
    }

    /// Tracing writers buffer line-wise; flushing is deferred to them.
    pub fn flush(&self) {}
}
