//! Per-call context threaded through every client operation.

use std::time::Duration;

use opentelemetry::Context;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::trace::SharedPropagator;

/// Caller-supplied state for a single call: the trace context to propagate
/// (if any), a propagator that overrides the client's for this call, and a
/// timeout.
///
/// The library applies no timeout of its own.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    trace_context: Option<Context>,
    propagator: Option<SharedPropagator>,
    timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying the OpenTelemetry span behind the current `tracing`
    /// span. Needs a `tracing_opentelemetry` layer on the subscriber; without
    /// one the span is invalid and nothing is propagated.
    pub fn from_current_span() -> Self {
        Self::new().with_trace_context(tracing::Span::current().context())
    }

    pub fn with_trace_context(mut self, cx: Context) -> Self {
        self.trace_context = Some(cx);
        self
    }

    pub fn with_propagator(mut self, propagator: SharedPropagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn trace_context(&self) -> Option<&Context> {
        self.trace_context.as_ref()
    }

    pub fn propagator(&self) -> Option<&SharedPropagator> {
        self.propagator.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
