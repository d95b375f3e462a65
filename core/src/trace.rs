//! Trace-context propagation onto outgoing requests.
//!
//! Propagation goes through an OpenTelemetry [`TextMapPropagator`]. The
//! client is given one explicitly at construction (W3C trace-context by
//! default); a [`RequestContext`](crate::context::RequestContext) may carry
//! its own, which takes precedence for that call. The global propagator is
//! never consulted.

use std::sync::Arc;

use opentelemetry::propagation::{Injector, TextMapPropagator};
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;

/// A propagator that can be shared by the client and across threads.
pub type SharedPropagator = Arc<dyn TextMapPropagator + Send + Sync>;

pub const TRACEPARENT: &str = "traceparent";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSpanContext {
    #[error("invalid trace id {0:?}: expected 32 lowercase hex digits, not all zero")]
    TraceId(String),
    #[error("invalid span id {0:?}: expected 16 lowercase hex digits, not all zero")]
    SpanId(String),
}

/// The W3C trace-context propagator.
pub fn w3c_propagator() -> SharedPropagator {
    Arc::new(TraceContextPropagator::new())
}

fn is_valid_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        && id.bytes().any(|b| b != b'0')
}

/// Context carrying a remote span, for callers that receive trace ids from
/// somewhere other than an OpenTelemetry SDK.
pub fn remote_context(
    trace_id: &str,
    span_id: &str,
    sampled: bool,
) -> Result<Context, InvalidSpanContext> {
    let trace = Some(trace_id)
        .filter(|id| is_valid_id(id, 32))
        .and_then(|id| TraceId::from_hex(id).ok())
        .ok_or_else(|| InvalidSpanContext::TraceId(trace_id.to_string()))?;
    let span = Some(span_id)
        .filter(|id| is_valid_id(id, 16))
        .and_then(|id| SpanId::from_hex(id).ok())
        .ok_or_else(|| InvalidSpanContext::SpanId(span_id.to_string()))?;
    let flags = if sampled {
        TraceFlags::SAMPLED
    } else {
        TraceFlags::default()
    };

    let span_context = SpanContext::new(trace, span, flags, true, TraceState::default());
    Ok(Context::new().with_remote_span_context(span_context))
}

/// Writes propagated fields into a request's header list, replacing any
/// header of the same name. Empty values are dropped.
struct HeaderInjector<'a>(&'a mut Vec<(String, String)>);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.retain(|(name, _)| !name.eq_ignore_ascii_case(key));
        if !value.is_empty() {
            self.0.push((key.to_string(), value));
        }
    }
}

/// Inject `cx` into `headers`. Returns false, leaving `headers` untouched,
/// when `cx` has no valid span.
pub fn inject(
    propagator: &dyn TextMapPropagator,
    cx: &Context,
    headers: &mut Vec<(String, String)>,
) -> bool {
    if !cx.span().span_context().is_valid() {
        return false;
    }
    propagator.inject_context(cx, &mut HeaderInjector(headers));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    #[test]
    fn injects_traceparent() {
        let cx = remote_context(TRACE_ID, SPAN_ID, true).unwrap();
        let mut headers = Vec::new();
        assert!(inject(w3c_propagator().as_ref(), &cx, &mut headers));
        assert_eq!(
            headers,
            vec![(
                "traceparent".to_string(),
                format!("00-{TRACE_ID}-{SPAN_ID}-01")
            )]
        );
    }

    #[test]
    fn replaces_existing_traceparent() {
        let cx = remote_context(TRACE_ID, SPAN_ID, false).unwrap();
        let mut headers = vec![("Traceparent".to_string(), "stale".to_string())];
        inject(w3c_propagator().as_ref(), &cx, &mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].1.ends_with("-00"));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(
            remote_context("bad", SPAN_ID, true).unwrap_err(),
            InvalidSpanContext::TraceId("bad".to_string())
        );
        assert!(matches!(
            remote_context(&TRACE_ID.to_uppercase(), SPAN_ID, true),
            Err(InvalidSpanContext::TraceId(_))
        ));
        assert!(matches!(
            remote_context(TRACE_ID, "0000000000000000", true),
            Err(InvalidSpanContext::SpanId(_))
        ));
    }

    #[test]
    fn context_without_span_injects_nothing() {
        let mut headers = Vec::new();
        assert!(!inject(
            w3c_propagator().as_ref(),
            &Context::new(),
            &mut headers
        ));
        assert!(headers.is_empty());
    }
}
