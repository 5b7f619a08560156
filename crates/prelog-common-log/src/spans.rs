use tracing::{trace_span, Span};

/// Span around the audit work for one intercepted call.
pub fn audit_span(interpretation: &str) -> Span {
    trace_span!("audit", op = %interpretation, error = tracing::field::Empty)
}

/// Span around writes to the audit log.
pub fn sink_span(operation: &'static str) -> Span {
    trace_span!("sink", op = operation, error = tracing::field::Empty)
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}
