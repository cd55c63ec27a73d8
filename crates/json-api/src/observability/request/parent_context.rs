//! Parent trace context extraction from HTTP headers.

use opentelemetry::{
    Context,
    propagation::{Extractor, TextMapPropagator},
    trace::TraceContextExt as _,
};
use salvo::http::{HeaderMap, HeaderName};

/// Returns the caller's trace context when the headers carry a valid one.
pub(super) fn extract_parent_context(
    propagator: &dyn TextMapPropagator,
    headers: &HeaderMap,
) -> Option<Context> {
    // A fresh base keeps requests without trace headers off the in-process
    // span chain.
    let context = propagator.extract_with_context(&Context::new(), &HeaderExtractor(headers));
    let valid = context.span().span_context().is_valid();

    valid.then_some(context)
}

#[derive(Debug)]
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}
