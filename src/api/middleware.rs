//! Observability middleware: structured request logging, permissive CORS,
//! and an optional transport-layer identity provider. Per spec.md §1/§4.1,
//! identity has no authorization effect in the core — it is attached to the
//! request's tracing span only.

use std::collections::BTreeMap;

use actix_cors::Cors;
use actix_web::HttpRequest;
use tracing_actix_web::TracingLogger;

/// The request logger. `tracing_actix_web::TracingLogger` emits one span per
/// request carrying method, path, status and elapsed time — the teacher's
/// own dependency set already pulls in `tracing-actix-web` for this, so RCP
/// reuses it rather than hand-rolling a `middleware::Logger` wrapper.
pub fn request_logger() -> TracingLogger<tracing_actix_web::DefaultRootSpanBuilder> {
    TracingLogger::default()
}

/// CORS is permissive by default — the core has no notion of allowed
/// origins (spec.md §1 non-goals exclude authorization beyond transport
/// identity, and CORS policy is an external-collaborator concern).
pub fn permissive_cors() -> Cors {
    Cors::permissive()
}

/// A resolved transport-layer identity, attached to the request log when an
/// `IdentityProvider` is configured. Carries no authorization weight.
#[derive(Debug, Clone, Default)]
pub struct WhoIs {
    pub subject: String,
    pub attributes: BTreeMap<String, String>,
}

/// A pluggable source of per-request identity. The core ships one
/// implementation (`HeaderIdentity`) since spec.md treats identity
/// extraction as an external collaborator — callers may supply their own.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, req: &HttpRequest) -> Option<WhoIs>;
}

/// Reads a fixed header (e.g. one set by a trusted reverse proxy) as the
/// request's identity subject.
pub struct HeaderIdentity {
    pub header: String,
}

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, req: &HttpRequest) -> Option<WhoIs> {
        let subject = req.headers().get(&self.header)?.to_str().ok()?.to_string();
        Some(WhoIs {
            subject,
            attributes: BTreeMap::new(),
        })
    }
}

/// Records `who.subject` (and every attribute, prefixed `who.`) on the
/// current tracing span, mirroring the `logger.EntrySet` identity-attaching
/// behavior in the original implementation.
pub fn record_identity(provider: Option<&dyn IdentityProvider>, req: &HttpRequest) {
    let Some(provider) = provider else { return };
    let Some(who) = provider.identify(req) else {
        return;
    };

    tracing::Span::current().record("who.subject", tracing::field::display(&who.subject));
    for (key, value) in &who.attributes {
        tracing::info!(who.subject = %who.subject, attribute = %key, value = %value, "identity attribute");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn header_identity_reads_configured_header() {
        let provider = HeaderIdentity {
            header: "x-forwarded-user".to_string(),
        };

        let req = TestRequest::default()
            .insert_header(("x-forwarded-user", "alice"))
            .to_http_request();

        let who = provider.identify(&req).unwrap();
        assert_eq!(who.subject, "alice");
    }

    #[test]
    fn header_identity_absent_header_is_none() {
        let provider = HeaderIdentity {
            header: "x-forwarded-user".to_string(),
        };

        let req = TestRequest::default().to_http_request();
        assert!(provider.identify(&req).is_none());
    }
}
