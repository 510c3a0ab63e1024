/// Security response headers
///
/// Every response is JSON that may carry tokens or account data, so the
/// policy is the same for all routes: no sniffing, no framing, no caching,
/// no referrer, and nothing loadable. HSTS is added only in production.
///
/// Applied with `axum::middleware::map_response_with_state(production,
/// security_headers)`.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Headers set on every response
const BASE_HEADERS: [(header::HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (header::CACHE_CONTROL, "no-store"),
];

fn apply(headers: &mut HeaderMap, production: bool) {
    for (name, value) in BASE_HEADERS {
        // A handler's own Cache-Control wins
        if name == header::CACHE_CONTROL && headers.contains_key(&name) {
            continue;
        }
        headers.insert(name, HeaderValue::from_static(value));
    }

    if production {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
}

/// Response mapper adding the security headers
pub async fn security_headers(State(production): State<bool>, mut response: Response) -> Response {
    apply(response.headers_mut(), production);
    response
}
