use axum::http::{header, HeaderMap, HeaderName};

/// Connection-scoped headers (RFC 9110 §7.6.1) that never cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client/edge metadata added by the CDN or platform in front of us.
const EDGE_METADATA: &[&str] = &[
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
    "forwarded",
    "true-client-ip",
    "cf-connecting-ip",
    "cf-connecting-ipv6",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "cf-worker",
    "cdn-loop",
    "x-nf-client-connection-ip",
    "x-nf-request-id",
];

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Copy of the inbound headers that is safe to send to the origin.
/// `Host` and `Content-Length` are recomputed by the client for the target.
pub fn sanitize(inbound: &HeaderMap) -> HeaderMap {
    let mut out = inbound.clone();
    strip_hop_by_hop(&mut out);
    for name in EDGE_METADATA {
        out.remove(*name);
    }
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}
