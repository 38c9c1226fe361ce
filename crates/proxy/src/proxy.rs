use axum::{
    extract::{Request, State},
    http::{header, request::Parts, Method},
    response::{IntoResponse, Response},
};
use ep_core::error::{ProxyError, ProxyResult};
use ep_upstream::{UpstreamError, UpstreamRequest};
use http_body_util::LengthLimitError;
use crate::{
    headers::sanitize,
    mode::resolve_mode,
    response::{assemble, rewrite_cookies},
    state::AppState,
};

/// Fallback handler: every path not served by the edge itself lands here.
/// Always yields a response; failures become JSON error bodies with CORS.
pub async fn proxy_handler(State(state): State<AppState>, req: Request) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let decision = state.cors.resolve(origin.as_deref());

    if req.method() == Method::OPTIONS {
        tracing::debug!(origin = origin.as_deref().unwrap_or_default(), "preflight answered at edge");
        return state.cors.preflight(&decision);
    }

    let mut resp = match forward(&state, req).await {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    };
    state.cors.apply(&decision, resp.headers_mut());
    resp
}

async fn forward(state: &AppState, req: Request) -> ProxyResult<Response> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();
    let query = parts.uri.query();

    state.functions.check(path)?;
    let mode = resolve_mode(state.mode, request_host(&parts));
    let target = state.target.resolve(path, query).map_err(|e| {
        tracing::warn!(error = %e, path, "rejecting unroutable path");
        ProxyError::InvalidPath
    })?;
    let body = axum::body::to_bytes(body, state.body_limit()).await.map_err(|e| {
        let e = e.into_inner();
        if e.downcast_ref::<LengthLimitError>().is_some() {
            tracing::warn!(limit = state.body_limit(), "request body over limit");
            ProxyError::PayloadTooLarge
        } else {
            tracing::warn!(error = %e, "reading request body failed");
            ProxyError::InvalidBody
        }
    })?;

    let upstream_req = UpstreamRequest::new(parts.method.clone(), target, sanitize(&parts.headers), body);
    let upstream = state.upstream.forward(upstream_req).await.map_err(|e| {
        tracing::error!(error = %e, method = %parts.method, path, "upstream request failed");
        match e {
            UpstreamError::Timeout => ProxyError::UpstreamTimeout,
            _ => ProxyError::UpstreamUnavailable,
        }
    })?;

    let cookies = rewrite_cookies(&upstream.headers, &state.cookies, mode);
    tracing::debug!(status = upstream.status.as_u16(), ?mode, cookies = cookies.len(), "upstream responded");
    let force_private = state.cache.is_private(path, query);
    Ok(assemble(upstream, cookies, force_private, &parts.method))
}

fn request_host(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
}
