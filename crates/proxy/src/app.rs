use std::{net::SocketAddr, sync::Arc};
use axum::{body::Body, http, Router};
use tower::{limit::ConcurrencyLimitLayer, ServiceBuilder};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::{trace::TraceLayer, request_id::{PropagateRequestIdLayer, SetRequestIdLayer}};
use ep_core::config::AppConfig;
use ep_upstream::{HttpUpstream, Upstream};
use http::header::HeaderName;
use crate::{state::AppState, routes, observability::REQUEST_ID_HEADER};
use uuid::Uuid;

#[derive(Clone)]
struct MakeRequestUuid;
impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

pub fn build_app(cfg: Arc<AppConfig>) -> anyhow::Result<AppStateAndRouter> {
    let upstream = HttpUpstream::new(cfg.upstream_timeout(), cfg.connect_timeout())?;
    build_app_with_upstream(cfg, Arc::new(upstream))
}

/// Same router as `build_app`, with the origin client supplied by the caller.
pub fn build_app_with_upstream(cfg: Arc<AppConfig>, upstream: Arc<dyn Upstream>) -> anyhow::Result<AppStateAndRouter> {
    let state = AppState::new(upstream, cfg.clone())?;
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &http::Request<Body>| {
            let method = req.method().clone();
            let uri = req.uri().path().to_string();
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            tracing::info_span!("request", %method, %uri, %request_id, status = tracing::field::Empty)
        })
        .on_response(|res: &http::Response<Body>, latency: std::time::Duration, span: &tracing::Span| {
            let status = res.status().as_u16();
            span.record("status", tracing::field::display(status));
            tracing::info!(parent: span, status, latency_ms = latency.as_millis() as u64, "request.completed");
        });

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id_header.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(trace)
        .layer(ConcurrencyLimitLayer::new(cfg.http.max_in_flight as usize));

    let router = Router::new()
        .merge(routes::routes())
        .with_state(state.clone())
        .layer(middleware);
    Ok(AppStateAndRouter { state, router })
}

#[derive(Clone)]
pub struct AppStateAndRouter { pub state: AppState, pub router: Router }

pub fn server_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.app.host, cfg.app.port).parse()?)
}
