// ABOUTME: Request routing and handlers for the redeploy and health endpoints.
// ABOUTME: Checks the shared secret, then triggers a rollout or round-trips the cluster API.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, Response, StatusCode};

use super::query::Query;
use crate::cluster::{ClusterApi, service_count};
use crate::config::SECRET_ENV;
use crate::deploy::{RedeployCoordinator, RedeployRequest, RolloutRunner};

/// Shared state of the HTTP layer.
pub struct AppState<R, C: ?Sized> {
    pub coordinator: Arc<RedeployCoordinator<R>>,
    pub cluster: Arc<C>,
    /// Expected value of the `secret` query parameter; `None` rejects everything.
    pub secret: Option<String>,
}

/// Route one request. Never fails: every problem becomes an HTTP status.
pub async fn route<R, C, B>(state: &AppState<R, C>, req: Request<B>) -> Response<Full<Bytes>>
where
    R: RolloutRunner,
    C: ClusterApi + ?Sized,
{
    tracing::info!(method = %req.method(), uri = %req.uri(), "request");

    if req.method() != Method::GET && req.method() != Method::POST {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let query = Query::parse(req.uri().query());
    let path = req.uri().path().trim_end_matches('/');

    match path {
        "/redeploy/health" => match authorize(state, &query) {
            Ok(()) => health(state).await,
            Err(response) => response,
        },
        "/redeploy" => match authorize(state, &query) {
            Ok(()) => redeploy(state, &query),
            Err(response) => response,
        },
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

fn authorize<R, C: ?Sized>(
    state: &AppState<R, C>,
    query: &Query,
) -> Result<(), Response<Full<Bytes>>> {
    let given = query
        .require("secret")
        .map_err(|e| text(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let Some(expected) = state.secret.as_deref() else {
        tracing::warn!("rejecting request: no secret configured");
        return Err(text(
            StatusCode::UNAUTHORIZED,
            &format!("missing env {}", SECRET_ENV),
        ));
    };

    if given != expected {
        tracing::warn!("rejecting request: bad secret");
        return Err(text(StatusCode::UNAUTHORIZED, "bad secret"));
    }

    Ok(())
}

fn redeploy<R, C>(state: &AppState<R, C>, query: &Query) -> Response<Full<Bytes>>
where
    R: RolloutRunner,
    C: ?Sized,
{
    let params = query
        .require("service")
        .and_then(|service| Ok((service, query.require("haproxy")?)));
    let (service, gateway) = match params {
        Ok(params) => params,
        Err(e) => return text(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    // Detached: the rollout outlives this request.
    let _ = state
        .coordinator
        .trigger(RedeployRequest::new(service, gateway));

    text(
        StatusCode::OK,
        &format!("redeploy service {} triggered", service),
    )
}

async fn health<R, C>(state: &AppState<R, C>) -> Response<Full<Bytes>>
where
    C: ClusterApi + ?Sized,
{
    match service_count(&*state.cluster).await {
        Ok(count) => text(StatusCode::OK, &format!("ok. services={}", count)),
        Err(e) => {
            tracing::error!("cluster problem: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "cluster problem")
        }
    }
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
