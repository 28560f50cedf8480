// ABOUTME: HTTP listener for redeploy triggers and liveness checks.
// ABOUTME: hyper http1 server, one task per connection, routing in routes.rs.

mod query;
mod routes;

pub use query::{MissingParam, Query};
pub use routes::{AppState, route};

use std::convert::Infallible;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::cluster::ClusterApi;
use crate::deploy::RolloutRunner;

/// Accept connections forever, serving each on its own task.
pub async fn serve<R, C>(listener: TcpListener, state: Arc<AppState<R, C>>) -> std::io::Result<()>
where
    R: RolloutRunner,
    C: ClusterApi + ?Sized + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening for redeploy requests");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(route(&state, req).await) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, "connection error: {}", e);
            }
        });
    }
}
