// ABOUTME: Health gate that polls a container's HTTP readiness endpoint.
// ABOUTME: Retries on a fixed interval until a 2xx answer or the timeout budget is spent.

use super::error::DeployError;
use crate::cluster::Container;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Issues a single readiness request.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// GET `url` and return the HTTP status code.
    async fn get(&self, url: &str) -> Result<u16, ProbeError>;
}

#[async_trait]
impl<P: ReadinessProbe + ?Sized> ReadinessProbe for Arc<P> {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        (**self).get(url).await
    }
}

/// Errors from a single readiness request.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe URL {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("no response within {0:?}")]
    TimedOut(Duration),
}

/// Readiness probe over plain HTTP/1.1, one connection per request.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    request_timeout: Duration,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        let uri: hyper::Uri = url
            .parse()
            .map_err(|_| ProbeError::InvalidUrl(url.to_string()))?;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| ProbeError::InvalidUrl(url.to_string()))?;
        let port = authority.port_u16().unwrap_or(80);
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let request = async {
            let stream = TcpStream::connect((socket_host(authority.host()), port))
                .await
                .map_err(|e| ProbeError::Connect(e.to_string()))?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| ProbeError::Connect(format!("HTTP handshake failed: {}", e)))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!("readiness connection error: {}", e);
                }
            });

            let req = hyper::Request::builder()
                .method("GET")
                .uri(path)
                .header(hyper::header::HOST, authority.as_str())
                .header(hyper::header::USER_AGENT, "seqredeploy")
                .body(Empty::<Bytes>::new())
                .map_err(|e| ProbeError::Request(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| ProbeError::Request(e.to_string()))?;

            Ok::<u16, ProbeError>(resp.status().as_u16())
        };

        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ProbeError::TimedOut(self.request_timeout))?
    }
}

/// Host part of a URL authority as a socket address wants it: IPv6 without brackets.
fn socket_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Host for a URL authority: bare IPv6 literals get brackets.
fn url_host(host: &str) -> Cow<'_, str> {
    if host.contains(':') && !host.starts_with('[') {
        Cow::Owned(format!("[{}]", host))
    } else {
        Cow::Borrowed(host)
    }
}

/// Blocks rollout progression until a container answers its readiness check.
#[derive(Debug, Clone)]
pub struct HealthGate<P> {
    probe: P,
    interval: Duration,
    probe_host: Option<String>,
}

impl<P: ReadinessProbe> HealthGate<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            probe_host: None,
        }
    }

    /// Probe this host instead of each container's private address.
    pub fn with_probe_host(mut self, host: Option<String>) -> Self {
        self.probe_host = host;
        self
    }

    /// URL of the readiness endpoint of `container`.
    pub fn target_url(&self, check_path: &str, container: &Container) -> Result<String, DeployError> {
        let port = container
            .probe_port()
            .ok_or_else(|| DeployError::NoProbePort {
                name: container.name.clone(),
                id: container.id.clone(),
            })?;
        let host = self
            .probe_host
            .as_deref()
            .unwrap_or(container.private_ip.as_str());
        let separator = if check_path.starts_with('/') { "" } else { "/" };

        Ok(format!(
            "http://{}:{}{}{}",
            url_host(host),
            port,
            separator,
            check_path
        ))
    }

    /// Poll until the endpoint answers 2xx, returning the number of attempts.
    ///
    /// Transport errors and non-2xx answers both count as "not ready yet".
    /// The budget is only checked after a failed attempt, so at least one
    /// request is always made.
    pub async fn await_healthy(
        &self,
        check_path: &str,
        container: &Container,
        timeout: Duration,
    ) -> Result<u32, DeployError> {
        let url = self.target_url(check_path, container)?;
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            tracing::debug!(container = %container.id, name = %container.name, %url, attempt = attempts, "calling readiness endpoint");

            match self.probe.get(&url).await {
                Ok(status) if (200..300).contains(&status) => return Ok(attempts),
                Ok(status) => {
                    tracing::info!(container = %container.id, %url, status, "container not ready yet");
                }
                Err(e) => {
                    tracing::info!(container = %container.id, %url, error = %e, "container not ready yet");
                }
            }

            if started.elapsed() >= timeout {
                return Err(DeployError::HealthCheckTimeout {
                    name: container.name.clone(),
                    id: container.id.clone(),
                    url,
                    secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
