// Timed HTTP fetch decomposed into connect / TTFB / transfer phases.
// Any transport failure becomes the sentinel measurement; nothing is raised past here.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::models::Measurement;

/// Upper bound for establishing the transport connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for one whole probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// One timed fetch of a target. Implementations never fail: a failed fetch
/// yields [`Measurement::FAILED`].
pub trait Probe: Send + Sync + 'static {
    fn measure(&self, target: &str) -> impl Future<Output = Measurement> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0}")]
    Scheme(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("request: {0}")]
    Http(#[from] reqwest::Error),
}

/// Records how long the first connection of a client took to become usable
/// (DNS, TCP and, for https, the TLS handshake).
#[derive(Debug, Clone, Default)]
struct ConnectTimer {
    elapsed: Arc<Mutex<Option<Duration>>>,
}

impl ConnectTimer {
    fn take(&self) -> Option<Duration> {
        self.elapsed.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl<S> Layer<S> for ConnectTimer {
    type Service = TimedConnect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimedConnect {
            inner,
            elapsed: self.elapsed.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct TimedConnect<S> {
    inner: S,
    elapsed: Arc<Mutex<Option<Duration>>>,
}

impl<S, R> Service<R> for TimedConnect<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let started = Instant::now();
        let connecting = self.inner.call(req);
        let elapsed = self.elapsed.clone();
        Box::pin(async move {
            let conn = connecting.await?;
            // Redirects may open more connections; only the first one is reported.
            elapsed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get_or_insert(started.elapsed());
            Ok(conn)
        })
    }
}

/// reqwest-backed prober. Each probe gets its own client so the connect
/// timing it records belongs to that probe's connection alone, and nothing is
/// pooled between probes: every fetch pays for a fresh connection, like a
/// first page load would.
#[derive(Debug, Clone)]
pub struct HttpProber;

impl HttpProber {
    /// Fails if the TLS backend cannot be initialised.
    pub fn new() -> anyhow::Result<Self> {
        Self::client(ConnectTimer::default())?;
        Ok(Self)
    }

    fn client(timer: ConnectTimer) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(PROBE_TIMEOUT)
            .pool_max_idle_per_host(0)
            .connector_layer(timer)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    async fn try_measure(&self, target: &str) -> Result<Measurement, ProbeError> {
        let url = Url::parse(target)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeError::Scheme(url.scheme().to_string()));
        }
        let timer = ConnectTimer::default();
        let client = Self::client(timer.clone())?;

        let request_started = Instant::now();
        let mut response = client.get(url).send().await?;
        let latency_ms = ms(request_started.elapsed());
        let mut body_bytes = 0usize;
        while let Some(chunk) = response.chunk().await? {
            body_bytes += chunk.len();
        }
        let page_load_ms = ms(request_started.elapsed());
        let connection_ms = timer.take().map(ms).unwrap_or_default();

        debug!(
            url = target,
            status = response.status().as_u16(),
            body_bytes,
            "probe complete"
        );
        Ok(Measurement::from_phases(
            connection_ms,
            latency_ms,
            page_load_ms,
        ))
    }
}

impl Probe for HttpProber {
    #[instrument(skip(self, target), fields(operation = "probe", url = %target))]
    async fn measure(&self, target: &str) -> Measurement {
        let result = match timeout(PROBE_TIMEOUT, self.try_measure(target)).await {
            Ok(r) => r,
            Err(_) => Err(ProbeError::Timeout(PROBE_TIMEOUT)),
        };
        match result {
            Ok(m) => m,
            Err(e) => {
                warn!(url = target, error = %e, "probe failed");
                Measurement::FAILED
            }
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
