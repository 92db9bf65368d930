use anyhow::Result;
use chrono_tz::Tz;
use loadwatch::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer(Tz);

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Utc::now()
                .with_timezone(&self.0)
                .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

fn main() -> Result<()> {
    let app_config = config::AppConfig::load()?;
    let tz = app_config.monitoring.tz()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer(tz))
        .with_env_filter(filter)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(app_config, tz))
}

async fn serve(app_config: config::AppConfig, tz: Tz) -> Result<()> {
    let store = Arc::new(sample_store::SampleStore::new(&app_config.store.path));
    store.init().await?;

    let prober = prober::HttpProber::new()?;
    let schedule = Arc::new(scheduler::Scheduler::new(
        app_config.monitoring.interval_minutes,
    ));
    let monitor = Arc::new(monitor::Monitor::new(
        targets::TargetSet::new(app_config.monitoring.targets.clone()),
        schedule.clone(),
        collector::Collector::new(prober, store, tz),
    ));
    tracing::info!(
        interval_minutes = app_config.monitoring.interval_minutes,
        timezone = %app_config.monitoring.timezone,
        store = %app_config.store.path,
        "starting"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_handle = scheduler::start(schedule, monitor.clone(), shutdown_rx).await;

    let app = routes::app(monitor);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = scheduler_handle.await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
