use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::tasks::sweeper;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let every = Duration::from_secs(state.settings().sessions().sweep_interval_seconds);

    let handle = tokio::spawn(sweep_loop(state, every, shutdown_rx));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

async fn sweep_loop(state: AppState, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_seconds = every.as_secs(), "Session sweeper started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeper::sweep(&state, primitive_now_utc()).await {
                    tracing::error!(error = %err, "sweep failed");
                }
            }
        }
    }
    tracing::info!("Session sweeper stopped");
}
