use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use leadsync_core::Settings;

use crate::cycle::{Cycle, CycleOptions};
use crate::error::DaemonError;

/// Totals over the lifetime of one [`run_scheduler`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub runs: usize,
    pub failures: usize,
    pub rows_transferred: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global stderr subscriber. `RUST_LOG` overrides the `info`
/// default. Later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Run `job` immediately and then once per `interval` until `shutdown`
/// fires. Jobs never overlap: a tick that comes due while a job is still
/// running is delayed until it finishes. A failed job is logged and
/// counted; the schedule continues.
///
/// `job` resolves to the number of rows it transferred.
pub async fn run_scheduler<F, Fut, E>(
    interval: Duration,
    mut job: F,
    mut shutdown: broadcast::Receiver<()>,
) -> SchedulerStats
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<usize, E>>,
    E: Display,
{
    let mut stats = SchedulerStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = interval.as_secs(), "scheduler started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                stats.runs += 1;
                match job().await {
                    Ok(rows) => {
                        stats.rows_transferred += rows;
                        tracing::info!(run = stats.runs, rows, "scheduled run completed");
                    }
                    Err(err) => {
                        stats.failures += 1;
                        tracing::error!(run = stats.runs, error = %err, "scheduled run failed, waiting for next tick");
                    }
                }
            }
        }
    }

    tracing::info!(
        runs = stats.runs,
        failures = stats.failures,
        rows_transferred = stats.rows_transferred,
        "scheduler stopped"
    );
    stats
}

/// Start the scheduler on a new multi-threaded runtime and block until
/// ctrl-c or SIGTERM.
pub fn start_blocking(settings: Settings) -> Result<SchedulerStats, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;
    runtime.block_on(run(settings))
}

/// Process stop requests: ctrl-c everywhere, plus SIGTERM on unix.
pub(crate) struct StopSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl StopSignals {
    /// Install the handlers. Must be called inside a runtime; once this
    /// returns, a SIGTERM no longer kills the process.
    pub(crate) fn register() -> Result<Self, DaemonError> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|err| DaemonError::Signal(err.to_string()))?,
        })
    }

    /// Wait for the next stop request and name the signal that sent it.
    pub(crate) async fn recv(&mut self) -> Result<&'static str, DaemonError> {
        #[cfg(unix)]
        {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => signal
                    .map(|()| "ctrl-c")
                    .map_err(|err| DaemonError::Signal(err.to_string())),
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .map(|()| "ctrl-c")
                .map_err(|err| DaemonError::Signal(err.to_string()))
        }
    }
}

/// Build a [`Cycle`] from `settings` and run it every `settings.interval`
/// until ctrl-c or SIGTERM.
pub async fn run(settings: Settings) -> Result<SchedulerStats, DaemonError> {
    let cycle = Arc::new(Cycle::from_settings(&settings)?);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let mut signals = StopSignals::register()?;

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok::<(), DaemonError>(()),
                signal = signals.recv() => {
                    let signal = signal?;
                    tracing::info!(signal, "stop requested, finishing current run");
                    let _ = shutdown.send(());
                    Ok(())
                }
            }
        })
    };

    let job = || {
        let cycle = cycle.clone();
        async move {
            let summary = tokio::task::spawn_blocking(move || cycle.run(CycleOptions::default()))
                .await
                .map_err(|err| DaemonError::Join {
                    task: "cycle",
                    reason: err.to_string(),
                })??;
            Ok::<usize, DaemonError>(summary.rows_transferred())
        }
    };

    let stats = run_scheduler(settings.interval, job, shutdown_rx).await;
    let _ = shutdown_tx.send(());
    match signal_handle.await {
        Ok(result) => result?,
        Err(err) => {
            return Err(DaemonError::Join {
                task: "signal_handler",
                reason: err.to_string(),
            })
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::sleep;

    use super::*;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn first_run_is_immediate_then_every_interval() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(run_scheduler(
            Duration::from_secs(600),
            || async { Ok::<usize, String>(2) },
            shutdown_rx,
        ));

        sleep(Duration::from_secs(1250)).await;
        shutdown_tx.send(()).expect("send shutdown");
        let stats = handle.await.expect("join");

        assert_eq!(
            stats,
            SchedulerStats {
                runs: 3,
                failures: 0,
                rows_transferred: 6
            }
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failed_run_does_not_stop_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let job = {
            let calls = calls.clone();
            move || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err("sheets unavailable".to_string())
                    } else {
                        Ok(1)
                    }
                }
            }
        };
        let handle = tokio::spawn(run_scheduler(Duration::from_secs(60), job, shutdown_rx));

        sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(()).expect("send shutdown");
        let stats = handle.await.expect("join");

        assert_eq!(stats.runs, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.rows_transferred, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn slow_runs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let job = {
            let active = active.clone();
            let peak = peak.clone();
            move || {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_secs(90)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, String>(0)
                }
            }
        };
        let handle = tokio::spawn(run_scheduler(Duration::from_secs(60), job, shutdown_rx));

        sleep(Duration::from_secs(400)).await;
        shutdown_tx.send(()).expect("send shutdown");
        let stats = handle.await.expect("join");

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(stats.runs >= 4, "runs: {}", stats.runs);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_before_first_tick_completes_cleanly() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        shutdown_tx.send(()).expect("send shutdown");
        let stats = run_scheduler(
            Duration::from_secs(600),
            || async { Ok::<usize, String>(1) },
            shutdown_rx,
        )
        .await;
        assert_eq!(stats.runs, 0, "a pending shutdown wins over the first tick");
        assert_eq!(stats.failures, 0);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn sigterm_is_a_stop_request() {
        let mut signals = StopSignals::register().expect("register handlers");
        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .expect("run kill");
        assert!(status.success());

        let signal = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .expect("SIGTERM delivered")
            .expect("signal stream open");
        assert_eq!(signal, "SIGTERM");
    }
}
