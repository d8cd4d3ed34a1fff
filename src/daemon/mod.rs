/// Background tasks: the audio monitor feeding the reconciliation loop, and
/// the now-playing presenter. Each task runs its ticks sequentially on its
/// own interval; missed ticks are skipped rather than bunched up.
use crate::monitor::{ActivityMonitor, AudioSurfaceSource, Edge};
use crate::presenter::NowPlayingPresenter;
use crate::reconcile::ReconciliationLoop;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Daemon {
    monitor_task: JoinHandle<()>,
    presenter_task: JoinHandle<()>,
}

impl Daemon {
    pub fn spawn(
        monitor: ActivityMonitor,
        source: Arc<dyn AudioSurfaceSource>,
        reconciler: ReconciliationLoop,
        presenter: NowPlayingPresenter,
        poll_interval: Duration,
        presenter_interval: Duration,
    ) -> Self {
        tracing::info!(
            "Starting background tasks (monitor every {:?}, presenter every {:?})",
            poll_interval,
            presenter_interval
        );

        let monitor_task = tokio::spawn(run_monitor(monitor, source, reconciler, poll_interval));
        let presenter_task = tokio::spawn(run_presenter(presenter, presenter_interval));

        Self {
            monitor_task,
            presenter_task,
        }
    }

    /// Run until `shutdown` resolves, then tear both tasks down
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        shutdown.await;
        tracing::info!("Shutting down background tasks");
        self.abort();
    }

    /// In-flight remote commands are abandoned
    pub fn abort(&self) {
        self.monitor_task.abort();
        self.presenter_task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.monitor_task.is_finished() && self.presenter_task.is_finished()
    }
}

async fn run_monitor(
    mut monitor: ActivityMonitor,
    source: Arc<dyn AudioSurfaceSource>,
    mut reconciler: ReconciliationLoop,
    period: Duration,
) {
    reconciler.reset().await;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let edge = monitor.tick(source.as_ref()).await;
        if edge != Edge::None {
            reconciler.handle_edge(edge).await;
        }
    }
}

async fn run_presenter(presenter: NowPlayingPresenter, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        presenter.refresh().await;
    }
}
