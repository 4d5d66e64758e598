//! Periodic health pings while a task runs.

use std::time::Duration;

use cmdrelay_core::Reporter;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Ping the backend every `every` until the returned handle is aborted.
/// The first ping goes out one interval after the call.
pub fn spawn_heartbeat<R>(reporter: R, task_id: String, every: Duration) -> JoinHandle<()>
where
    R: Reporter + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::trace!(%task_id, "Sending health ping");
            reporter.report_health(&task_id).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use cmdrelay_core::{CommandOutcome, Directive, ReportError, TaskStatus};

    use super::*;

    #[derive(Default)]
    struct CountingReporter {
        pings: AtomicUsize,
    }

    #[async_trait]
    impl Reporter for CountingReporter {
        async fn report_task_status(
            &self,
            _task_id: &str,
            _status: TaskStatus,
            _reason: Option<&str>,
        ) -> Result<(), ReportError> {
            Ok(())
        }

        async fn report_command(
            &self,
            _task_id: &str,
            _outcome: &CommandOutcome,
        ) -> Result<Directive, ReportError> {
            Ok(Directive::proceed())
        }

        async fn report_health(&self, _task_id: &str) {
            self.pings.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_on_interval_until_aborted() {
        let reporter = Arc::new(CountingReporter::default());
        let handle = spawn_heartbeat(Arc::clone(&reporter), "t1".into(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reporter.pings.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(reporter.pings.load(Ordering::SeqCst), 2);

        handle.abort();
        let _ = handle.await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(reporter.pings.load(Ordering::SeqCst), 2);
    }
}
