// src/session/sweep.rs — Background reclamation task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;

use super::registry::{SessionRegistry, SweepPolicy};

/// Spawn the periodic sweep. Abort the handle to stop it.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    policy: SweepPolicy,
    every: Duration,
) -> JoinHandle<()> {
    let span = tracing::info_span!("session_sweep", every_secs = every.as_secs());
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = registry.sweep(&policy);
                if report.paused + report.sent + report.abandoned > 0 {
                    tracing::info!(
                        paused = report.paused,
                        sent = report.sent,
                        abandoned = report.abandoned,
                        skipped_busy = report.skipped_busy,
                        remaining = registry.len(),
                        "Sweep complete"
                    );
                } else {
                    tracing::trace!(remaining = registry.len(), "Sweep found nothing to do");
                }
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::SummaryGenerator;
    use crate::infra::config::BillingConfig;
    use crate::session::types::SessionStatus;
    use crate::tracker::clock::ManualClock;

    #[tokio::test]
    async fn test_sweeper_reclaims_in_background() {
        let clock = Arc::new(ManualClock::starting_now());
        let registry = Arc::new(SessionRegistry::new(
            clock.clone(),
            SummaryGenerator::template_only(BillingConfig::default()),
        ));
        let id = registry
            .create_session("a@x.com", "A", "", None)
            .unwrap()
            .session_id;
        {
            let mut session = registry.lock(&id).await.unwrap();
            session.status = SessionStatus::Sent;
            session.message_id = Some("m-1".into());
            session.time_entry_id = Some("t-1".into());
        }

        let policy = SweepPolicy {
            idle_timeout: chrono::Duration::seconds(30),
            abandon_after: chrono::Duration::hours(4),
        };
        let handle = spawn_sweeper(registry.clone(), policy, Duration::from_millis(10));

        for _ in 0..100 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(registry.is_empty());
    }
}
