// tests/registry_test.rs — Integration test: session lifecycle and locking

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use timeslip::billing::SummaryGenerator;
use timeslip::infra::config::BillingConfig;
use timeslip::infra::errors::TimeslipError;
use timeslip::provider::TextGenerator;
use timeslip::session::types::NarrativeSource;
use timeslip::session::{SessionRegistry, SessionStatus};
use timeslip::tracker::clock::ManualClock;

/// Slow generator that counts its calls.
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for Counting {
    fn id(&self) -> &str {
        "counting"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, TimeslipError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok("Prepared correspondence regarding settlement.".into())
    }
}

fn registry_with(provider: Option<Arc<dyn TextGenerator>>) -> (Arc<SessionRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let registry = Arc::new(SessionRegistry::new(
        clock.clone(),
        SummaryGenerator::new(BillingConfig::default(), provider),
    ));
    (registry, clock)
}

#[tokio::test]
async fn test_stop_after_three_minutes_of_fifty_words() {
    let (registry, clock) = registry_with(None);
    let id = registry
        .create_session("client@example.com", "Update", "", None)
        .unwrap()
        .session_id;
    clock.advance_ms(180_000);

    let content = vec!["word"; 50].join(" ");
    let outcome = registry.stop_session(&id, &content, None).await.unwrap();

    assert_eq!(outcome.elapsed_ms, 180_000);
    assert_eq!(outcome.billing_summary.hours, 0.05);
    assert_eq!(outcome.billing_summary.metadata.word_count, 50);
    assert_eq!(outcome.billing_summary.source, NarrativeSource::Template);
}

#[tokio::test]
async fn test_concurrent_stops_generate_once() {
    let counting = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let provider: Arc<dyn TextGenerator> = counting.clone();
    let (registry, clock) = registry_with(Some(provider));
    let id = registry
        .create_session("client@example.com", "Update", "", None)
        .unwrap()
        .session_id;
    clock.advance_ms(60_000);

    let (a, b) = tokio::join!(
        registry.stop_session(&id, "Our settlement offer.", None),
        registry.stop_session(&id, "Our settlement offer.", None),
    );

    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(TimeslipError::AlreadyStopped { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

    let session = registry.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Stopped);
    assert_eq!(
        session.billing_summary.unwrap().narrative,
        "Prepared correspondence regarding settlement."
    );
}

#[tokio::test]
async fn test_different_sessions_finalize_independently() {
    let counting = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let provider: Arc<dyn TextGenerator> = counting.clone();
    let (registry, _) = registry_with(Some(provider));
    let a = registry.create_session("a@example.com", "A", "", None).unwrap().session_id;
    let b = registry.create_session("b@example.com", "B", "", None).unwrap().session_id;

    let (ra, rb) = tokio::join!(
        registry.stop_session(&a, "one", None),
        registry.stop_session(&b, "two", None),
    );
    assert!(ra.is_ok());
    assert!(rb.is_ok());
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_activity_on_paused_session_keeps_accumulated() {
    let (registry, clock) = registry_with(None);
    let id = registry
        .create_session("client@example.com", "Update", "", None)
        .unwrap()
        .session_id;

    clock.advance_ms(20_000);
    registry.pause_session(&id, None).await.unwrap();
    clock.advance_ms(300_000);
    registry.record_activity(&id).await.unwrap();

    let session = registry.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.accumulated_ms, 20_000);

    clock.advance_ms(10_000);
    let outcome = registry.stop_session(&id, "done", None).await.unwrap();
    assert_eq!(outcome.elapsed_ms, 30_000);
}

#[tokio::test]
async fn test_stop_freezes_time() {
    let (registry, clock) = registry_with(None);
    let id = registry
        .create_session("client@example.com", "Update", "", None)
        .unwrap()
        .session_id;
    clock.advance_ms(5_000);
    registry.stop_session(&id, "done", None).await.unwrap();

    clock.advance_ms(60_000);
    registry.record_activity(&id).await.unwrap();
    let session = registry.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Stopped);
    assert_eq!(session.accumulated_ms, 5_000);
    assert_eq!(session.elapsed_at(registry.now()), 5_000);
}

/// Provider that never answers.
struct Stalled;

#[async_trait]
impl TextGenerator for Stalled {
    fn id(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, TimeslipError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_stop_with_stalled_provider_uses_template() {
    let clock = Arc::new(ManualClock::starting_now());
    let summaries = SummaryGenerator::new(BillingConfig::default(), Some(Arc::new(Stalled)))
        .with_timeout(Duration::from_millis(100));
    let registry = Arc::new(SessionRegistry::new(clock.clone(), summaries));
    let id = registry
        .create_session("client@example.com", "Update", "", None)
        .unwrap()
        .session_id;
    clock.advance_ms(60_000);

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        registry.stop_session(&id, "Short note.", None),
    )
    .await
    .expect("stop must not wait on the provider")
    .unwrap();
    assert_eq!(outcome.billing_summary.source, NarrativeSource::Template);
    assert_eq!(outcome.elapsed_ms, 60_000);

    // Lock released: a second stop answers immediately with a conflict
    assert!(matches!(
        registry.stop_session(&id, "Short note.", None).await,
        Err(TimeslipError::AlreadyStopped { .. })
    ));
}
