// tests/sync_test.rs — Integration test: HTTP sync client against a live router

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use timeslip::api::types::StartRequest;
use timeslip::api::{build_router, ApiState};
use timeslip::billing::SummaryGenerator;
use timeslip::infra::config::BillingConfig;
use timeslip::infra::errors::TimeslipError;
use timeslip::integrations::types::Unconfigured;
use timeslip::integrations::{MailSender, TimeLogger};
use timeslip::session::{SendCoordinator, SessionRegistry};
use timeslip::tracker::clock::ManualClock;
use timeslip::tracker::{HttpSessionSync, SessionSync};

async fn serve() -> (String, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let registry = Arc::new(SessionRegistry::new(
        clock.clone(),
        SummaryGenerator::template_only(BillingConfig::default()),
    ));
    let mail: Arc<dyn MailSender> = Arc::new(Unconfigured {
        what: "mail sender",
        hint: "test".into(),
    });
    let logger: Arc<dyn TimeLogger> = Arc::new(Unconfigured {
        what: "time logger",
        hint: "test".into(),
    });
    let coordinator = Arc::new(SendCoordinator::new(registry.clone(), mail, logger, None));
    let app = build_router(ApiState {
        registry,
        coordinator,
        token: None,
        allowed_origins: Vec::new(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), clock)
}

#[tokio::test]
async fn test_unknown_session_maps_to_not_found() {
    let (base, _) = serve().await;
    let sync = HttpSessionSync::new(base, None, 0);

    let err = sync.activity("missing").await.unwrap_err();
    assert!(
        matches!(&err, TimeslipError::SessionNotFound { session_id } if session_id == "missing"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_repeated_stop_returns_cached_summary() {
    let (base, clock) = serve().await;
    let sync = HttpSessionSync::new(base, None, 0);

    let started = sync
        .start(&StartRequest {
            to: "client@example.com".into(),
            subject: "Re: lease".into(),
            content: String::new(),
            matter: None,
        })
        .await
        .unwrap();
    clock.advance_ms(180_000);

    let first = sync
        .stop(&started.session_id, &vec!["word"; 50].join(" "))
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.time_spent, 180_000);

    let again = sync.stop(&started.session_id, "edited").await.unwrap();
    assert!(!again.success);
    assert_eq!(again.time_spent, 180_000);
    assert_eq!(again.billing_summary, first.billing_summary);
}

#[tokio::test]
async fn test_invalid_start_maps_to_validation() {
    let (base, _) = serve().await;
    let sync = HttpSessionSync::new(base, None, 0);

    let err = sync
        .start(&StartRequest {
            to: String::new(),
            subject: "Re: lease".into(),
            content: String::new(),
            matter: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TimeslipError::Validation(_)));
}
