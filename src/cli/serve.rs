// src/cli/serve.rs — Wire up and run the tracking server

use std::sync::Arc;
use std::time::Duration;

use crate::api::{self, ApiState};
use crate::billing::SummaryGenerator;
use crate::infra::config::Config;
use crate::integrations;
use crate::provider::resolver;
use crate::session::sweep::spawn_sweeper;
use crate::session::{SendCoordinator, SessionRegistry, SweepPolicy};
use crate::tracker::clock::SystemClock;

/// Headroom over the adapters' own HTTP timeouts.
const LEG_SLACK: Duration = Duration::from_secs(5);

/// Build the shared server state from config.
pub fn build_state(config: &Config) -> ApiState {
    let generator = resolver::resolve_generator(&config.generator);
    let summaries = SummaryGenerator::new(config.billing.clone(), generator)
        .with_timeout(config.generator.timeout());
    let registry = Arc::new(SessionRegistry::new(Arc::new(SystemClock), summaries));

    let leg_timeout = config.mail.timeout().max(config.practice.timeout()) + LEG_SLACK;
    let coordinator = Arc::new(
        SendCoordinator::new(
            registry.clone(),
            integrations::resolve_mail_sender(config),
            integrations::resolve_time_logger(config),
            config.practice.default_matter.clone(),
        )
        .with_leg_timeout(leg_timeout),
    );

    ApiState {
        registry,
        coordinator,
        token: config.server.token.clone(),
        allowed_origins: config.server.allowed_origins.clone(),
    }
}

pub async fn run_serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let mut server = config.server.clone();
    if let Some(port) = port {
        server.port = port;
    }
    if server.token.is_none() && server.host != "127.0.0.1" && server.host != "localhost" {
        tracing::warn!(
            host = %server.host,
            "Serving on a non-loopback address without a bearer token"
        );
    }

    let state = build_state(config);
    let sweeper = spawn_sweeper(
        state.registry.clone(),
        SweepPolicy::from(&config.tracking),
        config.tracking.sweep_interval(),
    );

    let result = api::start_server(&server, state).await;
    sweeper.abort();
    result
}
