// src/cli/summarize.rs — Offline billing summary preview

use tokio::io::AsyncReadExt;

use crate::billing::SummaryGenerator;
use crate::infra::config::Config;
use crate::provider::resolver;

pub async fn run_summarize(
    config: &Config,
    file: &str,
    elapsed_ms: u64,
    tone: Option<&str>,
) -> anyhow::Result<()> {
    let content = if file == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(file)
            .await
            .map_err(|e| anyhow::anyhow!("cannot read {file}: {e}"))?
    };

    let summaries = SummaryGenerator::new(
        config.billing.clone(),
        resolver::resolve_generator(&config.generator),
    )
    .with_timeout(config.generator.timeout());
    let summary = summaries.generate(&content, elapsed_ms, tone).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
