use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use osb_core::{
    config::Config,
    shards::{
        acquire::{Acquirer, AcquirerOptions, AcquisitionOutcome},
        dispatch::{DispatchOptions, SearchDispatcher},
        registry::ShardRegistry,
        sink::{ResultSink, StdoutSink},
    },
};

const USAGE: &str = "usage: osb [bot | fetch | search <query>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    osb_core::logging::init("osb")?;

    let cfg = Arc::new(Config::load()?);
    let registry = Arc::new(ShardRegistry::from_config(&cfg));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("bot");

    match command {
        "bot" => {
            // Best effort: missing shards surface as per-shard diagnostics later.
            fetch_shards(&cfg, &registry).await?;
            let dispatcher = Arc::new(SearchDispatcher::new(
                registry.clone(),
                DispatchOptions::from_config(&cfg),
            ));
            osb_telegram::router::run_polling(cfg, registry, dispatcher)
                .await
                .context("telegram bot failed")?;
        }
        "fetch" => {
            let failed = fetch_shards(&cfg, &registry).await?;
            if failed > 0 {
                bail!("{failed} shard(s) could not be acquired");
            }
        }
        "search" => {
            let query = args[1..].join(" ");
            if query.trim().is_empty() {
                bail!("{USAGE}");
            }
            let dispatcher = SearchDispatcher::new(registry, DispatchOptions::from_config(&cfg));
            let result = dispatcher.dispatch(dispatcher.request(query)).await;
            let report = StdoutSink.deliver(&result).await;
            if !report.is_complete() {
                bail!("{} line(s) could not be written", report.failed.len());
            }
        }
        other => bail!("unknown command `{other}`; {USAGE}"),
    }

    Ok(())
}

/// Acquire every registered shard; returns how many failed.
async fn fetch_shards(cfg: &Config, registry: &ShardRegistry) -> anyhow::Result<usize> {
    let acquirer = Acquirer::new(AcquirerOptions::from_config(cfg))?;
    let outcomes = acquirer.acquire_all(registry.all()).await;
    Ok(summarize(&outcomes))
}

fn summarize(outcomes: &[AcquisitionOutcome]) -> usize {
    let mut failed = 0usize;
    for outcome in outcomes {
        match &outcome.result {
            Ok(state) => info!(
                shard = %outcome.shard,
                path = %outcome.path.display(),
                size = state.size_bytes,
                "shard ready"
            ),
            Err(e) => {
                failed += 1;
                warn!(shard = %outcome.shard, error = %e, "shard unavailable");
            }
        }
    }
    info!(
        total = outcomes.len(),
        failed,
        "shard acquisition finished"
    );
    failed
}
