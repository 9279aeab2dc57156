//! Federated search over the shard set.
//!
//! Every shard query runs on the blocking pool behind a semaphore; results are
//! collected back in shard order, never in completion order. A failing shard
//! turns into exactly one diagnostic line and never affects the others.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::{
    config::Config,
    errors::ShardError,
    shards::{
        registry::{ShardDescriptor, ShardId, ShardRegistry},
        store::{Record, ShardStore},
    },
};

pub const NO_RESULTS: &str = "no results";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// Prefix lookup on the primary shard only.
    Prefix,
    /// Phrase lookup across every full-text shard.
    FullText,
}

impl SearchMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Prefix => "indexed prefix",
            Self::FullText => "FTS5 full-text",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub raw_query: String,
    pub mode: SearchMode,
}

/// Why a shard contributed a diagnostic instead of rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    Unavailable,
    Failed(String),
    TimedOut(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultLine {
    /// A matching row. `shard` is set for multi-shard flows and rendered as a prefix.
    Record {
        shard: Option<ShardId>,
        record: Record,
    },
    Diagnostic {
        shard: ShardId,
        diagnostic: Diagnostic,
    },
    NoResults,
}

impl fmt::Display for ResultLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record {
                shard: Some(id),
                record,
            } => write!(f, "shard {} → {record}", id.0),
            Self::Record {
                shard: None,
                record,
            } => write!(f, "{record}"),
            Self::Diagnostic { shard, diagnostic } => {
                let label = shard_label(*shard);
                match diagnostic {
                    Diagnostic::Unavailable => write!(f, "{label} unavailable"),
                    Diagnostic::Failed(detail) => write!(f, "{label} query failed: {detail}"),
                    Diagnostic::TimedOut(after) => {
                        write!(f, "{label} query timed out after {}s", after.as_secs_f32())
                    }
                }
            }
            Self::NoResults => f.write_str(NO_RESULTS),
        }
    }
}

fn shard_label(id: ShardId) -> String {
    if id.is_primary() {
        "primary shard".to_string()
    } else {
        format!("shard {}", id.0)
    }
}

/// Ordered, capped output of one dispatch. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub lines: Vec<ResultLine>,
}

impl SearchResult {
    pub fn render(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.to_string()).collect()
    }

    pub fn record_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, ResultLine::Record { .. }))
            .count()
    }

    pub fn failed_shards(&self) -> Vec<ShardId> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ResultLine::Diagnostic { shard, .. } => Some(*shard),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchOptions {
    pub mode: SearchMode,
    /// Row cap per shard.
    pub per_shard_limit: usize,
    /// Line cap for single-shard flows.
    pub max_lines: usize,
    pub parallelism: usize,
    pub query_timeout: Duration,
    /// When true, diagnostics alone suppress the "no results" line.
    pub no_results_counts_diagnostics: bool,
}

impl DispatchOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mode: cfg.search_mode,
            per_shard_limit: cfg.per_shard_limit,
            max_lines: cfg.max_lines,
            parallelism: cfg.search_parallelism,
            query_timeout: cfg.query_timeout,
            no_results_counts_diagnostics: cfg.no_results_counts_diagnostics,
        }
    }
}

/// Blocking per-shard query surface the dispatcher fans out over.
pub trait ShardBackend: Send + Sync + 'static {
    fn search(
        &self,
        shard: &ShardDescriptor,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<Record>, ShardError>;
}

impl ShardBackend for ShardStore {
    fn search(
        &self,
        shard: &ShardDescriptor,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<Record>, ShardError> {
        match mode {
            SearchMode::Prefix => self.prefix_search(shard, query, limit),
            SearchMode::FullText => self.fulltext_search(shard, query, limit),
        }
    }
}

pub struct SearchDispatcher {
    registry: Arc<ShardRegistry>,
    backend: Arc<dyn ShardBackend>,
    opts: DispatchOptions,
    permits: Arc<Semaphore>,
}

impl SearchDispatcher {
    pub fn new(registry: Arc<ShardRegistry>, opts: DispatchOptions) -> Self {
        Self::with_backend(registry, opts, Arc::new(ShardStore))
    }

    pub fn with_backend(
        registry: Arc<ShardRegistry>,
        opts: DispatchOptions,
        backend: Arc<dyn ShardBackend>,
    ) -> Self {
        Self {
            registry,
            backend,
            permits: Arc::new(Semaphore::new(opts.parallelism.max(1))),
            opts,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.opts.mode
    }

    /// Build a request in the configured mode.
    pub fn request(&self, raw_query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            raw_query: raw_query.into(),
            mode: self.opts.mode,
        }
    }

    pub async fn dispatch(&self, request: SearchRequest) -> SearchResult {
        let query: Arc<str> = Arc::from(request.raw_query.trim());

        let mut lines = match request.mode {
            SearchMode::Prefix => {
                let shard = self.registry.primary().clone();
                let mut lines = self.collect(vec![shard], query, SearchMode::Prefix).await;
                lines.truncate(self.opts.max_lines);
                lines
            }
            SearchMode::FullText => {
                let shards = self.registry.fulltext().to_vec();
                self.collect(shards, query, SearchMode::FullText).await
            }
        };

        let has_records = lines.iter().any(|l| matches!(l, ResultLine::Record { .. }));
        let suppressed = self.opts.no_results_counts_diagnostics && !lines.is_empty();
        if !has_records && !suppressed {
            lines.push(ResultLine::NoResults);
        }

        SearchResult { lines }
    }

    /// Fan out over `shards`, then fan in their lines in the given order.
    async fn collect(
        &self,
        shards: Vec<ShardDescriptor>,
        query: Arc<str>,
        mode: SearchMode,
    ) -> Vec<ResultLine> {
        // Multi-shard lines name their shard.
        let tag_shard = mode == SearchMode::FullText;

        let mut pending = Vec::with_capacity(shards.len());
        for shard in shards {
            let id = shard.id;
            let handle = tokio::spawn(query_shard(
                self.backend.clone(),
                self.permits.clone(),
                shard,
                query.clone(),
                mode,
                self.opts.per_shard_limit,
                self.opts.query_timeout,
            ));
            pending.push((id, handle));
        }

        let mut lines = Vec::new();
        for (id, handle) in pending {
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(Diagnostic::Failed(format!("search task aborted: {e}"))));
            match outcome {
                Ok(rows) => {
                    debug!(shard = %id, rows = rows.len(), "shard answered");
                    lines.extend(rows.into_iter().map(|record| ResultLine::Record {
                        shard: tag_shard.then_some(id),
                        record,
                    }));
                }
                Err(diagnostic) => {
                    warn!(shard = %id, ?diagnostic, "shard query failed");
                    lines.push(ResultLine::Diagnostic {
                        shard: id,
                        diagnostic,
                    });
                }
            }
        }
        lines
    }
}

async fn query_shard(
    backend: Arc<dyn ShardBackend>,
    permits: Arc<Semaphore>,
    shard: ShardDescriptor,
    query: Arc<str>,
    mode: SearchMode,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Record>, Diagnostic> {
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|e| Diagnostic::Failed(e.to_string()))?;

    // The permit lives as long as the blocking call, even after a timeout gives up on it.
    let job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        backend.search(&shard, &query, mode, limit)
    });

    match tokio::time::timeout(timeout, job).await {
        Err(_) => Err(Diagnostic::TimedOut(timeout)),
        Ok(Err(e)) => Err(Diagnostic::Failed(format!("search worker failed: {e}"))),
        Ok(Ok(Err(ShardError::Unavailable { .. }))) => Err(Diagnostic::Unavailable),
        Ok(Ok(Err(ShardError::Query { detail, .. }))) => Err(Diagnostic::Failed(detail)),
        Ok(Ok(Ok(mut rows))) => {
            rows.truncate(limit);
            Ok(rows)
        }
    }
}
