use std::{fmt, path::PathBuf};

use crate::shards::registry::ShardId;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the core can
/// report failures consistently. Shard-scoped failures have their own types
/// below and never surface through this enum from the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a shard could not be fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionErrorKind {
    /// Connection, TLS or body transfer failure.
    Transport,
    /// The host answered with a non-success status.
    HttpStatus(u16),
    /// The host served an HTML warning page without a usable confirmation token.
    Interstitial,
    /// A body chunk did not arrive within the read timeout.
    Timeout,
    /// Local filesystem failure while writing the shard.
    Io,
    /// The download task panicked or was cancelled.
    Aborted,
}

impl fmt::Display for AcquisitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::HttpStatus(code) => write!(f, "http status {code}"),
            Self::Interstitial => f.write_str("interstitial"),
            Self::Timeout => f.write_str("timeout"),
            Self::Io => f.write_str("io"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Failure to produce a usable local file for one shard.
#[derive(Clone, Debug, thiserror::Error)]
#[error("shard {shard}: acquisition failed ({kind}): {detail}")]
pub struct AcquisitionError {
    pub shard: ShardId,
    pub kind: AcquisitionErrorKind,
    pub detail: String,
}

impl AcquisitionError {
    pub fn new(shard: ShardId, kind: AcquisitionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            shard,
            kind,
            detail: detail.into(),
        }
    }
}

/// Query-time failure for a single shard.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ShardError {
    #[error("shard {shard} unavailable: {path}")]
    Unavailable { shard: ShardId, path: PathBuf },

    #[error("shard {shard} query failed: {detail}")]
    Query { shard: ShardId, detail: String },
}

impl ShardError {
    pub fn shard(&self) -> ShardId {
        match self {
            Self::Unavailable { shard, .. } | Self::Query { shard, .. } => *shard,
        }
    }

    pub fn query(shard: ShardId, e: impl fmt::Display) -> Self {
        Self::Query {
            shard,
            detail: e.to_string(),
        }
    }
}
