use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::config::Config;

/// Shard number. `0` is the primary (prefix-indexed) shard; full-text shards
/// are numbered from `1` in iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl ShardId {
    pub const PRIMARY: ShardId = ShardId(0);

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_primary() {
            f.write_str("primary")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Which query surface a shard is expected to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedTable {
    /// `users(phone, email, name)` with prefix-friendly indexes.
    Users,
    /// FTS5 virtual table `users_fts(phone, email, name)`.
    UsersFts,
}

impl ExpectedTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::UsersFts => "users_fts",
        }
    }
}

/// Where a shard can be downloaded from: a base URL plus the host's file id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocator {
    pub base_url: String,
    pub file_id: String,
}

impl RemoteLocator {
    pub fn new(base_url: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            file_id: file_id.into(),
        }
    }

    /// Query parameters for a download request, with the confirmation token when
    /// the host demanded one.
    pub fn query_params<'a>(&'a self, confirm: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("id", self.file_id.as_str())];
        if let Some(token) = confirm {
            params.push(("confirm", token));
        }
        params
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardDescriptor {
    pub id: ShardId,
    pub remote: RemoteLocator,
    pub local_path: PathBuf,
    pub expected_table: ExpectedTable,
}

/// Static set of shards known to the process. Read-only after construction.
#[derive(Clone, Debug)]
pub struct ShardRegistry {
    primary: ShardDescriptor,
    fulltext: Vec<ShardDescriptor>,
}

impl ShardRegistry {
    pub fn new(primary: ShardDescriptor, fulltext: Vec<ShardDescriptor>) -> Self {
        Self { primary, fulltext }
    }

    /// `<data_dir>/data.db` for the primary shard, `<data_dir>/data<i>.db` for
    /// full-text shard `i`.
    pub fn from_config(cfg: &Config) -> Self {
        Self::with_layout(
            &cfg.data_dir,
            &cfg.download_url,
            &cfg.primary_file_id,
            &cfg.shard_file_ids,
        )
    }

    pub fn with_layout(
        data_dir: &Path,
        base_url: &str,
        primary_file_id: &str,
        shard_file_ids: &[String],
    ) -> Self {
        let primary = ShardDescriptor {
            id: ShardId::PRIMARY,
            remote: RemoteLocator::new(base_url, primary_file_id),
            local_path: data_dir.join("data.db"),
            expected_table: ExpectedTable::Users,
        };

        let fulltext = shard_file_ids
            .iter()
            .zip(1u32..)
            .map(|(file_id, n)| ShardDescriptor {
                id: ShardId(n),
                remote: RemoteLocator::new(base_url, file_id.as_str()),
                local_path: data_dir.join(format!("data{n}.db")),
                expected_table: ExpectedTable::UsersFts,
            })
            .collect();

        Self { primary, fulltext }
    }

    pub fn primary(&self) -> &ShardDescriptor {
        &self.primary
    }

    /// Full-text shards in stable iteration order.
    pub fn fulltext(&self) -> &[ShardDescriptor] {
        &self.fulltext
    }

    /// Every shard the acquirer should make present: full-text shards first,
    /// then the primary.
    pub fn all(&self) -> impl Iterator<Item = &ShardDescriptor> {
        self.fulltext.iter().chain(std::iter::once(&self.primary))
    }
}
