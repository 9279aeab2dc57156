use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, shards::dispatch::SearchMode, Result};

pub const DEFAULT_DOWNLOAD_URL: &str = "https://docs.google.com/uc?export=download";

/// Full-text shards, in iteration order (`data1.db` .. `data8.db`).
pub const DEFAULT_SHARD_FILE_IDS: [&str; 8] = [
    "1Tp7iudab37rOCo38clxZo6fLktwky95_",
    "1uPdPWWXtCxObqqbjwLThU6MaWd-6n7W_",
    "1fnLM68dxLI5vvjFXudoUVfO8DTWVjbuT",
    "1BTYgZt4r9bKwz-40TNW_ZUSXW0itU8GG",
    "1thFi5HoJWIITSxHb-Gl2MnX4pnBVSM0a",
    "13Q1VdW1Uz8JBjBT7WJUdjvMlubmq-_4w",
    "15k3vKPmIoQshsg9WOYaMBFZsgq8rDggc",
    "1lsYEZ5iBpsuop0BtsdwqmXbe8lmN5PR9",
];

pub const DEFAULT_PRIMARY_FILE_ID: &str = "1uSMpNJRQJqVziNmVANI7oBG8IyrZguCa";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: Option<String>,
    pub telegram_allowed_users: Vec<i64>,

    // Shard layout
    pub data_dir: PathBuf,
    pub download_url: String,
    pub shard_file_ids: Vec<String>,
    pub primary_file_id: String,

    // Search
    pub search_mode: SearchMode,
    pub per_shard_limit: usize,
    pub max_lines: usize,
    pub search_parallelism: usize,
    pub query_timeout: Duration,
    pub no_results_counts_diagnostics: bool,

    // Acquisition
    pub download_parallelism: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,

    // Sessions
    pub session_ttl: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_allowed_users: Vec::new(),
            data_dir: PathBuf::from("."),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            shard_file_ids: DEFAULT_SHARD_FILE_IDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            primary_file_id: DEFAULT_PRIMARY_FILE_ID.to_string(),
            search_mode: SearchMode::Prefix,
            per_shard_limit: 10,
            max_lines: 20,
            search_parallelism: 4,
            query_timeout: Duration::from_secs(15),
            no_results_counts_diagnostics: true,
            download_parallelism: 2,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            session_ttl: Duration::from_secs(300),
            audit_log_path: PathBuf::from("/tmp/osb-audit.log"),
            audit_log_json: false,
            rate_limit_enabled: true,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let defaults = Self::default();

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| env_str("TOKEN").and_then(non_empty));
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"))?;

        let data_dir = env_path("SHARD_DATA_DIR").unwrap_or(defaults.data_dir);
        let download_url = env_str("SHARD_DOWNLOAD_URL")
            .and_then(non_empty)
            .unwrap_or(defaults.download_url);
        let shard_file_ids =
            parse_csv(env_str("SHARD_FILE_IDS")).unwrap_or(defaults.shard_file_ids);
        let primary_file_id = env_str("PRIMARY_FILE_ID")
            .and_then(non_empty)
            .unwrap_or(defaults.primary_file_id);

        let search_mode = if env_bool("USE_FTS").unwrap_or(false) {
            SearchMode::FullText
        } else {
            SearchMode::Prefix
        };
        let per_shard_limit = env_usize("SEARCH_PER_SHARD_LIMIT")
            .unwrap_or(defaults.per_shard_limit)
            .max(1);
        let max_lines = env_usize("SEARCH_MAX_LINES")
            .unwrap_or(defaults.max_lines)
            .max(1);
        let search_parallelism = env_usize("SEARCH_PARALLELISM")
            .unwrap_or(defaults.search_parallelism)
            .max(1);
        let query_timeout = env_u64("SEARCH_QUERY_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.query_timeout);
        let no_results_counts_diagnostics = env_bool("NO_RESULTS_COUNTS_DIAGNOSTICS")
            .unwrap_or(defaults.no_results_counts_diagnostics);

        let download_parallelism = env_usize("DOWNLOAD_PARALLELISM")
            .unwrap_or(defaults.download_parallelism)
            .max(1);
        let connect_timeout = env_u64("DOWNLOAD_CONNECT_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_timeout);
        let read_timeout = env_u64("DOWNLOAD_READ_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.read_timeout);

        let session_ttl = env_u64("SESSION_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let audit_log_path = env_path("AUDIT_LOG_PATH").unwrap_or(defaults.audit_log_path);
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(defaults.audit_log_json);

        let rate_limit_enabled =
            env_bool("RATE_LIMIT_ENABLED").unwrap_or(defaults.rate_limit_enabled);
        let rate_limit_requests =
            env_u32("RATE_LIMIT_REQUESTS").unwrap_or(defaults.rate_limit_requests);
        let rate_limit_window = env_u64("RATE_LIMIT_WINDOW")
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        if shard_file_ids.is_empty() {
            return Err(Error::Config(
                "SHARD_FILE_IDS must name at least one shard".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            data_dir,
            download_url,
            shard_file_ids,
            primary_file_id,
            search_mode,
            per_shard_limit,
            max_lines,
            search_parallelism,
            query_timeout,
            no_results_counts_diagnostics,
            download_parallelism,
            connect_timeout,
            read_timeout,
            session_ttl,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }

    /// The bot token, or a config error when running without one.
    pub fn require_bot_token(&self) -> Result<&str> {
        self.telegram_bot_token.as_deref().ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }

        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid user id in TELEGRAM_ALLOWED_USERS: {s}")))
        })
        .collect()
}

fn parse_csv(v: Option<String>) -> Option<Vec<String>> {
    let v = v?;
    let out = v
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
