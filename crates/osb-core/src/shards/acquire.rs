//! Shard acquisition: make each shard's backing file present on local disk.
//!
//! A file that exists with a non-zero size is treated as valid and never
//! re-downloaded. No checksum is verified; presence is the only guarantee.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use regex::Regex;
use tokio::{
    io::{AsyncWriteExt, BufWriter},
    sync::Semaphore,
    task::JoinError,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    errors::{AcquisitionError, AcquisitionErrorKind, Error},
    shards::registry::{ShardDescriptor, ShardId},
    Result,
};

/// Disk write granularity for streamed downloads.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Cookie name prefix the file host uses to hand out a confirmation token for
/// files too large to virus-scan.
const CONFIRM_COOKIE_PREFIX: &str = "download_warning";

/// Stat-derived view of a shard file. The file itself is the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionState {
    /// The file exists and is non-empty.
    pub present: bool,
    pub size_bytes: u64,
}

impl AcquisitionState {
    pub fn probe(path: &Path) -> Self {
        Self::from_len(std::fs::metadata(path).ok().map(|m| m.len()))
    }

    pub async fn probe_async(path: &Path) -> Self {
        Self::from_len(tokio::fs::metadata(path).await.ok().map(|m| m.len()))
    }

    fn from_len(len: Option<u64>) -> Self {
        let size_bytes = len.unwrap_or(0);
        Self {
            present: size_bytes > 0,
            size_bytes,
        }
    }
}

/// Result of one shard in a batch acquisition.
#[derive(Debug)]
pub struct AcquisitionOutcome {
    pub shard: ShardId,
    pub path: PathBuf,
    pub result: std::result::Result<AcquisitionState, AcquisitionError>,
}

#[derive(Clone, Copy, Debug)]
pub struct AcquirerOptions {
    pub connect_timeout: Duration,
    /// Upper bound on the wait for each body chunk.
    pub read_timeout: Duration,
    /// Shards downloaded concurrently by [`Acquirer::acquire_all`].
    pub parallelism: usize,
}

impl AcquirerOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout,
            read_timeout: cfg.read_timeout,
            parallelism: cfg.download_parallelism,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Acquirer {
    http: reqwest::Client,
    opts: AcquirerOptions,
}

impl Acquirer {
    pub fn new(opts: AcquirerOptions) -> Result<Self> {
        // The cookie store carries the host's session cookies into the confirmed request.
        let http = reqwest::Client::builder()
            .connect_timeout(opts.connect_timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { http, opts })
    }

    /// Make sure the shard's file exists locally and is non-empty.
    ///
    /// Returns without any network access when the file already looks valid.
    pub async fn ensure_present(
        &self,
        shard: &ShardDescriptor,
    ) -> std::result::Result<AcquisitionState, AcquisitionError> {
        let state = AcquisitionState::probe_async(&shard.local_path).await;
        if state.present {
            info!(
                shard = %shard.id,
                path = %shard.local_path.display(),
                size = state.size_bytes,
                "shard already present, skipping download"
            );
            return Ok(state);
        }

        info!(
            shard = %shard.id,
            path = %shard.local_path.display(),
            "shard missing or empty, downloading"
        );
        let written = self.download(shard).await?;
        info!(shard = %shard.id, bytes = written, "shard downloaded");

        Ok(AcquisitionState::probe_async(&shard.local_path).await)
    }

    /// Attempt every shard. Outcomes are independent and returned in input order.
    pub async fn acquire_all<'a>(
        &self,
        shards: impl IntoIterator<Item = &'a ShardDescriptor>,
    ) -> Vec<AcquisitionOutcome> {
        let permits = Arc::new(Semaphore::new(self.opts.parallelism.max(1)));
        let mut handles = Vec::new();

        for shard in shards {
            let shard = shard.clone();
            let this = self.clone();
            let permits = permits.clone();
            let id = shard.id;
            let path = shard.local_path.clone();
            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = this.ensure_present(&shard).await;
                AcquisitionOutcome {
                    shard: shard.id,
                    path: shard.local_path,
                    result,
                }
            });
            handles.push((id, path, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, path, handle) in handles {
            let outcome = settle(id, path, handle.await);
            if let Err(e) = &outcome.result {
                warn!(shard = %outcome.shard, error = %e, "shard acquisition failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn download(&self, shard: &ShardDescriptor) -> std::result::Result<u64, AcquisitionError> {
        let first = self.request(shard, None).await?;

        let resp = if let Some(token) = confirm_token_from_cookies(&first) {
            info!(shard = %shard.id, "host requires download confirmation (cookie)");
            self.request(shard, Some(&token)).await?
        } else if is_html(&first) {
            let page = self.read_page(shard, first).await?;
            let Some(token) = confirm_token_from_html(&page) else {
                return Err(AcquisitionError::new(
                    shard.id,
                    AcquisitionErrorKind::Interstitial,
                    "host returned an HTML page without a confirmation token",
                ));
            };
            info!(shard = %shard.id, "host requires download confirmation (page)");
            self.request(shard, Some(&token)).await?
        } else {
            first
        };

        if is_html(&resp) {
            return Err(AcquisitionError::new(
                shard.id,
                AcquisitionErrorKind::Interstitial,
                "host kept returning an HTML page after confirmation",
            ));
        }

        self.save(shard, resp).await
    }

    async fn request(
        &self,
        shard: &ShardDescriptor,
        confirm: Option<&str>,
    ) -> std::result::Result<reqwest::Response, AcquisitionError> {
        let resp = self
            .http
            .get(&shard.remote.base_url)
            .query(&shard.remote.query_params(confirm))
            .send()
            .await
            .map_err(|e| {
                AcquisitionError::new(shard.id, AcquisitionErrorKind::Transport, e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AcquisitionError::new(
                shard.id,
                AcquisitionErrorKind::HttpStatus(status.as_u16()),
                format!("GET {} returned {status}", shard.remote.base_url),
            ));
        }
        Ok(resp)
    }

    async fn read_page(
        &self,
        shard: &ShardDescriptor,
        resp: reqwest::Response,
    ) -> std::result::Result<String, AcquisitionError> {
        match tokio::time::timeout(self.opts.read_timeout, resp.text()).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(AcquisitionError::new(
                shard.id,
                AcquisitionErrorKind::Transport,
                e.to_string(),
            )),
            Err(_) => Err(self.timeout_error(shard)),
        }
    }

    /// Stream the body into `<path>.part` and rename it into place once complete.
    async fn save(
        &self,
        shard: &ShardDescriptor,
        resp: reqwest::Response,
    ) -> std::result::Result<u64, AcquisitionError> {
        let dest = &shard.local_path;
        let part = partial_path(dest);

        match self.stream_body(shard, resp, &part).await {
            Ok(written) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .map_err(|e| io_error(shard.id, &part, e))?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn stream_body(
        &self,
        shard: &ShardDescriptor,
        mut resp: reqwest::Response,
        part: &Path,
    ) -> std::result::Result<u64, AcquisitionError> {
        if let Some(parent) = part.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(shard.id, parent, e))?;
        }

        let file = tokio::fs::File::create(part)
            .await
            .map_err(|e| io_error(shard.id, part, e))?;
        let mut out = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut written = 0u64;

        loop {
            let chunk = tokio::time::timeout(self.opts.read_timeout, resp.chunk())
                .await
                .map_err(|_| self.timeout_error(shard))?
                .map_err(|e| {
                    AcquisitionError::new(shard.id, AcquisitionErrorKind::Transport, e.to_string())
                })?;
            let Some(bytes) = chunk else {
                break;
            };
            out.write_all(&bytes)
                .await
                .map_err(|e| io_error(shard.id, part, e))?;
            written += bytes.len() as u64;
        }

        out.flush().await.map_err(|e| io_error(shard.id, part, e))?;
        out.into_inner()
            .sync_all()
            .await
            .map_err(|e| io_error(shard.id, part, e))?;

        if written == 0 {
            return Err(AcquisitionError::new(
                shard.id,
                AcquisitionErrorKind::Transport,
                "host returned an empty body",
            ));
        }
        Ok(written)
    }

    fn timeout_error(&self, shard: &ShardDescriptor) -> AcquisitionError {
        AcquisitionError::new(
            shard.id,
            AcquisitionErrorKind::Timeout,
            format!("no data within {:?}", self.opts.read_timeout),
        )
    }
}

/// A task that never produced an outcome still counts as a failed shard.
fn settle(
    shard: ShardId,
    path: PathBuf,
    joined: std::result::Result<AcquisitionOutcome, JoinError>,
) -> AcquisitionOutcome {
    joined.unwrap_or_else(|e| AcquisitionOutcome {
        shard,
        path,
        result: Err(AcquisitionError::new(
            shard,
            AcquisitionErrorKind::Aborted,
            e.to_string(),
        )),
    })
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn io_error(shard: ShardId, path: &Path, e: std::io::Error) -> AcquisitionError {
    AcquisitionError::new(
        shard,
        AcquisitionErrorKind::Io,
        format!("{}: {e}", path.display()),
    )
}

fn is_html(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

fn confirm_token_from_cookies(resp: &reqwest::Response) -> Option<String> {
    resp.cookies()
        .find(|c| c.name().starts_with(CONFIRM_COOKIE_PREFIX))
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Pull a confirmation token out of an interstitial page: either a
/// `confirm=<token>` link parameter or a hidden `confirm` form field.
fn confirm_token_from_html(page: &str) -> Option<String> {
    let link = Regex::new(r"[?&;]confirm=([0-9A-Za-z_\-]+)").ok()?;
    if let Some(c) = link.captures(page) {
        return Some(c[1].to_string());
    }

    let field = Regex::new(r#"name="confirm"\s+value="([^"]+)""#).ok()?;
    field.captures(page).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shards::registry::{ExpectedTable, RemoteLocator};
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[derive(Clone)]
    struct Canned {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
        /// Hold the connection open after writing this many body bytes.
        stall_after: Option<usize>,
    }

    impl Canned {
        fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
            Self {
                status: 200,
                headers: vec![("Content-Type", content_type.to_string())],
                body: body.into(),
                stall_after: None,
            }
        }

        fn status(code: u16) -> Self {
            Self {
                status: code,
                headers: vec![("Content-Type", "text/plain".to_string())],
                body: b"nope".to_vec(),
                stall_after: None,
            }
        }

        fn header(mut self, k: &'static str, v: &str) -> Self {
            self.headers.push((k, v.to_string()));
            self
        }
    }

    /// Minimal HTTP/1.1 responder: answers requests with `responses` in order and
    /// records each request line.
    struct FakeHost {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeHost {
        async fn start(responses: Vec<Canned>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let queue = Arc::new(Mutex::new(responses.into_iter()));

            let log = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((mut sock, _)) = listener.accept().await else {
                        return;
                    };
                    let log = log.clone();
                    let queue = queue.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut tmp = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match sock.read(&mut tmp).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                            }
                        }
                        let head = String::from_utf8_lossy(&buf).to_string();
                        let line = head.lines().next().unwrap_or("").to_string();
                        log.lock().unwrap().push(line);

                        let next = queue.lock().unwrap().next();
                        let canned = next.unwrap_or_else(|| Canned::status(410));
                        let mut out = format!(
                            "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n",
                            canned.status,
                            canned.body.len()
                        );
                        for (k, v) in &canned.headers {
                            out.push_str(&format!("{k}: {v}\r\n"));
                        }
                        out.push_str("\r\n");
                        let _ = sock.write_all(out.as_bytes()).await;

                        match canned.stall_after {
                            Some(n) => {
                                let _ = sock.write_all(&canned.body[..n]).await;
                                let _ = sock.flush().await;
                                tokio::time::sleep(Duration::from_secs(5)).await;
                            }
                            None => {
                                let _ = sock.write_all(&canned.body).await;
                            }
                        }
                        let _ = sock.shutdown().await;
                    });
                }
            });

            Self {
                base_url: format!("http://{addr}/uc?export=download"),
                requests,
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn acquirer(read_timeout: Duration) -> Acquirer {
        Acquirer::new(AcquirerOptions {
            connect_timeout: Duration::from_secs(2),
            read_timeout,
            parallelism: 2,
        })
        .unwrap()
    }

    fn shard(dir: &Path, n: u32, base_url: &str, file_id: &str) -> ShardDescriptor {
        ShardDescriptor {
            id: ShardId(n),
            remote: RemoteLocator::new(base_url, file_id),
            local_path: dir.join(format!("data{n}.db")),
            expected_table: ExpectedTable::UsersFts,
        }
    }

    #[tokio::test]
    async fn present_file_skips_network_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![Canned::ok("application/octet-stream", "x")]).await;
        let s = shard(dir.path(), 1, &host.base_url, "f1");
        std::fs::write(&s.local_path, b"already here").unwrap();

        let acq = acquirer(Duration::from_secs(2));
        let a = acq.ensure_present(&s).await.unwrap();
        let b = acq.ensure_present(&s).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.size_bytes, 12);
        assert!(host.requests().is_empty());
    }

    #[tokio::test]
    async fn second_call_after_download_does_not_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![Canned::ok("application/octet-stream", "payload")]).await;
        let s = shard(dir.path(), 1, &host.base_url, "f1");

        let acq = acquirer(Duration::from_secs(2));
        let first = acq.ensure_present(&s).await.unwrap();
        assert!(first.present);
        assert_eq!(first.size_bytes, 7);

        acq.ensure_present(&s).await.unwrap();
        assert_eq!(host.requests().len(), 1);
        assert!(host.requests()[0].contains("id=f1"));
    }

    #[tokio::test]
    async fn zero_length_file_is_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![Canned::ok("application/octet-stream", "fresh")]).await;
        let s = shard(dir.path(), 1, &host.base_url, "f1");
        std::fs::write(&s.local_path, b"").unwrap();

        let state = acquirer(Duration::from_secs(2)).ensure_present(&s).await.unwrap();
        assert_eq!(state.size_bytes, 5);
        assert_eq!(std::fs::read(&s.local_path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn cookie_token_triggers_confirmed_request() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![
            Canned::ok("text/html; charset=utf-8", "<html>too big to scan</html>")
                .header("Set-Cookie", "download_warning_13058876669=Qx7a; Path=/"),
            Canned::ok("application/octet-stream", "SQLite format 3\0"),
        ])
        .await;
        let s = shard(dir.path(), 2, &host.base_url, "big");

        acquirer(Duration::from_secs(2)).ensure_present(&s).await.unwrap();

        let reqs = host.requests();
        assert_eq!(reqs.len(), 2);
        assert!(!reqs[0].contains("confirm="));
        assert!(reqs[1].contains("id=big"));
        assert!(reqs[1].contains("confirm=Qx7a"));
        assert_eq!(std::fs::read(&s.local_path).unwrap(), b"SQLite format 3\0");
    }

    #[tokio::test]
    async fn html_page_token_triggers_confirmed_request() {
        let dir = tempfile::tempdir().unwrap();
        let page = r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=t0K-9&amp;id=big">Download anyway</a>"#;
        let host = FakeHost::start(vec![
            Canned::ok("text/html", page),
            Canned::ok("application/octet-stream", "bytes"),
        ])
        .await;
        let s = shard(dir.path(), 3, &host.base_url, "big");

        acquirer(Duration::from_secs(2)).ensure_present(&s).await.unwrap();
        assert!(host.requests()[1].contains("confirm=t0K-9"));
    }

    #[tokio::test]
    async fn html_without_token_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![Canned::ok("text/html", "<html>quota exceeded</html>")]).await;
        let s = shard(dir.path(), 4, &host.base_url, "f");

        let err = acquirer(Duration::from_secs(2))
            .ensure_present(&s)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AcquisitionErrorKind::Interstitial);
        assert_eq!(err.shard, ShardId(4));
        assert!(!s.local_path.exists());
    }

    #[tokio::test]
    async fn http_error_leaves_path_absent() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::start(vec![Canned::status(404)]).await;
        let s = shard(dir.path(), 5, &host.base_url, "gone");

        let err = acquirer(Duration::from_secs(2))
            .ensure_present(&s)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AcquisitionErrorKind::HttpStatus(404));
        assert!(!s.local_path.exists());
        assert!(!partial_path(&s.local_path).exists());
    }

    #[tokio::test]
    async fn stalled_body_times_out_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut slow = Canned::ok("application/octet-stream", vec![7u8; 4096]);
        slow.stall_after = Some(16);
        let host = FakeHost::start(vec![slow]).await;
        let s = shard(dir.path(), 6, &host.base_url, "slow");

        let err = acquirer(Duration::from_millis(200))
            .ensure_present(&s)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AcquisitionErrorKind::Timeout);
        assert!(!s.local_path.exists());
        assert!(!partial_path(&s.local_path).exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let s = shard(dir.path(), 7, &format!("http://{addr}/uc"), "f");

        let err = acquirer(Duration::from_secs(2))
            .ensure_present(&s)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AcquisitionErrorKind::Transport);
    }

    #[tokio::test]
    async fn large_body_is_streamed_intact() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0..(CHUNK_SIZE * 3 + 123)).map(|i| (i % 251) as u8).collect();
        let host = FakeHost::start(vec![Canned::ok("application/octet-stream", body.clone())]).await;
        let s = shard(dir.path(), 1, &host.base_url, "big");

        let state = acquirer(Duration::from_secs(2)).ensure_present(&s).await.unwrap();
        assert_eq!(state.size_bytes, body.len() as u64);
        assert_eq!(std::fs::read(&s.local_path).unwrap(), body);
    }

    #[tokio::test]
    async fn batch_continues_past_failed_shard() {
        let dir = tempfile::tempdir().unwrap();
        let ok_host = FakeHost::start(vec![
            Canned::ok("application/octet-stream", "one"),
            Canned::ok("application/octet-stream", "three"),
        ])
        .await;
        let bad_host = FakeHost::start(vec![Canned::status(500)]).await;

        let shards = vec![
            shard(dir.path(), 1, &ok_host.base_url, "a"),
            shard(dir.path(), 2, &bad_host.base_url, "b"),
            shard(dir.path(), 3, &ok_host.base_url, "c"),
        ];

        let acq = Acquirer::new(AcquirerOptions {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            parallelism: 1,
        })
        .unwrap();
        let outcomes = acq.acquire_all(&shards).await;

        let order: Vec<ShardId> = outcomes.iter().map(|o| o.shard).collect();
        assert_eq!(order, vec![ShardId(1), ShardId(2), ShardId(3)]);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(
            outcomes[1].result.as_ref().unwrap_err().kind,
            AcquisitionErrorKind::HttpStatus(500)
        );
        assert!(outcomes[2].result.is_ok());
        assert!(shards[2].local_path.exists());
    }

    #[test]
    fn html_token_patterns() {
        assert_eq!(
            confirm_token_from_html("href=\"/uc?export=download&amp;confirm=AbC_1&amp;id=x\""),
            Some("AbC_1".to_string())
        );
        assert_eq!(
            confirm_token_from_html(r#"<input type="hidden" name="confirm" value="t">"#),
            Some("t".to_string())
        );
        assert_eq!(confirm_token_from_html("<p>nothing</p>"), None);
    }

    #[tokio::test]
    async fn aborted_task_is_recorded_as_a_failed_shard() {
        let handle = tokio::spawn(std::future::pending::<AcquisitionOutcome>());
        handle.abort();
        let joined = handle.await;
        assert!(joined.is_err());

        let outcome = settle(ShardId(6), PathBuf::from("d/data6.db"), joined);
        assert_eq!(outcome.shard, ShardId(6));
        assert_eq!(outcome.path, PathBuf::from("d/data6.db"));
        let err = outcome.result.unwrap_err();
        assert_eq!(err.kind, AcquisitionErrorKind::Aborted);
        assert_eq!(err.shard, ShardId(6));
    }

    #[test]
    fn probe_reports_missing_and_empty_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.db");
        assert_eq!(
            AcquisitionState::probe(&p),
            AcquisitionState {
                present: false,
                size_bytes: 0
            }
        );
        std::fs::write(&p, b"").unwrap();
        assert!(!AcquisitionState::probe(&p).present);
        std::fs::write(&p, b"1").unwrap();
        assert!(AcquisitionState::probe(&p).present);
    }
}
