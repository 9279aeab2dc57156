use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::{
    domain::ChatId,
    messaging::{port::MessagingPort, types::clamp_message},
    shards::dispatch::SearchResult,
};

/// What happened to each line of a delivered result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// `(line index, error)` for every line that could not be sent.
    pub failed: Vec<(usize, String)>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delivers a search result one line per unit, in order, without retries.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, result: &SearchResult) -> DeliveryReport;
}

/// Sends each line as its own chat message.
pub struct MessengerSink {
    messenger: Arc<dyn MessagingPort>,
    chat_id: ChatId,
}

impl MessengerSink {
    pub fn new(messenger: Arc<dyn MessagingPort>, chat_id: ChatId) -> Self {
        Self { messenger, chat_id }
    }
}

#[async_trait]
impl ResultSink for MessengerSink {
    async fn deliver(&self, result: &SearchResult) -> DeliveryReport {
        let max_len = self.messenger.capabilities().max_message_len;
        let mut report = DeliveryReport::default();

        for (idx, line) in result.render().iter().enumerate() {
            let text = clamp_message(line, max_len);
            match self.messenger.send_text(self.chat_id, &text).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!(chat = self.chat_id.0, line = idx, error = %e, "result line not delivered");
                    report.failed.push((idx, e.to_string()));
                }
            }
        }
        report
    }
}

/// Prints each line to stdout (CLI search).
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl ResultSink for StdoutSink {
    async fn deliver(&self, result: &SearchResult) -> DeliveryReport {
        let mut out = tokio::io::stdout();
        let mut report = DeliveryReport::default();
        for (idx, line) in result.render().iter().enumerate() {
            let written = out.write_all(format!("{line}\n").as_bytes()).await;
            match written {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failed.push((idx, e.to_string())),
            }
        }
        let _ = out.flush().await;
        report
    }
}
