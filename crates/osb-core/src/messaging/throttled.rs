use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Telegram allows ~30 msg/s overall and ~1 msg/s per chat.
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Hands out evenly spaced send slots.
#[derive(Debug)]
struct SlotClock {
    spacing: Duration,
    next_free: Instant,
}

impl SlotClock {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_free: Instant::now(),
        }
    }

    /// Book the earliest free slot at or after `now`; returns how long to wait for it.
    fn book(&mut self, now: Instant) -> Duration {
        let slot = self.next_free.max(now);
        self.next_free = slot + self.spacing;
        slot - now
    }
}

/// MessagingPort decorator that paces outbound calls.
///
/// A multi-shard search can emit dozens of one-line messages in a burst; pacing
/// them keeps the bot clear of Telegram 429s. Ordering per chat is unchanged.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<SlotClock>,
    chats: Mutex<HashMap<ChatId, SlotClock>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(SlotClock::new(cfg.global_min_interval)),
            chats: Mutex::new(HashMap::new()),
        }
    }

    /// Drop per-chat clocks whose next slot is already free; a fresh clock
    /// books the same way. Returns how many were dropped.
    pub async fn prune_idle(&self, now: Instant) -> usize {
        let mut chats = self.chats.lock().await;
        let before = chats.len();
        chats.retain(|_, clock| clock.next_free > now);
        before - chats.len()
    }

    async fn pace(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = self.global.lock().await.book(now);
        let chat_wait = {
            let mut chats = self.chats.lock().await;
            chats
                .entry(chat_id)
                .or_insert_with(|| SlotClock::new(self.cfg.per_chat_min_interval))
                .book(now)
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.pace(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.pace(chat_id).await;
        self.inner.send_chat_action(chat_id, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;

    struct NullMessenger;

    #[async_trait::async_trait]
    impl MessagingPort for NullMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_chat_actions: false,
                max_message_len: 100,
            }
        }

        async fn send_text(&self, chat_id: ChatId, _text: &str) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn idle_chat_clocks_are_pruned() {
        let throttled = ThrottledMessenger::new(
            Arc::new(NullMessenger),
            ThrottleConfig {
                global_min_interval: Duration::ZERO,
                per_chat_min_interval: Duration::from_millis(200),
            },
        );
        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(2), "b").await.unwrap();

        let now = Instant::now();
        assert_eq!(throttled.prune_idle(now).await, 0);
        assert_eq!(throttled.prune_idle(now + Duration::from_secs(1)).await, 2);
        assert!(throttled.chats.lock().await.is_empty());
    }

    #[test]
    fn slot_clock_spaces_bookings() {
        let start = Instant::now();
        let mut clock = SlotClock::new(Duration::from_millis(100));
        clock.next_free = start;

        assert_eq!(clock.book(start), Duration::ZERO);
        assert_eq!(clock.book(start), Duration::from_millis(100));
        assert_eq!(
            clock.book(start + Duration::from_millis(50)),
            Duration::from_millis(150)
        );
        // A late caller gets an immediate slot.
        assert_eq!(clock.book(start + Duration::from_secs(5)), Duration::ZERO);
    }
}
