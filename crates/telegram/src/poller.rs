use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use common::cancel::sleep_or_stop;
use common::{notify_best_effort, CommandToggle, Error, Notifier, Result};

use crate::commands::CommandHandler;

/// Server-side wait of one long-poll request.
pub const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(10);

const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// One received update, reduced to what command dispatch needs.
/// Non-message updates carry no chat or text but still move the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}

/// Where updates come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Updates with id >= `offset`, waiting up to `timeout` for new ones.
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<InboundUpdate>>;
}

/// Long-polls the Bot API `getUpdates` method.
pub struct TelegramUpdates {
    bot: Bot,
}

impl TelegramUpdates {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdates {
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<InboundUpdate>> {
        let offset = i32::try_from(offset)
            .map_err(|_| Error::Telegram(format!("update offset {offset} out of range")))?;
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout.as_secs() as u32)
            .await
            .map_err(|e| Error::Telegram(format!("getUpdates failed: {e}")))?;

        Ok(updates
            .into_iter()
            .map(|update| {
                let message = match &update.kind {
                    UpdateKind::Message(m) | UpdateKind::EditedMessage(m) => Some(m),
                    _ => None,
                };
                InboundUpdate {
                    update_id: i64::from(update.id),
                    chat_id: message.map(|m| m.chat.id.0),
                    text: message.and_then(|m| m.text()).map(str::to_string),
                }
            })
            .collect())
    }
}

/// Background loop that turns chat messages into runtime commands.
///
/// Only chats in `allowed_chat_ids` are served; an empty list serves nobody.
/// Only texts starting with `/` are treated as commands. While disabled,
/// updates are still consumed so that re-enabling does not replay a backlog.
pub struct CommandPoller {
    source: Arc<dyn UpdateSource>,
    handler: CommandHandler,
    notifier: Arc<dyn Notifier>,
    allowed_chat_ids: Vec<i64>,
    poll_interval: Duration,
    enabled: AtomicBool,
    /// Next update id to request.
    offset: AtomicI64,
    stop_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandPoller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: CommandHandler,
        notifier: Arc<dyn Notifier>,
        allowed_chat_ids: Vec<i64>,
        poll_interval: Duration,
        enabled: bool,
    ) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            source,
            handler,
            notifier,
            allowed_chat_ids,
            poll_interval,
            enabled: AtomicBool::new(enabled),
            offset: AtomicI64::new(0),
            stop_tx,
            worker: Mutex::new(None),
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. Returns `false` if it is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        self.stop_tx.send_replace(false);
        let stop_rx = self.stop_tx.subscribe();
        *worker = Some(tokio::spawn(Arc::clone(self).run(stop_rx)));
        info!(chats = ?self.allowed_chat_ids, enabled = self.is_enabled(), "Command poller started");
        true
    }

    /// Signal the loop and wait briefly for it. Interrupts a pending fetch.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(JOIN_TIMEOUT, handle).await.is_err() {
                warn!("Command poller did not exit in time, detaching");
            } else {
                info!("Command poller stopped");
            }
        }
    }

    /// Fetch one batch without waiting and dispatch it.
    /// Returns the number of commands answered.
    pub async fn poll_once(&self) -> Result<usize> {
        let updates = self.source.fetch(self.offset(), Duration::ZERO).await?;
        Ok(self.dispatch(updates).await)
    }

    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            // Only the fetch is raced against stop; a command already
            // received is always carried out.
            let fetched = tokio::select! {
                r = self.source.fetch(self.offset(), LONG_POLL_TIMEOUT) => r,
                _ = stop_rx.wait_for(|stop| *stop) => break,
            };
            match fetched {
                Ok(updates) => {
                    self.dispatch(updates).await;
                }
                Err(e) => warn!(error = %e, "Polling for commands failed"),
            }

            if sleep_or_stop(&mut stop_rx, self.poll_interval).await {
                break;
            }
        }
        debug!("Command poller loop exited");
    }

    async fn dispatch(&self, updates: Vec<InboundUpdate>) -> usize {
        let mut answered = 0;
        for update in updates {
            self.offset.fetch_max(update.update_id + 1, Ordering::SeqCst);

            let (Some(chat_id), Some(text)) = (update.chat_id, update.text.as_deref()) else {
                continue;
            };
            if !self.allowed_chat_ids.contains(&chat_id) {
                debug!(chat_id, "Ignoring message from unlisted chat");
                continue;
            }
            let text = text.trim();
            if !text.starts_with('/') {
                continue;
            }
            if !self.is_enabled() {
                debug!(chat_id, "Commands disabled, ignoring");
                continue;
            }

            let reply = self.handler.handle(text).await;
            notify_best_effort(self.notifier.as_ref(), &reply).await;
            answered += 1;
        }
        answered
    }
}

impl CommandToggle for CommandPoller {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!(enabled, "Chat commands toggled");
        }
    }
}
