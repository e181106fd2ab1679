//! Long-polling update loop

use crate::bot::{command, CommandRouter, Request};
use crate::config::BotConfig;
use crate::telegram::{TelegramClient, TelegramError, Update};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A chat request plus where to send the answer
#[derive(Debug, Clone, PartialEq, Eq)]
struct Inbound {
    chat_id: i64,
    message_id: i64,
    request: Request,
}

/// Pulls updates from Telegram and answers each command on its own task
pub struct Poller {
    client: Arc<TelegramClient>,
    router: Arc<CommandRouter>,
    config: BotConfig,
    bot_username: Option<String>,
}

impl Poller {
    pub fn new(client: Arc<TelegramClient>, router: Arc<CommandRouter>, config: BotConfig) -> Self {
        Self {
            client,
            router,
            config,
            bot_username: None,
        }
    }

    /// Only accept `/command@name` suffixes addressed to this bot
    pub fn bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Poll until `shutdown` resolves, then wait for in-flight replies
    pub async fn run<F>(&self, shutdown: F) -> Result<(), TelegramError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut offset: Option<i64> = None;
        let mut delay = self.config.reconnect_delay;
        let mut tasks = JoinSet::new();

        info!(mode = %self.config.mode, "Polling for updates");

        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    warn!(error = %e, "Request task failed");
                }
            }

            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.client.get_updates(offset, self.config.poll_timeout) => polled,
            };

            match polled {
                Ok(updates) => {
                    delay = self.config.reconnect_delay;

                    for update in updates {
                        offset = Some(update.update_id + 1);

                        if let Some(inbound) = to_inbound(update, self.bot_username.as_deref()) {
                            tasks.spawn(respond(self.client.clone(), self.router.clone(), inbound));
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?delay, "Failed to fetch updates");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = self.config.next_reconnect_delay(delay);
                }
            }
        }

        info!(in_flight = tasks.len(), "Stopping poller");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Request task failed");
            }
        }

        // Confirm the last batch so it is not redelivered on restart
        if offset.is_some() {
            if let Err(e) = self.client.get_updates(offset, Duration::ZERO).await {
                debug!(error = %e, "Failed to acknowledge final updates");
            }
        }

        Ok(())
    }
}

async fn respond(client: Arc<TelegramClient>, router: Arc<CommandRouter>, inbound: Inbound) {
    let reply = router.dispatch(&inbound.request).await;

    if let Err(e) = client
        .send_message(inbound.chat_id, &reply.text, Some(inbound.message_id))
        .await
    {
        warn!(
            chat_id = inbound.chat_id,
            command = %inbound.request.command,
            error = %e,
            "Failed to send reply"
        );
    }
}

/// Turn an update into a request, skipping anything that is not a command
fn to_inbound(update: Update, bot_username: Option<&str>) -> Option<Inbound> {
    let message = update.message?;
    let from = message.from.as_ref();

    if from.is_some_and(|u| u.is_bot) {
        return None;
    }

    let (command, args) = command::parse(message.text.as_deref()?, bot_username)?;

    Some(Inbound {
        chat_id: message.chat.id,
        message_id: message.message_id,
        request: Request {
            requester: from.and_then(|u| u.username.clone()),
            command,
            args,
        },
    })
}
