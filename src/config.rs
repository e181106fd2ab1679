//! Runtime configuration for the bot

use crate::bot::Mode;
use crate::identity::{Handle, IdentityError};
use std::net::SocketAddr;
use std::time::Duration;

/// Member seeded on startup so a fresh database has someone who can add others
pub const DEFAULT_BOOTSTRAP_MEMBER: &str = "xidea404";

/// Configuration for running the bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot variant
    pub mode: Mode,

    /// Handle inserted into the membership list at startup
    pub bootstrap_member: String,

    /// Long-poll timeout for `getUpdates`
    pub poll_timeout: Duration,

    /// Initial delay before retrying after a transport error
    pub reconnect_delay: Duration,

    /// Maximum delay between retries
    pub max_reconnect_delay: Duration,

    /// Where to serve `/health` and `/stats`, if anywhere
    pub health_bind: Option<SocketAddr>,
}

impl BotConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            bootstrap_member: DEFAULT_BOOTSTRAP_MEMBER.to_string(),
            poll_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            health_bind: None,
        }
    }

    pub fn bootstrap_member(mut self, handle: impl Into<String>) -> Self {
        self.bootstrap_member = handle.into();
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the retry delay range
    pub fn reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    pub fn health_bind(mut self, addr: SocketAddr) -> Self {
        self.health_bind = Some(addr);
        self
    }

    /// The normalized bootstrap handle
    pub fn bootstrap_handle(&self) -> Result<Handle, IdentityError> {
        Handle::parse(&self.bootstrap_member)
    }

    /// Delay to use after `current`, doubling up to the maximum
    pub fn next_reconnect_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_reconnect_delay)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::new(Mode::Admin)
    }
}
