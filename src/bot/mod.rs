//! Chat command handling
//!
//! The bot consumes a [`Request`] (who asked, which command, what arguments) and
//! produces at most one [`Reply`]. Every failure is turned into a fixed,
//! user-readable reply at the handler boundary; nothing propagates to the
//! transport.

pub mod command;
mod handlers;
mod router;

pub use handlers::{AddMember, GetToken, Start, TargetPolicy};
pub use router::{restricted, CommandRouter, Context, Handler, Mode, Restricted};

use crate::allocator::AllocationError;
use crate::storage::StorageError;
use thiserror::Error;

/// An inbound command from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Transport-level username, if the sender has one
    pub requester: Option<String>,
    /// Command name without the leading `/`, lower case
    pub command: String,
    pub args: Vec<String>,
}

impl Request {
    pub fn new(requester: Option<&str>, command: &str, args: &[&str]) -> Self {
        Self {
            requester: requester.map(str::to_string),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The single text reply to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Why a requester was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The sender has no username to identify them by
    MissingIdentity,
    /// The sender is not on the membership list
    NotMember,
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("not authorized: {0:?}")]
    NotAuthorized(Denial),

    #[error("{0} is already a member")]
    AlreadyExists(String),

    #[error("invalid arguments")]
    InvalidArguments { usage: &'static str },

    #[error("pool exhausted")]
    PoolExhausted,

    #[error("storage error while {action}: {source}")]
    Storage {
        action: &'static str,
        #[source]
        source: StorageError,
    },
}

impl BotError {
    pub fn storage(action: &'static str) -> impl FnOnce(StorageError) -> BotError {
        move |source| BotError::Storage { action, source }
    }

    pub fn from_allocation(action: &'static str) -> impl FnOnce(AllocationError) -> BotError {
        move |err| match err {
            AllocationError::PoolExhausted => BotError::PoolExhausted,
            AllocationError::Storage(source) => BotError::Storage { action, source },
        }
    }

    /// Text shown to the user for this error
    pub fn user_message(&self) -> String {
        match self {
            BotError::NotAuthorized(Denial::MissingIdentity) => {
                "You need to set a Telegram username to use this bot.".to_string()
            }
            BotError::NotAuthorized(Denial::NotMember) => {
                "You are not authorized to use this bot.".to_string()
            }
            BotError::AlreadyExists(name) => format!("{} is already a member.", name),
            BotError::InvalidArguments { usage } => format!("Usage: {}", usage),
            BotError::PoolExhausted => {
                "No RPC URLs available at the moment. Please try again later.".to_string()
            }
            BotError::Storage { action, .. } => format!("Error {}. Please try again.", action),
        }
    }
}
