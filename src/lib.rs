//! Dispenser - a chat bot that hands out RPC endpoint URLs
//!
//! Authorized requesters receive one URL each from a finite pool. Assignments
//! are permanent: asking again returns the same URL, and a URL handed to one
//! requester is never handed to another.

pub mod allocator;
pub mod bot;
pub mod config;
pub mod health;
pub mod identity;
pub mod storage;
pub mod telegram;

pub use allocator::{AllocationError, Allocator};
pub use bot::{BotError, CommandRouter, Mode, Reply, Request};
pub use config::BotConfig;
pub use identity::{Email, Handle, RequesterKey};
pub use storage::{AllocationStore, Claim, MemberStore, MemoryStore, PostgresStore, Token};
