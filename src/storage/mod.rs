//! Storage backends for Dispenser
//!
//! - Postgres: durable storage for members and the URL pool
//! - Memory: in-process storage for tests and local trials
//!
//! Both backends implement [`MemberStore`] and [`AllocationStore`]; the bot only
//! ever sees those traits.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};

use crate::identity::{Handle, RequesterKey};
pub use async_trait::async_trait;
use std::time::SystemTime;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("provisioning error: {0}")]
    Provisioning(String),
}

/// Who a token was handed to, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub handle: Option<String>,
    pub email: Option<String>,
    pub assigned_at: SystemTime,
}

/// One distributable pool entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Strictly increasing; defines allocation order
    pub id: i64,
    /// Opaque payload (an RPC URL in practice)
    pub value: String,
    pub assignment: Option<Assignment>,
}

impl Token {
    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }
}

/// The identity a token is being claimed for.
///
/// The primary key fills its own column (`handle` or `email`); the optional
/// secondary label fills the other one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub key: RequesterKey,
    pub secondary: Option<RequesterKey>,
}

impl Claim {
    pub fn new(key: RequesterKey) -> Self {
        Self { key, secondary: None }
    }

    pub fn with_secondary(mut self, secondary: RequesterKey) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Value for the `handle` column
    pub fn handle(&self) -> Option<&str> {
        std::iter::once(&self.key)
            .chain(self.secondary.as_ref())
            .find_map(|k| match k {
                RequesterKey::Handle(h) => Some(h.as_str()),
                RequesterKey::Email(_) => None,
            })
    }

    /// Value for the `email` column
    pub fn email(&self) -> Option<&str> {
        std::iter::once(&self.key)
            .chain(self.secondary.as_ref())
            .find_map(|k| match k {
                RequesterKey::Email(e) => Some(e.as_str()),
                RequesterKey::Handle(_) => None,
            })
    }
}

/// Result of a membership insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAdded {
    Added,
    AlreadyMember,
}

/// Result of a conditional assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The row was unassigned and now belongs to the claim
    Assigned(Token),
    /// The claim key already holds this token; nothing was written
    AlreadyHeld(Token),
    /// The row was already taken (or does not exist); nothing was written
    Conflict,
}

/// Pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub total: u64,
    pub assigned: u64,
}

impl PoolStats {
    pub fn available(&self) -> u64 {
        self.total.saturating_sub(self.assigned)
    }
}

/// Trait for the membership list
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Check whether a handle is a member
    async fn is_member(&self, handle: &Handle) -> Result<bool, StorageError>;

    /// Add a member; the uniqueness constraint decides whether it already existed
    async fn add_member(&self, handle: &Handle) -> Result<MemberAdded, StorageError>;

    /// Number of members
    async fn member_count(&self) -> Result<u64, StorageError>;
}

/// Trait for the token pool
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Earliest token already assigned to this key, if any
    async fn find_assigned(&self, key: &RequesterKey) -> Result<Option<Token>, StorageError>;

    /// Lowest-id unassigned token, or `None` when the pool is exhausted
    async fn next_unassigned(&self) -> Result<Option<Token>, StorageError>;

    /// Assign a token only if it is still unassigned and `claim.key` holds no
    /// other token.
    ///
    /// The holder check and the write are atomic per key, so concurrent claims
    /// for the same key end with one `Assigned` and the rest `AlreadyHeld`.
    /// `handle`, `email` and `assigned_at` are written together; a failed write
    /// leaves the row untouched.
    async fn assign(&self, token_id: i64, claim: &Claim) -> Result<AssignOutcome, StorageError>;

    /// Pool occupancy
    async fn pool_stats(&self) -> Result<PoolStats, StorageError>;
}
