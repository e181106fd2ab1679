//! Token allocation
//!
//! Hands out pool entries first-created, first-served. A requester who already
//! holds a token gets the same token back; a new requester claims the lowest-id
//! free token. The claim is a conditional write ("only if still unassigned and
//! the requester holds nothing"), and a lost race simply moves on to the next
//! free row.

use crate::storage::{AllocationStore, AssignOutcome, Claim, StorageError, Token};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    #[error("no unassigned tokens left in the pool")]
    PoolExhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Allocates pool tokens to requesters
#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn AllocationStore>,
}

impl Allocator {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self { store }
    }

    /// Return the token already held by `claim.key`, or claim the next free one
    pub async fn request_token(&self, claim: &Claim) -> Result<Token, AllocationError> {
        if let Some(token) = self.store.find_assigned(&claim.key).await? {
            debug!(requester = %claim.key, token_id = token.id, "Returning existing assignment");
            return Ok(token);
        }

        // Every Conflict means some row was permanently consumed, so the pool
        // shrinks on each pass and the loop ends in Assigned or PoolExhausted.
        loop {
            let Some(candidate) = self.store.next_unassigned().await? else {
                warn!(requester = %claim.key, "No unassigned tokens available");
                return Err(AllocationError::PoolExhausted);
            };

            match self.store.assign(candidate.id, claim).await? {
                AssignOutcome::Assigned(token) => {
                    info!(
                        requester = %claim.key,
                        secondary = ?claim.secondary.as_ref().map(|s| s.to_string()),
                        token_id = token.id,
                        "Assigned token"
                    );
                    return Ok(token);
                }
                AssignOutcome::AlreadyHeld(token) => {
                    debug!(
                        requester = %claim.key,
                        token_id = token.id,
                        "Concurrent request already assigned a token"
                    );
                    return Ok(token);
                }
                AssignOutcome::Conflict => {
                    debug!(
                        requester = %claim.key,
                        token_id = candidate.id,
                        "Token claimed concurrently, retrying with next candidate"
                    );
                }
            }
        }
    }
}
