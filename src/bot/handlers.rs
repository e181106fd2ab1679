//! Command handlers

use crate::allocator::Allocator;
use crate::bot::router::{Context, Handler, Mode};
use crate::bot::{BotError, Reply};
use crate::identity::{Handle, RequesterKey};
use crate::storage::{Claim, MemberAdded, MemberStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const ADDMEMBER_USAGE: &str = "/addmember <tg_handle>";
const GETTOKEN_TARGET_USAGE: &str = "/gettoken <developer_email_or_tg_handle> [<tg_handle_or_email>]";
const GETTOKEN_SELF_USAGE: &str = "/gettoken";

/// `/start`: greeting
pub struct Start {
    mode: Mode,
}

impl Start {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Handler for Start {
    async fn handle(&self, _ctx: &Context<'_>) -> Result<Reply, BotError> {
        let text = match self.mode {
            Mode::Admin => {
                "Welcome! You are authorized to use this bot. \
                 Use /gettoken <email_or_handle> to assign an RPC URL. \
                 Use /addmember <handle> to add a team member."
            }
            Mode::SelfService => "Welcome! Use /gettoken to receive your RPC URL.",
        };
        Ok(Reply::text(text))
    }
}

/// `/addmember <handle>`: extend the membership list
pub struct AddMember {
    members: Arc<dyn MemberStore>,
}

impl AddMember {
    pub fn new(members: Arc<dyn MemberStore>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl Handler for AddMember {
    async fn handle(&self, ctx: &Context<'_>) -> Result<Reply, BotError> {
        let [raw] = ctx.args else {
            return Err(BotError::InvalidArguments { usage: ADDMEMBER_USAGE });
        };

        let handle = Handle::parse(raw)
            .map_err(|_| BotError::InvalidArguments { usage: ADDMEMBER_USAGE })?;

        match self
            .members
            .add_member(&handle)
            .await
            .map_err(BotError::storage("adding user to members"))?
        {
            MemberAdded::Added => {
                info!(member = %handle, added_by = %ctx.caller, "Member added");
                Ok(Reply::text(format!("{} added to members.", handle)))
            }
            MemberAdded::AlreadyMember => Err(BotError::AlreadyExists(handle.to_string())),
        }
    }
}

/// Whose token a `/gettoken` request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPolicy {
    /// The caller names the target (and optionally a secondary label)
    CallerSupplied,
    /// The caller's own handle; no arguments accepted
    CallerIdentity,
}

impl TargetPolicy {
    fn resolve(&self, ctx: &Context<'_>) -> Result<Claim, BotError> {
        match self {
            TargetPolicy::CallerIdentity => {
                if !ctx.args.is_empty() {
                    return Err(BotError::InvalidArguments { usage: GETTOKEN_SELF_USAGE });
                }
                Ok(Claim::new(RequesterKey::Handle(ctx.caller.clone())))
            }
            TargetPolicy::CallerSupplied => {
                let invalid = || BotError::InvalidArguments { usage: GETTOKEN_TARGET_USAGE };

                let (target, secondary) = match ctx.args {
                    [target] => (target, None),
                    [target, secondary] => (target, Some(secondary)),
                    _ => return Err(invalid()),
                };

                let key = RequesterKey::parse(target).map_err(|_| invalid())?;
                let mut claim = Claim::new(key);

                if let Some(raw) = secondary {
                    let secondary = RequesterKey::parse(raw).map_err(|_| invalid())?;
                    // One handle and one email, never two of a kind
                    if secondary.is_handle() == claim.key.is_handle() {
                        return Err(invalid());
                    }
                    claim = claim.with_secondary(secondary);
                }

                Ok(claim)
            }
        }
    }
}

/// `/gettoken`: hand out an RPC URL
pub struct GetToken {
    allocator: Allocator,
    policy: TargetPolicy,
}

impl GetToken {
    pub fn new(allocator: Allocator, policy: TargetPolicy) -> Self {
        Self { allocator, policy }
    }
}

#[async_trait]
impl Handler for GetToken {
    async fn handle(&self, ctx: &Context<'_>) -> Result<Reply, BotError> {
        let claim = self.policy.resolve(ctx)?;

        let token = self
            .allocator
            .request_token(&claim)
            .await
            .map_err(BotError::from_allocation("assigning RPC URL"))?;

        info!(
            requester = %claim.key,
            requested_by = %ctx.caller,
            token_id = token.id,
            "Handed out RPC URL"
        );
        Ok(Reply::text(token.value))
    }
}
