//! Command routing and access control

use crate::allocator::Allocator;
use crate::bot::handlers::{AddMember, GetToken, Start, TargetPolicy};
use crate::bot::{BotError, Denial, Reply, Request};
use crate::identity::Handle;
use crate::storage::MemberStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, error, warn, Instrument};

/// Which bot variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Members hand out tokens on behalf of any handle or email
    Admin,
    /// Anyone with a username claims a token for themselves
    SelfService,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Admin => write!(f, "admin"),
            Mode::SelfService => write!(f, "self-service"),
        }
    }
}

/// What a handler gets to see about the request
#[derive(Debug)]
pub struct Context<'a> {
    /// The sender's normalized handle
    pub caller: &'a Handle,
    pub args: &'a [String],
}

/// A command handler producing exactly one reply
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>) -> Result<Reply, BotError>;
}

/// Middleware that only lets members through to the wrapped handler
pub struct Restricted<H> {
    inner: H,
    members: Arc<dyn MemberStore>,
}

/// Wrap a handler with a membership check
pub fn restricted<H: Handler>(inner: H, members: Arc<dyn MemberStore>) -> Restricted<H> {
    Restricted { inner, members }
}

#[async_trait]
impl<H: Handler> Handler for Restricted<H> {
    async fn handle(&self, ctx: &Context<'_>) -> Result<Reply, BotError> {
        let is_member = self
            .members
            .is_member(ctx.caller)
            .await
            .map_err(BotError::storage("checking membership"))?;

        if !is_member {
            return Err(BotError::NotAuthorized(Denial::NotMember));
        }

        self.inner.handle(ctx).await
    }
}

/// Maps command names to handlers
#[derive(Clone, Default)]
pub struct CommandRouter {
    routes: BTreeMap<String, Arc<dyn Handler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a command name (without the leading `/`)
    pub fn route(mut self, command: &str, handler: impl Handler + 'static) -> Self {
        self.routes
            .insert(command.to_ascii_lowercase(), Arc::new(handler));
        self
    }

    /// The standard command set for a bot variant
    pub fn for_mode(mode: Mode, members: Arc<dyn MemberStore>, allocator: Allocator) -> Self {
        let add_member = restricted(AddMember::new(members.clone()), members.clone());

        match mode {
            Mode::Admin => Self::new()
                .route("start", restricted(Start::new(mode), members.clone()))
                .route("addmember", add_member)
                .route(
                    "gettoken",
                    restricted(
                        GetToken::new(allocator, TargetPolicy::CallerSupplied),
                        members,
                    ),
                ),
            Mode::SelfService => Self::new()
                .route("start", Start::new(mode))
                .route("addmember", add_member)
                .route(
                    "gettoken",
                    GetToken::new(allocator, TargetPolicy::CallerIdentity),
                ),
        }
    }

    /// Registered command names, sorted
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Handle one request, always producing exactly one reply
    pub async fn dispatch(&self, request: &Request) -> Reply {
        let span = debug_span!(
            "command",
            command = %request.command,
            requester = ?request.requester
        );

        async {
            let result = match self.authorize(request) {
                Ok(caller) => match self.routes.get(&request.command.to_ascii_lowercase()) {
                    Some(handler) => {
                        let ctx = Context {
                            caller: &caller,
                            args: &request.args,
                        };
                        handler.handle(&ctx).await
                    }
                    None => Ok(self.unknown_command(&request.command)),
                },
                Err(err) => Err(err),
            };

            match result {
                Ok(reply) => reply,
                Err(err) => {
                    log_error(request, &err);
                    Reply::text(err.user_message())
                }
            }
        }
        .instrument(span)
        .await
    }

    fn authorize(&self, request: &Request) -> Result<Handle, BotError> {
        request
            .requester
            .as_deref()
            .and_then(|name| Handle::parse(name).ok())
            .ok_or(BotError::NotAuthorized(Denial::MissingIdentity))
    }

    fn unknown_command(&self, command: &str) -> Reply {
        let available: Vec<String> = self.commands().map(|c| format!("/{}", c)).collect();
        Reply::text(format!(
            "Unknown command /{}. Available commands: {}",
            command,
            available.join(", ")
        ))
    }
}

fn log_error(request: &Request, err: &BotError) {
    match err {
        BotError::NotAuthorized(denial) => {
            warn!(
                requester = ?request.requester,
                command = %request.command,
                denial = ?denial,
                "Unauthorized access denied"
            );
        }
        BotError::Storage { action, source } => {
            error!(action = %action, error = %source, "Database error");
        }
        other => {
            debug!(error = %other, "Command rejected");
        }
    }
}
