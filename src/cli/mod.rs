//! Operator command line

mod commands;

pub use commands::{Cli, Commands, MemberCommands, ServeArgs};
