//! Chat text to command parsing
//!
//! `/gettoken@dispenser_bot alice` -> `("gettoken", ["alice"])`

/// Parse a chat message into a command name and its arguments.
///
/// Returns `None` for plain text and for commands addressed to a different bot
/// (`/start@other_bot`). Command names are lower-cased; arguments are split on
/// whitespace and kept verbatim.
pub fn parse(text: &str, bot_username: Option<&str>) -> Option<(String, Vec<String>)> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;

    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };

    if name.is_empty() {
        return None;
    }

    if let (Some(target), Some(ours)) = (target, bot_username) {
        if !target.eq_ignore_ascii_case(ours) {
            return None;
        }
    }

    Some((
        name.to_ascii_lowercase(),
        parts.map(str::to_string).collect(),
    ))
}
