//! Bot API HTTP client

use crate::telegram::{
    ApiResponse, GetUpdates, ReplyParameters, SendMessage, Update, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://api.telegram.org";

/// Slack on top of the long-poll timeout before the HTTP request gives up
const REQUEST_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
}

pub struct TelegramClient {
    http: reqwest::Client,
    /// `{API_BASE}/bot{token}`; contains the credential
    endpoint: String,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        Self::with_base_url(API_BASE, token, poll_timeout)
    }

    /// Point the client at a different Bot API server (e.g. a local one)
    pub fn with_base_url(
        base_url: &str,
        token: &str,
        poll_timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .json(params)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(TelegramError::Api {
                code: error_code,
                description: description.unwrap_or_else(|| format!("{} failed", method)),
            }),
        }
    }

    /// The bot's own account
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdates {
                    offset,
                    timeout: timeout.as_secs(),
                    allowed_updates: &["message"],
                },
            )
            .await?;

        if !updates.is_empty() {
            debug!(count = updates.len(), "Received updates");
        }
        Ok(updates)
    }

    /// Send a text message, optionally as a reply
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id,
                    text,
                    reply_parameters: reply_to.map(|message_id| ReplyParameters {
                        message_id,
                        allow_sending_without_reply: true,
                    }),
                },
            )
            .await?;
        Ok(())
    }
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TelegramClient([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let client =
            TelegramClient::new("123456:SECRET", Duration::from_secs(30)).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("SECRET"));
    }

    #[test]
    fn test_base_url_normalized() {
        let client = TelegramClient::with_base_url(
            "http://localhost:8081/",
            "tok",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.endpoint, "http://localhost:8081/bottok");
    }

    #[test]
    fn test_error_display() {
        let err = TelegramError::Api {
            code: Some(409),
            description: "Conflict: terminated by other getUpdates request".into(),
        };
        assert_eq!(
            err.to_string(),
            "api error Some(409): Conflict: terminated by other getUpdates request"
        );
    }
}
