//! Telegram Bot API client for posting the leaderboard
//!
//! The report is sent with Markdown rendering. If Telegram rejects it (usually a
//! Markdown entity parse error) the error body itself is posted once in HTML
//! mode so the chat still learns the run happened.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::NotifyError;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    Markdown,
    Html,
}

impl ParseMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
        }
    }
}

/// Outcome of a delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Delivery {
    /// The formatted report was accepted
    Sent,
    /// The report was rejected; the rejection text was posted instead
    Fallback,
    /// Both attempts failed, nothing reached the chat
    Lost,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

// The token is a credential: keep it out of debug output
impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn post_message(
        &self,
        text: &str,
        mode: ParseMode,
    ) -> Result<reqwest::Response, reqwest::Error> {
        debug!(chat_id = %self.chat_id, mode = mode.as_str(), len = text.len(), "Posting chat message");
        // The request URL embeds the bot token; strip it from any error
        self.client
            .post(self.send_message_url())
            .query(&message_params(&self.chat_id, text, mode))
            .send()
            .await
            .map_err(reqwest::Error::without_url)
    }

    /// Post `text` to the configured chat, falling back once to the rejection text.
    ///
    /// Only a transport failure on the first attempt is an error; a failed
    /// fallback is logged and reported as [`Delivery::Lost`].
    pub async fn send_report(&self, text: &str) -> Result<Delivery, NotifyError> {
        let resp = self.post_message(text, ParseMode::Markdown).await?;
        if resp.status() == StatusCode::OK {
            info!(chat_id = %self.chat_id, "Report delivered");
            return Ok(Delivery::Sent);
        }

        let status = resp.status();
        let status_line = format!("Telegram rejected the report: HTTP {}", status.as_u16());
        let rejection = match resp.text().await {
            Ok(body) if !body.trim().is_empty() => body,
            Ok(_) => status_line,
            Err(e) => {
                warn!(error = %e.without_url(), "Could not read rejection body");
                status_line
            }
        };
        warn!(status = status.as_u16(), body = %rejection, "Report rejected, sending fallback");

        match self.post_message(&rejection, ParseMode::Html).await {
            Ok(resp) if resp.status() == StatusCode::OK => Ok(Delivery::Fallback),
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "Fallback message rejected, report lost");
                Ok(Delivery::Lost)
            }
            Err(e) => {
                warn!(error = %e, "Fallback message failed, report lost");
                Ok(Delivery::Lost)
            }
        }
    }
}

fn message_params<'a>(chat_id: &'a str, text: &'a str, mode: ParseMode) -> [(&'static str, &'a str); 4] {
    [
        ("chat_id", chat_id),
        ("parse_mode", mode.as_str()),
        ("disable_web_page_preview", "true"),
        ("text", text),
    ]
}
