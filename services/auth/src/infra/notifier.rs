use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::domain::repository::CodeNotifier;
use crate::domain::types::Delivery;
use crate::error::DeliveryError;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends login codes through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    code_ttl_minutes: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

impl TelegramNotifier {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        code_ttl_minutes: i64,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("build telegram http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            bot_token: bot_token.into(),
            code_ttl_minutes,
        })
    }
}

impl CodeNotifier for TelegramNotifier {
    async fn send_code(
        &self,
        delivery_address: &str,
        code: &str,
    ) -> Result<Delivery, DeliveryError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        );
        let body = SendMessage {
            chat_id: delivery_address,
            text: login_message(code, self.code_ttl_minutes),
        };

        // The request URL embeds the bot token; keep it out of error strings.
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Delivery::Sent)
    }
}

/// Stand-in used when no bot token is configured: the code only goes to the log.
#[derive(Clone, Copy, Default)]
pub struct LogNotifier;

impl CodeNotifier for LogNotifier {
    async fn send_code(
        &self,
        delivery_address: &str,
        code: &str,
    ) -> Result<Delivery, DeliveryError> {
        tracing::info!(
            chat_id = %delivery_address,
            code = %code,
            "telegram bot token not set, login code logged only"
        );
        Ok(Delivery::Logged)
    }
}

/// Notifier selected at startup from configuration.
#[derive(Clone)]
pub enum AppNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl CodeNotifier for AppNotifier {
    async fn send_code(
        &self,
        delivery_address: &str,
        code: &str,
    ) -> Result<Delivery, DeliveryError> {
        match self {
            Self::Telegram(n) => n.send_code(delivery_address, code).await,
            Self::Log(n) => n.send_code(delivery_address, code).await,
        }
    }
}

pub fn login_message(code: &str, ttl_minutes: i64) -> String {
    format!(
        "🇯🇵 일본 여행 경비 추적기\n\n\
         🔐 로그인 코드: {code}\n\n\
         이 코드를 웹사이트에 입력하여 로그인하세요.\n\n\
         ⏰ 코드는 {ttl_minutes}분 후 만료됩니다.\n\
         🚫 요청하지 않으셨다면 이 메시지를 무시하세요."
    )
}
