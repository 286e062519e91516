use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::ChannelProvider;

pub struct TelegramProvider {
    token: String,
    client: reqwest::Client,
}

impl TelegramProvider {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }
}

/// Telegram wants numeric chat ids as integers; we store them as text.
fn chat_id_value(chat_id: &str) -> Value {
    chat_id
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(chat_id))
}

#[async_trait]
impl ChannelProvider for TelegramProvider {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<Option<String>> {
        let body = json!({
            "chat_id": chat_id_value(chat_id),
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .context("failed to call Telegram sendMessage")?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .context("failed to parse Telegram response")?;

        if !status.is_success() || !data["ok"].as_bool().unwrap_or(false) {
            anyhow::bail!("Telegram sendMessage error ({}): {}", status, data);
        }

        Ok(data["result"]["message_id"].as_i64().map(|id| id.to_string()))
    }

    async fn send_typing(&self, chat_id: &str) -> anyhow::Result<()> {
        let body = json!({
            "chat_id": chat_id_value(chat_id),
            "action": "typing",
        });

        self.client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await
            .context("failed to call Telegram sendChatAction")?
            .error_for_status()
            .context("Telegram sendChatAction returned error")?;

        Ok(())
    }
}
