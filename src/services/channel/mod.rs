pub mod telegram;

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Returns the channel's message id when the API reports one.
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<Option<String>>;

    async fn send_typing(&self, chat_id: &str) -> anyhow::Result<()>;
}

pub const BASE_DELAY_MS: u64 = 400;
pub const PER_CHAR_MS: u64 = 12;
pub const MAX_EXTRA_DELAY_MS: u64 = 1500;

/// Reading-time pacing before a follow-up chunk: a fixed base plus a
/// per-character component, capped so long messages don't stall the chat.
pub fn pacing_delay_ms(text_chars: usize) -> u64 {
    BASE_DELAY_MS + (text_chars as u64 * PER_CHAR_MS).min(MAX_EXTRA_DELAY_MS)
}

/// Sends chunks in order. Before each chunk after the first, shows the
/// typing indicator and waits the pacing delay. A failed send is logged
/// and skipped; later chunks still go out.
pub async fn deliver_batch(
    channel: &dyn ChannelProvider,
    chat_id: &str,
    messages: &[String],
) -> Vec<Option<String>> {
    let mut ids = Vec::with_capacity(messages.len());

    for (i, text) in messages.iter().enumerate() {
        if i > 0 {
            if let Err(e) = channel.send_typing(chat_id).await {
                tracing::debug!(error = %e, "typing indicator failed");
            }
            tokio::time::sleep(Duration::from_millis(pacing_delay_ms(text.chars().count()))).await;
        }

        match channel.send_message(chat_id, text).await {
            Ok(id) => ids.push(id),
            Err(e) => {
                tracing::warn!(error = %e, chunk = i, "failed to send message chunk");
                ids.push(None);
            }
        }
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_delay_base() {
        assert_eq!(pacing_delay_ms(0), BASE_DELAY_MS);
    }

    #[test]
    fn test_pacing_delay_grows_with_length() {
        assert_eq!(pacing_delay_ms(10), BASE_DELAY_MS + 10 * PER_CHAR_MS);
        assert!(pacing_delay_ms(100) > pacing_delay_ms(10));
    }

    #[test]
    fn test_pacing_delay_is_capped() {
        assert_eq!(pacing_delay_ms(10_000), BASE_DELAY_MS + MAX_EXTRA_DELAY_MS);
    }
}
