use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::SenderType;
use crate::services::channel::deliver_batch;
use crate::services::orchestrator::{self, TurnBody, TurnInput};
use crate::state::AppState;

const CHANNEL: &str = "telegram";
const HOURLY_MESSAGE_LIMIT: i64 = 30;
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const FALLBACK_REPLY: &str =
    "Desculpe, estou com dificuldades técnicas agora. Pode tentar de novo em instantes?";

// ── Telegram update payload ──

#[derive(Deserialize)]
pub struct TelegramUpdate {
    #[allow(dead_code)]
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub photo: Option<serde_json::Value>,
    pub voice: Option<serde_json::Value>,
    pub audio: Option<serde_json::Value>,
    pub video: Option<serde_json::Value>,
    pub document: Option<serde_json::Value>,
    pub sticker: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramMessage {
    /// Label for the reply when the payload is not text.
    fn media_kind(&self) -> Option<&'static str> {
        if self.photo.is_some() {
            Some("imagem")
        } else if self.voice.is_some() || self.audio.is_some() {
            Some("áudio")
        } else if self.video.is_some() {
            Some("vídeo")
        } else if self.document.is_some() {
            Some("arquivo")
        } else if self.sticker.is_some() {
            Some("figurinha")
        } else {
            None
        }
    }
}

impl TelegramUser {
    fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

/// Telegram redelivers updates that don't get a 200. Failures before the
/// inbound message is stored surface as HTTP errors so the redelivery can
/// succeed; from that point on every outcome acks with 200 and problems
/// become user-facing fallback replies.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<Response, AppError> {
    // 1. Resolve the tenant from the path
    let tenant = {
        let db = state.db.lock().unwrap();
        queries::get_tenant(&db, &tenant_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("tenant {tenant_id}")))?;

    // 2. Verify the webhook secret (tenants without one skip the check)
    if let Some(secret) = tenant
        .telegram_webhook_secret
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != secret {
            tracing::warn!(tenant_id = %tenant.id, "webhook secret mismatch");
            return Err(AppError::Forbidden("invalid webhook secret".to_string()));
        }
    }

    // 3. Only user messages get processed; other update kinds are acked
    let Some(message) = update.message else {
        return Ok(ok_response());
    };
    let Some(from) = &message.from else {
        return Ok(ok_response());
    };
    if from.is_bot {
        tracing::debug!(user_id = from.id, "ignoring message from a bot");
        return Ok(ok_response());
    }

    let chat_id = message.chat.id.to_string();
    let channel_user_id = from.id.to_string();

    // 4. Normalize the payload to text or a media kind
    let body = match message.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => TurnBody::Text(text.to_string()),
        _ => match message.media_kind() {
            Some(kind) => TurnBody::Media(kind.to_string()),
            None => {
                tracing::debug!(chat_id = %chat_id, "update carries no usable content, acking");
                return Ok(ok_response());
            }
        },
    };

    tracing::info!(
        tenant_id = %tenant.id,
        chat_id = %chat_id,
        user_id = %channel_user_id,
        "incoming telegram message"
    );

    // 5. Contact bookkeeping; blocked contacts are dropped silently
    let contact = {
        let db = state.db.lock().unwrap();
        queries::find_or_create_contact(
            &db,
            &tenant.id,
            CHANNEL,
            &channel_user_id,
            from.display_name().as_deref(),
            from.username.as_deref(),
        )?
    };
    if contact.is_blocked() {
        tracing::info!(contact_id = %contact.id, "blocked contact, ignoring");
        return Ok(ok_response());
    }

    // 6. Per-contact rate limit
    let contact_key = format!("{}:{}", tenant.id, channel_user_id);
    let message_count = {
        let db = state.db.lock().unwrap();
        queries::increment_message_count(&db, &contact_key).unwrap_or(1)
    };
    if message_count > HOURLY_MESSAGE_LIMIT {
        tracing::warn!(
            contact_id = %contact.id,
            count = message_count,
            "hourly message limit exceeded, dropping"
        );
        return Ok(ok_response());
    }

    // 7. Persist the inbound message before any processing can fail
    let conversation = {
        let db = state.db.lock().unwrap();
        let conversation =
            queries::find_or_create_conversation(&db, &contact.id, &tenant.id, CHANNEL, &chat_id)?;
        let metadata = match &body {
            TurnBody::Media(kind) => Some(serde_json::json!({ "media": kind }).to_string()),
            TurnBody::Text(_) => None,
        };
        let content = match &body {
            TurnBody::Text(text) => text.clone(),
            TurnBody::Media(kind) => format!("[{kind}]"),
        };
        queries::append_message(
            &db,
            &conversation.id,
            &SenderType::Contact,
            &content,
            Some(&message.message_id.to_string()),
            metadata.as_deref(),
        )?;
        conversation
    };

    // 8. One turn at a time per contact, or two quick messages could both
    // resolve the same pending selection
    let turn_lock = state.turn_locks.for_contact(&tenant.id, &contact.id);
    let _turn = turn_lock.lock().await;

    let input = TurnInput {
        tenant,
        contact,
        conversation,
        body,
    };

    match orchestrator::process_turn(&state, &input).await {
        Ok(reply) => {
            let ids = deliver_batch(state.channel.as_ref(), &chat_id, &reply.messages).await;
            let metadata = serde_json::json!({
                "situation": reply.situation_key,
                "tone": reply.tone.as_str(),
            })
            .to_string();
            let db = state.db.lock().unwrap();
            for (text, id) in reply.messages.iter().zip(ids) {
                if let Err(e) = queries::append_message(
                    &db,
                    &input.conversation.id,
                    &SenderType::Assistant,
                    text,
                    id.as_deref(),
                    Some(&metadata),
                ) {
                    tracing::warn!(error = %e, "failed to persist outbound message");
                }
            }
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                contact_id = %input.contact.id,
                "turn processing failed, sending fallback"
            );
            let _ = state.channel.send_message(&chat_id, FALLBACK_REPLY).await;
            let db = state.db.lock().unwrap();
            let _ = queries::append_message(
                &db,
                &input.conversation.id,
                &SenderType::Assistant,
                FALLBACK_REPLY,
                None,
                Some(r#"{"situation":"turn_failed"}"#),
            );
        }
    }

    // 9. Opportunistic housekeeping
    {
        let db = state.db.lock().unwrap();
        if let Ok(swept) = queries::sweep_expired_pendings(&db) {
            if swept > 0 {
                tracing::debug!(swept, "removed expired pending interactions");
            }
        }
        let _ = queries::cleanup_old_windows(&db);
    }

    Ok(ok_response())
}

fn ok_response() -> Response {
    Json(serde_json::json!({ "ok": true })).into_response()
}
