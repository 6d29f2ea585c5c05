//! Conversation handlers.
//!
//! # Responsibilities
//! - Validate path parameters and request bodies
//! - Make exactly one store call per request, bounded by the request deadline
//! - Map store outcomes to HTTP outcomes (200/201/404/500/504)

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::time::Instant;

use crate::http::request::Exchange;
use crate::http::response::ApiError;
use crate::store::{Conversation, ConversationDraft, ConversationStore, Message, StoreResult};

/// Upper bound for identifiers taken from paths and bodies.
pub const MAX_ID_LEN: usize = 128;

/// Handlers for the three conversation operations.
pub struct ConversationHandlers {
    store: Arc<dyn ConversationStore>,
    max_body_bytes: usize,
}

impl ConversationHandlers {
    pub fn new(store: Arc<dyn ConversationStore>, max_body_bytes: usize) -> Self {
        Self {
            store,
            max_body_bytes,
        }
    }

    /// `GET /user/{userId}`: every conversation owned by the user.
    pub async fn list_for_user(&self, exchange: Exchange) -> Result<Json<Vec<Conversation>>, ApiError> {
        let user_id = required_param(&exchange, "userId")?;
        let deadline = exchange.context.deadline();

        match within_deadline(deadline, self.store.list_for_user(&user_id)).await? {
            Some(conversations) => {
                tracing::debug!(user_id = %user_id, count = conversations.len(), "Listed conversations");
                Ok(Json(conversations))
            }
            None => Err(ApiError::NotFound(format!("user `{user_id}` has no conversations"))),
        }
    }

    /// `GET /conversation/{conversationId}`.
    pub async fn get_conversation(&self, exchange: Exchange) -> Result<Json<Conversation>, ApiError> {
        let conversation_id = required_param(&exchange, "conversationId")?;
        let deadline = exchange.context.deadline();

        within_deadline(deadline, self.store.get(&conversation_id))
            .await?
            .map(Json)
            .ok_or_else(|| ApiError::NotFound(format!("conversation `{conversation_id}` not found")))
    }

    /// `POST /conversation`: create or replace a conversation.
    pub async fn update_conversation(
        &self,
        exchange: Exchange,
    ) -> Result<(StatusCode, Json<Conversation>), ApiError> {
        let deadline = exchange.context.deadline();
        let subject = exchange.context.identity().map(|identity| identity.subject.clone());
        let (parts, body) = exchange.request.into_parts();

        let bytes = read_body(&parts.headers, body, self.max_body_bytes, deadline).await?;
        let update: ConversationUpdate = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("invalid conversation body: {e}")))?;
        let draft = update.into_draft()?;

        let upserted = within_deadline(deadline, self.store.upsert(draft)).await?;
        let conversation = upserted.conversation;

        tracing::info!(
            conversation_id = %conversation.conversation_id,
            user_id = %conversation.user_id,
            messages = conversation.messages.len(),
            created = upserted.created,
            subject = subject.as_deref().unwrap_or("anonymous"),
            "Conversation saved"
        );

        let status = if upserted.created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        Ok((status, Json(conversation)))
    }
}

/// Body of `POST /conversation`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationUpdate {
    /// Check the body and turn it into a store draft, assigning an ID if
    /// the client sent none.
    pub fn into_draft(self) -> Result<ConversationDraft, ApiError> {
        let user_id = match self.user_id {
            Some(id) => check_id("userId", id)?,
            None => return Err(ApiError::BadRequest("`userId` is required".to_string())),
        };
        let conversation_id = match self.conversation_id {
            Some(id) => check_id("conversationId", id)?,
            None => uuid::Uuid::new_v4().to_string(),
        };

        for (i, message) in self.messages.iter().enumerate() {
            if message.role.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("messages[{i}].role must not be empty")));
            }
        }

        Ok(ConversationDraft {
            conversation_id,
            user_id,
            name: self.name.unwrap_or_default(),
            messages: self.messages,
        })
    }
}

fn check_id(field: &str, value: String) -> Result<String, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("`{field}` must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "`{field}` exceeds {MAX_ID_LEN} bytes"
        )));
    }
    Ok(value)
}

/// Fetch a path parameter bound by the router and validate it.
fn required_param(exchange: &Exchange, name: &str) -> Result<String, ApiError> {
    match exchange.context.param(name) {
        Some(value) => check_id(name, value.to_string()),
        // Registered pattern and handler disagree on the name.
        None => Err(ApiError::internal(format!("path parameter `{name}` not bound"))),
    }
}

/// Await a store call, giving up at the request deadline.
async fn within_deadline<T, F>(deadline: Instant, call: F) -> Result<T, ApiError>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!("Store call exceeded request deadline");
            Err(ApiError::Timeout)
        }
    }
}

/// Collect the request body, refusing anything over `limit` bytes.
async fn read_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
    deadline: Instant,
) -> Result<Vec<u8>, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    let collect = async {
        let mut stream = body.into_data_stream();
        let mut buf = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
            if buf.len() + chunk.len() > limit {
                return Err(ApiError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    };

    tokio::time::timeout_at(deadline, collect)
        .await
        .map_err(|_| ApiError::Timeout)?
}
