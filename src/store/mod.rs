//! Data access for conversations.
//!
//! # Data Flow
//! ```text
//! handlers
//!     → ConversationStore (trait object, injected at startup)
//!         → MemoryStore  (dashmap, process lifetime)
//!         → SqliteStore  (tokio-rusqlite, one background connection)
//! ```
//!
//! # Design Decisions
//! - The store is the only shared mutable resource; handlers hold no locks
//! - Upserts are last-write-wins per conversation ID
//! - `updatedAt` is assigned by the store, `createdAt` is kept on update
//! - A user is known once they own at least one conversation

pub mod memory;
pub mod sqlite;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{Conversation, ConversationDraft, Message, Upserted};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("failed to encode or decode messages: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("corrupt record `{id}`: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow persistence interface used by the handlers.
pub trait ConversationStore: Send + Sync {
    /// All conversations of `user_id`, or `None` when the user is unknown.
    fn list_for_user<'a>(&'a self, user_id: &'a str)
        -> StoreFuture<'a, StoreResult<Option<Vec<Conversation>>>>;

    /// A single conversation by ID.
    fn get<'a>(&'a self, conversation_id: &'a str)
        -> StoreFuture<'a, StoreResult<Option<Conversation>>>;

    /// Insert a new conversation or replace an existing one.
    fn upsert(&self, draft: ConversationDraft) -> StoreFuture<'_, StoreResult<Upserted>>;
}

/// Open the backend selected in configuration.
pub async fn open(config: &StoreConfig) -> StoreResult<Arc<dyn ConversationStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory conversation store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            tracing::info!(path = %config.sqlite_path.display(), "Opening SQLite conversation store");
            Ok(Arc::new(SqliteStore::open(&config.sqlite_path).await?))
        }
    }
}
