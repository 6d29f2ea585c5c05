//! In-memory conversation store.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::types::{self, Conversation, ConversationDraft, Upserted};
use crate::store::{ConversationStore, StoreFuture, StoreResult};

/// Conversations keyed by ID, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Conversation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn upsert_now(&self, draft: ConversationDraft) -> Upserted {
        let now = types::now();
        match self.inner.entry(draft.conversation_id.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.user_id = draft.user_id;
                existing.name = draft.name;
                existing.messages = draft.messages;
                existing.updated_at = now;
                Upserted {
                    conversation: existing.clone(),
                    created: false,
                }
            }
            Entry::Vacant(entry) => {
                let conversation = Conversation {
                    conversation_id: draft.conversation_id,
                    user_id: draft.user_id,
                    name: draft.name,
                    messages: draft.messages,
                    created_at: now,
                    updated_at: now,
                };
                entry.insert(conversation.clone());
                Upserted {
                    conversation,
                    created: true,
                }
            }
        }
    }
}

impl ConversationStore for MemoryStore {
    fn list_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> StoreFuture<'a, StoreResult<Option<Vec<Conversation>>>> {
        Box::pin(async move {
            let mut conversations: Vec<Conversation> = self
                .inner
                .iter()
                .filter(|entry| entry.value().user_id == user_id)
                .map(|entry| entry.value().clone())
                .collect();

            if conversations.is_empty() {
                return Ok(None);
            }
            types::sort_for_listing(&mut conversations);
            Ok(Some(conversations))
        })
    }

    fn get<'a>(&'a self, conversation_id: &'a str) -> StoreFuture<'a, StoreResult<Option<Conversation>>> {
        Box::pin(async move { Ok(self.inner.get(conversation_id).map(|c| c.value().clone())) })
    }

    fn upsert(&self, draft: ConversationDraft) -> StoreFuture<'_, StoreResult<Upserted>> {
        Box::pin(async move { Ok(self.upsert_now(draft)) })
    }
}
