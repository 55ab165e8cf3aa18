//! Suggestion repository.
//!
//! Suggestions are stored as one encoded list per username in the
//! `suggestions` bucket. IDs come from the bucket's sequence, so they are
//! unique across all users.

use chrono::Utc;
use teian_types::Suggestion;
use tracing::debug;

use crate::codec::{decode_list, encode};
use crate::db::{Bucket, Store, WriteTx};
use crate::error::{StoreError, StoreResult};
use crate::traits::SuggestionStore;

const BUCKET: Bucket = Bucket::SUGGESTIONS;

/// [`SuggestionStore`] backed by a [`Store`].
#[derive(Clone, Debug)]
pub struct SuggestionRepo {
    store: Store,
}

impl SuggestionRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

fn load(bytes: Option<Vec<u8>>, username: &str) -> StoreResult<Vec<Suggestion>> {
    decode_list(&bytes.unwrap_or_default()).map_err(|e| e.corrupt(BUCKET, username))
}

fn save(tx: &mut WriteTx, username: &str, list: &[Suggestion]) -> StoreResult<()> {
    tx.put(BUCKET, username, &encode(list)?)
}

impl SuggestionStore for SuggestionRepo {
    fn create(&self, username: &str, text: &str) -> StoreResult<Suggestion> {
        self.store.update(|tx| {
            let id = tx.next_sequence(BUCKET)?;
            let mut list = load(tx.get(BUCKET, username)?, username)?;
            let suggestion = Suggestion {
                id,
                username: username.to_string(),
                text: text.to_string(),
                created: Utc::now(),
            };
            list.push(suggestion.clone());
            save(tx, username, &list)?;
            debug!(username, id, "suggestion created");
            Ok(suggestion)
        })
    }

    fn of_user(&self, username: &str) -> StoreResult<Vec<Suggestion>> {
        self.store
            .view(|tx| load(tx.get(BUCKET, username)?, username))
    }

    fn all(&self) -> StoreResult<Vec<Suggestion>> {
        self.store.view(|tx| {
            let mut out = Vec::new();
            tx.for_each(BUCKET, |username, bytes| {
                let list: Vec<Suggestion> =
                    decode_list(bytes).map_err(|e| e.corrupt(BUCKET, username))?;
                out.extend(list);
                Ok(())
            })?;
            Ok(out)
        })
    }

    fn delete(&self, username: &str, id: u64) -> StoreResult<()> {
        self.store.update(|tx| {
            let mut list = load(tx.get(BUCKET, username)?, username)?;
            list.sort_by_key(|s| s.id);
            let idx = list
                .binary_search_by_key(&id, |s| s.id)
                .map_err(|_| StoreError::NotFound {
                    bucket: BUCKET.name(),
                    key: format!("{username}/{id}"),
                })?;
            list.remove(idx);
            save(tx, username, &list)?;
            debug!(username, id, remaining = list.len(), "suggestion deleted");
            Ok(())
        })
    }
}
