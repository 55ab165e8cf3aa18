//! Alias repository.
//!
//! Each alias is stored on its own under its decimal ID in the `aliases`
//! bucket. Listings and searches scan the whole bucket.

use chrono::Utc;
use teian_types::{Alias, AliasEdit, AliasFilter, AliasPatch, AliasStatus, NewAlias};
use tracing::debug;

use crate::codec::{decode, encode};
use crate::db::{Bucket, Store};
use crate::error::{StoreError, StoreResult};
use crate::traits::AliasStore;

const BUCKET: Bucket = Bucket::ALIASES;

/// [`AliasStore`] backed by a [`Store`].
#[derive(Clone, Debug)]
pub struct AliasRepo {
    store: Store,
}

impl AliasRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Every alias the predicate keeps, highest ID first.
    fn scan(&self, mut keep: impl FnMut(&Alias) -> bool) -> StoreResult<Vec<Alias>> {
        let mut out = self.store.view(|tx| {
            let mut out = Vec::new();
            tx.for_each(BUCKET, |key, bytes| {
                let alias: Alias = decode(bytes).map_err(|e| e.corrupt(BUCKET, key))?;
                if keep(&alias) {
                    out.push(alias);
                }
                Ok(())
            })?;
            Ok(out)
        })?;
        out.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(out)
    }
}

fn not_found(id: u64) -> StoreError {
    StoreError::NotFound {
        bucket: BUCKET.name(),
        key: id.to_string(),
    }
}

impl AliasStore for AliasRepo {
    fn create(&self, draft: &NewAlias) -> StoreResult<Alias> {
        self.store.update(|tx| {
            let id = tx.next_sequence(BUCKET)?;
            let alias = Alias {
                id,
                username: draft.username.clone(),
                old: draft.old.clone(),
                new: draft.new.clone(),
                comment: draft.comment.clone(),
                created: Utc::now(),
                status: AliasStatus::New,
            };
            tx.put(BUCKET, &id.to_string(), &encode(&alias)?)?;
            debug!(id, username = %alias.username, "alias created");
            Ok(alias)
        })
    }

    fn get(&self, id: u64) -> StoreResult<Alias> {
        let key = id.to_string();
        self.store.view(|tx| {
            let bytes = tx.get(BUCKET, &key)?.ok_or_else(|| not_found(id))?;
            decode(&bytes).map_err(|e| e.corrupt(BUCKET, key.as_str()))
        })
    }

    fn update(&self, id: u64, patch: &AliasPatch) -> StoreResult<Alias> {
        let key = id.to_string();
        self.store.update(|tx| {
            let bytes = tx.get(BUCKET, &key)?.ok_or_else(|| not_found(id))?;
            let mut alias: Alias = decode(&bytes).map_err(|e| e.corrupt(BUCKET, key.as_str()))?;
            alias.apply(patch);
            tx.put(BUCKET, &key, &encode(&alias)?)?;
            debug!(id, status = %alias.status, "alias updated");
            Ok(alias)
        })
    }

    fn edit(&self, id: u64, edit: &AliasEdit) -> StoreResult<Alias> {
        let key = id.to_string();
        self.store.update(|tx| {
            let bytes = tx.get(BUCKET, &key)?.ok_or_else(|| not_found(id))?;
            let mut alias: Alias = decode(&bytes).map_err(|e| e.corrupt(BUCKET, key.as_str()))?;
            let patch = edit.merge(&alias);
            patch.validate()?;
            alias.apply(&patch);
            tx.put(BUCKET, &key, &encode(&alias)?)?;
            debug!(id, status = %alias.status, "alias edited");
            Ok(alias)
        })
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        self.store.update(|tx| {
            if !tx.delete(BUCKET, &id.to_string())? {
                return Err(not_found(id));
            }
            debug!(id, "alias deleted");
            Ok(())
        })
    }

    fn delete_all(&self) -> StoreResult<usize> {
        self.store.update(|tx| {
            let removed = tx.clear(BUCKET)?;
            debug!(removed, "all aliases deleted");
            Ok(removed)
        })
    }

    fn all(&self) -> StoreResult<Vec<Alias>> {
        self.scan(|_| true)
    }

    fn of_user(&self, username: &str) -> StoreResult<Vec<Alias>> {
        self.scan(|a| a.username == username)
    }

    fn search(&self, query: &str) -> StoreResult<Vec<Alias>> {
        self.scan(|a| a.old.contains(query) || a.new.contains(query))
    }

    fn search_advanced(&self, filter: &AliasFilter) -> StoreResult<Vec<Alias>> {
        self.scan(|a| filter.matches(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreOptions;

    fn repo() -> AliasRepo {
        AliasRepo::new(Store::in_memory(StoreOptions::default()).unwrap())
    }

    fn ids(aliases: &[Alias]) -> Vec<u64> {
        aliases.iter().map(|a| a.id).collect()
    }

    #[test]
    fn create_then_get() {
        let repo = repo();
        let created = repo
            .create(&NewAlias::new("john", "cat_ears", "nekomimi", "common name"))
            .unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.status, AliasStatus::New);
        assert_eq!(repo.get(1).unwrap(), created);
    }

    #[test]
    fn get_missing_is_not_found() {
        assert!(matches!(repo().get(7), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn update_overwrites_review_fields_only() {
        let repo = repo();
        let created = repo.create(&NewAlias::new("john", "a", "b", "")).unwrap();
        let patch = AliasPatch {
            old: "a2".into(),
            new: "b2".into(),
            comment: "looks good".into(),
            status: AliasStatus::Approved,
        };
        let updated = repo.update(created.id, &patch).unwrap();
        assert_eq!(updated.username, "john");
        assert_eq!(updated.created, created.created);
        assert_eq!(updated.old, "a2");
        assert_eq!(updated.status, AliasStatus::Approved);
        assert_eq!(repo.get(created.id).unwrap(), updated);

        assert!(matches!(
            repo.update(99, &patch),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn edit_merges_against_the_stored_alias() {
        let repo = repo();
        repo.create(&NewAlias::new("john", "cat", "feline", "please")).unwrap();
        // A review lands first; the later status-only edit must keep it.
        repo.update(
            1,
            &AliasPatch {
                old: "cat".into(),
                new: "cat_(animal)".into(),
                comment: "renamed".into(),
                status: AliasStatus::New,
            },
        )
        .unwrap();
        let edited = repo
            .edit(
                1,
                &AliasEdit {
                    status: Some(AliasStatus::Approved),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.new, "cat_(animal)");
        assert_eq!(edited.comment, "renamed");
        assert_eq!(edited.status, AliasStatus::Approved);
        assert_eq!(repo.get(1).unwrap(), edited);
    }

    #[test]
    fn edit_rejects_invalid_tags_and_writes_nothing() {
        let repo = repo();
        let created = repo.create(&NewAlias::new("john", "cat", "feline", "")).unwrap();
        let err = repo
            .edit(
                1,
                &AliasEdit {
                    new: Some("two words".into()),
                    status: Some(AliasStatus::Approved),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(repo.get(1).unwrap(), created);
        assert!(matches!(
            repo.edit(9, &AliasEdit::default()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_and_delete_missing() {
        let repo = repo();
        let a = repo.create(&NewAlias::new("john", "a", "b", "")).unwrap();
        repo.delete(a.id).unwrap();
        assert!(matches!(repo.get(a.id), Err(StoreError::NotFound { .. })));
        // Deleting an ID that is not there is an error, not a silent no-op.
        match repo.delete(a.id).unwrap_err() {
            StoreError::NotFound { bucket, key } => {
                assert_eq!(bucket, "aliases");
                assert_eq!(key, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delete_all_keeps_the_sequence() {
        let repo = repo();
        for _ in 0..3 {
            repo.create(&NewAlias::new("john", "a", "b", "")).unwrap();
        }
        assert_eq!(repo.delete_all().unwrap(), 3);
        assert!(repo.all().unwrap().is_empty());
        assert_eq!(repo.create(&NewAlias::new("john", "a", "b", "")).unwrap().id, 4);
    }

    #[test]
    fn all_is_highest_id_first_past_nine() {
        let repo = repo();
        for i in 0..12 {
            repo.create(&NewAlias::new("john", format!("old{i}"), "new", ""))
                .unwrap();
        }
        assert_eq!(ids(&repo.all().unwrap()), (1..=12).rev().collect::<Vec<_>>());
    }

    #[test]
    fn of_user_is_exact_match() {
        let repo = repo();
        repo.create(&NewAlias::new("bob", "a", "b", "")).unwrap();
        repo.create(&NewAlias::new("bobby", "a", "b", "")).unwrap();
        repo.create(&NewAlias::new("bob", "c", "d", "")).unwrap();
        assert_eq!(ids(&repo.of_user("bob").unwrap()), vec![3, 1]);
    }

    #[test]
    fn search_matches_old_or_new() {
        let repo = repo();
        repo.create(&NewAlias::new("john", "foo_bar", "x", "")).unwrap();
        repo.create(&NewAlias::new("john", "x", "bar_foo", "")).unwrap();
        repo.create(&NewAlias::new("john", "x", "y", "foo in comment")).unwrap();
        assert_eq!(ids(&repo.search("foo").unwrap()), vec![2, 1]);
    }

    #[test]
    fn search_advanced_is_a_conjunction() {
        let repo = repo();
        repo.create(&NewAlias::new("bob", "foo_tag", "bar", "")).unwrap();
        repo.create(&NewAlias::new("alice", "foo_tag", "bar", "")).unwrap();
        repo.create(&NewAlias::new("bob", "baz", "foo", "")).unwrap();

        let filter = AliasFilter {
            old: "foo".into(),
            username: "bob".into(),
            ..Default::default()
        };
        assert_eq!(ids(&repo.search_advanced(&filter).unwrap()), vec![1]);
        assert_eq!(repo.search_advanced(&AliasFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn corrupt_alias_is_reported() {
        let repo = repo();
        repo.create(&NewAlias::new("john", "a", "b", "")).unwrap();
        repo.store
            .update(|tx| tx.put(BUCKET, "1", b"\x00"))
            .unwrap();
        assert!(matches!(repo.get(1), Err(StoreError::CorruptRecord { .. })));
        assert!(matches!(repo.all(), Err(StoreError::CorruptRecord { .. })));
    }

    #[test]
    fn empty_value_is_corrupt_not_missing() {
        let repo = repo();
        repo.store.update(|tx| tx.put(BUCKET, "5", b"")).unwrap();
        assert!(matches!(repo.get(5), Err(StoreError::CorruptRecord { .. })));
    }
}
