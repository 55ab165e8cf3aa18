use teian_types::{Alias, AliasEdit, AliasFilter, AliasPatch, NewAlias, Suggestion};

use crate::error::StoreResult;

/// Per-user suggestion lists.
///
/// Every method runs in its own transaction. Reads never observe a
/// half-applied write.
pub trait SuggestionStore: Send + Sync {
    /// Append a new suggestion for `username`.
    ///
    /// The text is stored as given; empty text is accepted.
    fn create(&self, username: &str, text: &str) -> StoreResult<Suggestion>;

    /// The user's suggestions in insertion order. Empty when the user never
    /// submitted one.
    fn of_user(&self, username: &str) -> StoreResult<Vec<Suggestion>>;

    /// Every suggestion, grouped by username in ascending username order.
    fn all(&self) -> StoreResult<Vec<Suggestion>>;

    /// Remove the suggestion `id` from the user's list.
    ///
    /// Returns `NotFound` if the user has no suggestion with that ID.
    fn delete(&self, username: &str, id: u64) -> StoreResult<()>;
}

/// Tag alias proposals, keyed by ID.
pub trait AliasStore: Send + Sync {
    /// Store a new proposal with a fresh ID, the current time and status
    /// `New`.
    fn create(&self, alias: &NewAlias) -> StoreResult<Alias>;

    fn get(&self, id: u64) -> StoreResult<Alias>;

    /// Apply an admin review. `id`, `username` and `created` are kept.
    fn update(&self, id: u64, patch: &AliasPatch) -> StoreResult<Alias>;

    /// Apply a partial review. The merge with the stored alias happens in
    /// the same transaction as the write. Merged tags must be non-blank and
    /// free of spaces.
    fn edit(&self, id: u64, edit: &AliasEdit) -> StoreResult<Alias>;

    fn delete(&self, id: u64) -> StoreResult<()>;

    /// Remove every alias. Returns how many were removed. IDs are not reused
    /// afterwards.
    fn delete_all(&self) -> StoreResult<usize>;

    /// Every alias, highest ID first.
    fn all(&self) -> StoreResult<Vec<Alias>>;

    fn of_user(&self, username: &str) -> StoreResult<Vec<Alias>>;

    /// Aliases whose `old` or `new` tag contains `query`.
    fn search(&self, query: &str) -> StoreResult<Vec<Alias>>;

    /// Aliases matching every non-empty field of `filter`.
    fn search_advanced(&self, filter: &AliasFilter) -> StoreResult<Vec<Alias>>;
}

/// Per-user upload byte budget, refilled by [`reset_all`](UploadQuota::reset_all).
pub trait UploadQuota: Send + Sync {
    /// Bytes each user may upload between resets.
    fn cap(&self) -> u64;

    /// Record `bytes` against the user's budget and return what remains.
    ///
    /// A charge that would exceed the cap fails with `OverQuota` and records
    /// nothing.
    fn charge(&self, username: &str, bytes: u64) -> StoreResult<u64>;

    /// Bytes charged since the last reset.
    fn usage(&self, username: &str) -> StoreResult<u64>;

    /// Forget every user's usage. Returns how many users were cleared.
    fn reset_all(&self) -> StoreResult<usize>;
}
