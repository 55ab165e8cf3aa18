//! Persistence for teian suggestions, tag aliases, and upload quotas.
//!
//! Everything lives in one embedded redb file, split into named buckets:
//!
//! - `suggestions` -- username → encoded list of that user's suggestions
//! - `aliases` -- decimal alias ID → encoded alias
//! - `uploadQuota` -- username → bytes uploaded since the last reset
//!
//! # Layers
//!
//! - [`Store`] -- transactional bucket store (`view` / `update`), per-bucket
//!   ID sequences, open-with-retry and explicit close
//! - [`SuggestionRepo`], [`AliasRepo`], [`QuotaLedger`] -- repositories
//!   implementing the [`SuggestionStore`], [`AliasStore`] and [`UploadQuota`]
//!   traits on top of a cloned store handle
//! - [`QuotaResetDriver`] -- tokio task that clears all quotas daily at a
//!   [`DailyAt`] local time
//!
//! # Design Rules
//!
//! 1. Every repository call is one transaction; a failed call writes nothing.
//! 2. Undecodable bytes surface as [`StoreError::CorruptRecord`], never as an
//!    empty result.
//! 3. IDs are allocated inside the creating transaction and never reused.

pub mod alias;
pub mod codec;
pub mod db;
pub mod error;
pub mod quota;
pub mod schedule;
pub mod suggestion;
pub mod traits;

pub use alias::AliasRepo;
pub use codec::CodecError;
pub use db::{Bucket, ReadTx, Store, StoreOptions, WriteTx};
pub use error::{StoreError, StoreResult};
pub use quota::QuotaLedger;
pub use schedule::{Clock, DailyAt, QuotaResetDriver};
pub use suggestion::SuggestionRepo;
pub use traits::{AliasStore, SuggestionStore, UploadQuota};
