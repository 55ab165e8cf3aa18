//! Domain types for teian.
//!
//! teian lets users of a shimmie image-board submit free-text suggestions and
//! tag-alias proposals, and lets admins review them. This crate holds the
//! records themselves plus the pure, in-memory query composer that admins use
//! to filter and sort a fetched result set. Persistence lives in
//! `teian-store`.
//!
//! # Key Types
//!
//! - [`Suggestion`] -- free-text feedback owned by a username
//! - [`Alias`] -- a proposed `old` → `new` tag rename and its review [`AliasStatus`]
//! - [`AliasFilter`] -- multi-field substring search over aliases
//! - [`Query`] -- filter + stable sort over any [`Queryable`] record

pub mod alias;
pub mod error;
pub mod query;
pub mod suggestion;

pub use alias::{Alias, AliasEdit, AliasFilter, AliasPatch, AliasStatus, NewAlias};
pub use error::TypeError;
pub use query::{Query, Queryable, SortOrder};
pub use suggestion::Suggestion;

/// Display format used for creation stamps, always rendered in UTC.
pub const CREATED_FORMAT: &str = "%a %d %b %Y %H:%M:%S UTC";
