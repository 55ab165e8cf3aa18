use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::CREATED_FORMAT;

/// Review state of an alias proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AliasStatus {
    /// Submitted, not yet reviewed by an admin.
    #[default]
    New,
    /// Accepted by an admin.
    Approved,
    /// Declined by an admin.
    Rejected,
}

impl AliasStatus {
    /// Numeric code used by review forms (`0`, `1`, `2`).
    pub fn code(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Approved => 1,
            Self::Rejected => 2,
        }
    }

    /// Parse from a numeric review code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::New),
            1 => Some(Self::Approved),
            2 => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for AliasStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for AliasStatus {
    type Err = TypeError;

    /// Accepts either the numeric code or the lowercase name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| TypeError::InvalidStatus(s.to_string()));
        }
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(TypeError::InvalidStatus(s.to_string())),
        }
    }
}

/// A proposed tag rename (`old` → `new`) awaiting admin review.
///
/// `id`, `username` and `created` are fixed at creation. `old`, `new`,
/// `comment` and `status` may be rewritten by a review via [`AliasPatch`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: u64,
    pub username: String,
    pub old: String,
    pub new: String,
    pub comment: String,
    pub created: DateTime<Utc>,
    pub status: AliasStatus,
}

impl Alias {
    /// Overwrite the mutable fields from a review patch.
    pub fn apply(&mut self, patch: &AliasPatch) {
        self.old.clone_from(&patch.old);
        self.new.clone_from(&patch.new);
        self.comment.clone_from(&patch.comment);
        self.status = patch.status;
    }

    pub fn fmt_created(&self) -> String {
        self.created.format(CREATED_FORMAT).to_string()
    }
}

/// Caller-supplied fields for a new alias. The store assigns the rest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlias {
    pub username: String,
    pub old: String,
    pub new: String,
    pub comment: String,
}

impl NewAlias {
    pub fn new(
        username: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            old: old.into(),
            new: new.into(),
            comment: comment.into(),
        }
    }

    /// Both tags must be non-blank and free of spaces.
    ///
    /// The store itself accepts anything; this is for submission front-ends.
    pub fn validate(&self) -> Result<(), TypeError> {
        validate_tag("old", &self.old)?;
        validate_tag("new", &self.new)
    }
}

/// Review update for an existing alias.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasPatch {
    pub old: String,
    pub new: String,
    pub comment: String,
    pub status: AliasStatus,
}

impl AliasPatch {
    pub fn validate(&self) -> Result<(), TypeError> {
        validate_tag("old", &self.old)?;
        validate_tag("new", &self.new)
    }
}

/// Partial review: only the given fields change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEdit {
    pub old: Option<String>,
    pub new: Option<String>,
    pub comment: Option<String>,
    pub status: Option<AliasStatus>,
}

impl AliasEdit {
    /// Full patch for `current`, keeping every field this edit leaves out.
    pub fn merge(&self, current: &Alias) -> AliasPatch {
        AliasPatch {
            old: self.old.clone().unwrap_or_else(|| current.old.clone()),
            new: self.new.clone().unwrap_or_else(|| current.new.clone()),
            comment: self.comment.clone().unwrap_or_else(|| current.comment.clone()),
            status: self.status.unwrap_or(current.status),
        }
    }
}

fn validate_tag(field: &'static str, value: &str) -> Result<(), TypeError> {
    if value.trim().is_empty() {
        return Err(TypeError::EmptyTag { field });
    }
    if value.contains(' ') {
        return Err(TypeError::TagContainsSpace {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Multi-field alias search.
///
/// An alias matches when every non-empty field is a substring of the
/// corresponding alias field. With every field empty, everything matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasFilter {
    pub old: String,
    pub new: String,
    pub username: String,
    pub comment: String,
}

impl AliasFilter {
    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
            && self.new.is_empty()
            && self.username.is_empty()
            && self.comment.is_empty()
    }

    pub fn matches(&self, alias: &Alias) -> bool {
        [
            (&self.old, &alias.old),
            (&self.new, &alias.new),
            (&self.username, &alias.username),
            (&self.comment, &alias.comment),
        ]
        .into_iter()
        .all(|(needle, haystack)| needle.is_empty() || haystack.contains(needle.as_str()))
    }
}
