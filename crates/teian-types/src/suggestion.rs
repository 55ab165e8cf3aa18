use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CREATED_FORMAT;

/// Free-text feedback submitted by a user.
///
/// The `id` is unique within the suggestion bucket and is never reused, even
/// after the suggestion is deleted. A suggestion is immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: u64,
    pub username: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl Suggestion {
    /// Creation stamp rendered for humans, e.g. `Mon 02 Jan 2006 15:04:05 UTC`.
    pub fn fmt_created(&self) -> String {
        self.created.format(CREATED_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fmt_created_renders_utc() {
        let s = Suggestion {
            id: 1,
            username: "john".into(),
            text: "more tags please".into(),
            created: Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap(),
        };
        assert_eq!(s.fmt_created(), "Mon 02 Jan 2006 15:04:05 UTC");
    }

    #[test]
    fn serde_json_roundtrip() {
        let s = Suggestion {
            id: 7,
            username: "mary".into(),
            text: "dark theme".into(),
            created: Utc.with_ymd_and_hms(2017, 3, 1, 8, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Suggestion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
