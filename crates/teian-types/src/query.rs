//! In-memory filtering and sorting over an already-fetched result set.
//!
//! Nothing here touches storage. Admin listings load the full bucket through
//! a repository and then narrow and order it with a [`Query`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::TypeError;
use crate::suggestion::Suggestion;

/// A record the query composer can filter and sort.
pub trait Queryable {
    fn username(&self) -> &str;
    fn created(&self) -> DateTime<Utc>;
    /// The free-text field matched by the `text` filter.
    fn text(&self) -> &str;
}

impl Queryable for Suggestion {
    fn username(&self) -> &str {
        &self.username
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn text(&self) -> &str {
        &self.text
    }
}

impl Queryable for Alias {
    fn username(&self) -> &str {
        &self.username
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn text(&self) -> &str {
        &self.comment
    }
}

/// Listing order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    UsernameAsc,
    UsernameDesc,
    DateAsc,
    /// Newest first.
    #[default]
    DateDesc,
}

impl SortOrder {
    /// Short form used in listing URLs and CLI flags.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UsernameAsc => "ua",
            Self::UsernameDesc => "ud",
            Self::DateAsc => "da",
            Self::DateDesc => "dd",
        }
    }

    /// Like [`FromStr`], but unknown or empty codes fall back to the default.
    pub fn from_code_or_default(code: &str) -> Self {
        code.parse().unwrap_or_default()
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SortOrder {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ua" => Ok(Self::UsernameAsc),
            "ud" => Ok(Self::UsernameDesc),
            "da" => Ok(Self::DateAsc),
            "dd" => Ok(Self::DateDesc),
            other => Err(TypeError::InvalidSortOrder(other.to_string())),
        }
    }
}

/// Keep records whose username contains `username` and whose text contains
/// `text`. Empty filters are skipped.
pub fn filter<T: Queryable>(items: Vec<T>, username: &str, text: &str) -> Vec<T> {
    if username.is_empty() && text.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| username.is_empty() || item.username().contains(username))
        .filter(|item| text.is_empty() || item.text().contains(text))
        .collect()
}

/// Stable sort; ties keep their original relative order.
pub fn sort<T: Queryable>(items: &mut [T], order: SortOrder) {
    match order {
        SortOrder::UsernameAsc => items.sort_by(|a, b| a.username().cmp(b.username())),
        SortOrder::UsernameDesc => items.sort_by(|a, b| b.username().cmp(a.username())),
        SortOrder::DateAsc => items.sort_by_key(|item| item.created()),
        SortOrder::DateDesc => items.sort_by(|a, b| b.created().cmp(&a.created())),
    }
}

/// Filter + sort applied by admin listings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub username: String,
    pub text: String,
    pub order: SortOrder,
}

impl Query {
    pub fn new(username: impl Into<String>, text: impl Into<String>, order: SortOrder) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
            order,
        }
    }

    pub fn apply<T: Queryable>(&self, items: Vec<T>) -> Vec<T> {
        if items.is_empty() {
            return items;
        }
        let mut items = filter(items, &self.username, &self.text);
        if items.len() > 1 {
            sort(&mut items, self.order);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sugg(id: u64, username: &str, text: &str, created: DateTime<Utc>) -> Suggestion {
        Suggestion {
            id,
            username: username.into(),
            text: text.into(),
            created,
        }
    }

    fn ids(items: &[Suggestion]) -> Vec<u64> {
        items.iter().map(|s| s.id).collect()
    }

    #[test]
    fn filter_by_text() {
        let today = Utc::now();
        let yesterday = today - Duration::days(1);
        let out = filter(
            vec![sugg(1, "john", "hello world", yesterday), sugg(2, "john", "foo", today)],
            "",
            "foo",
        );
        assert_eq!(ids(&out), vec![2]);
    }

    #[test]
    fn filter_by_user_and_text_composes() {
        let now = Utc::now();
        let out = filter(
            vec![
                sugg(1, "john", "foo", now),
                sugg(2, "mary", "foo", now),
                sugg(3, "john", "bar", now),
            ],
            "jo",
            "foo",
        );
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn filter_empty_input() {
        let out: Vec<Suggestion> = filter(Vec::new(), "foo", "bar");
        assert!(out.is_empty());
    }

    #[test]
    fn alias_text_filter_matches_comment() {
        let a = Alias {
            id: 1,
            username: "john".into(),
            old: "cat".into(),
            new: "feline".into(),
            comment: "plz add this".into(),
            created: Utc::now(),
            status: Default::default(),
        };
        assert_eq!(filter(vec![a.clone()], "", "plz").len(), 1);
        assert!(filter(vec![a], "", "feline").is_empty());
    }

    #[test]
    fn sort_orders() {
        let t0 = Utc::now();
        let items = vec![
            sugg(1, "mary", "", t0),
            sugg(2, "alice", "", t0 + Duration::seconds(2)),
            sugg(3, "john", "", t0 + Duration::seconds(1)),
        ];

        let mut v = items.clone();
        sort(&mut v, SortOrder::UsernameAsc);
        assert_eq!(ids(&v), vec![2, 3, 1]);

        sort(&mut v, SortOrder::UsernameDesc);
        assert_eq!(ids(&v), vec![1, 3, 2]);

        sort(&mut v, SortOrder::DateAsc);
        assert_eq!(ids(&v), vec![1, 3, 2]);

        sort(&mut v, SortOrder::DateDesc);
        assert_eq!(ids(&v), vec![2, 3, 1]);
    }

    #[test]
    fn sort_is_stable() {
        let t0 = Utc::now();
        let mut v = vec![
            sugg(1, "john", "", t0),
            sugg(2, "amy", "", t0),
            sugg(3, "john", "", t0),
            sugg(4, "amy", "", t0),
        ];
        sort(&mut v, SortOrder::UsernameDesc);
        assert_eq!(ids(&v), vec![1, 3, 2, 4]);
        sort(&mut v, SortOrder::DateDesc);
        assert_eq!(ids(&v), vec![1, 3, 2, 4]);
    }

    #[test]
    fn sort_order_codes() {
        for order in [
            SortOrder::UsernameAsc,
            SortOrder::UsernameDesc,
            SortOrder::DateAsc,
            SortOrder::DateDesc,
        ] {
            assert_eq!(order.code().parse::<SortOrder>().unwrap(), order);
        }
        assert!("xx".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::from_code_or_default(""), SortOrder::DateDesc);
        assert_eq!(SortOrder::from_code_or_default("ua"), SortOrder::UsernameAsc);
    }

    #[test]
    fn query_default_is_newest_first() {
        let t0 = Utc::now();
        let out = Query::default().apply(vec![
            sugg(1, "a", "", t0),
            sugg(2, "b", "", t0 + Duration::seconds(5)),
        ]);
        assert_eq!(ids(&out), vec![2, 1]);
    }

    #[test]
    fn query_single_item_is_still_filtered() {
        let only = vec![sugg(1, "john", "foo", Utc::now())];
        assert!(Query::new("mary", "", SortOrder::DateDesc).apply(only.clone()).is_empty());
        assert_eq!(Query::new("jo", "", SortOrder::UsernameAsc).apply(only.clone()), only);
    }
}
