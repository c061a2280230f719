//! Core domain model for the Hacker News mirror.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "hnmirror-core";

/// One of the six fixed upstream listings a story can belong to.
///
/// The variant order of [`Category::ALL`] is the order categories are
/// processed within a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ask,
    Show,
    Job,
    Top,
    Best,
    New,
}

impl Category {
    /// Fixed processing order for one sync cycle.
    pub const ALL: [Category; 6] = [
        Category::Ask,
        Category::Show,
        Category::Job,
        Category::Top,
        Category::Best,
        Category::New,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ask => "ask",
            Category::Show => "show",
            Category::Job => "job",
            Category::Top => "top",
            Category::Best => "best",
            Category::New => "new",
        }
    }

    /// Path segment of the upstream id listing, e.g. `askstories` for
    /// `GET /askstories.json`.
    pub fn listing_endpoint(&self) -> &'static str {
        match self {
            Category::Ask => "askstories",
            Category::Show => "showstories",
            Category::Job => "jobstories",
            Category::Top => "topstories",
            Category::Best => "beststories",
            Category::New => "newstories",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown category `{0}`; expected one of ask, show, job, top, best, new")]
pub struct InvalidCategory(pub String);

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(Category::Ask),
            "show" => Ok(Category::Show),
            "job" => Ok(Category::Job),
            "top" => Ok(Category::Top),
            "best" => Ok(Category::Best),
            "new" => Ok(Category::New),
            other => Err(InvalidCategory(other.to_string())),
        }
    }
}

/// Upstream item type. Not every payload carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Job,
    Story,
    Comment,
    Poll,
    Pollopt,
}

/// Additive category membership flags.
///
/// A flag is only ever turned on; re-syncing an item under another category
/// ORs the new flag in and leaves the others untouched. Serialized in
/// camelCase so stored records and API payloads carry `isTop`, `isAsk`, etc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryFlags {
    pub is_ask: bool,
    pub is_show: bool,
    pub is_job: bool,
    pub is_top: bool,
    pub is_best: bool,
    pub is_new: bool,
}

impl CategoryFlags {
    pub fn only(category: Category) -> Self {
        let mut flags = Self::default();
        flags.set(category);
        flags
    }

    pub fn set(&mut self, category: Category) {
        match category {
            Category::Ask => self.is_ask = true,
            Category::Show => self.is_show = true,
            Category::Job => self.is_job = true,
            Category::Top => self.is_top = true,
            Category::Best => self.is_best = true,
            Category::New => self.is_new = true,
        }
    }

    pub fn contains(&self, category: Category) -> bool {
        match category {
            Category::Ask => self.is_ask,
            Category::Show => self.is_show,
            Category::Job => self.is_job,
            Category::Top => self.is_top,
            Category::Best => self.is_best,
            Category::New => self.is_new,
        }
    }

    /// OR another flag set into this one. Flags accumulate; nothing is
    /// ever cleared.
    pub fn merge(&mut self, other: CategoryFlags) {
        self.is_ask |= other.is_ask;
        self.is_show |= other.is_show;
        self.is_job |= other.is_job;
        self.is_top |= other.is_top;
        self.is_best |= other.is_best;
        self.is_new |= other.is_new;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One unit of mirrored content: story, comment, job, poll or poll option.
///
/// The same struct is both the upstream payload shape (`GET /item/{id}.json`)
/// and the locally served record; category flags are absent upstream and
/// default to false when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Upstream-assigned id, immutable, primary key.
    pub id: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    /// Creation time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descendants: Option<i64>,
    /// Parent item for comments and poll options. Not a foreign key; the
    /// parent may not be mirrored yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    /// Child comment ids in ranked display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kids: Vec<u64>,
    /// Related poll option ids in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(flatten)]
    pub flags: CategoryFlags,
}

impl Item {
    /// Minimal item with the given id; everything else absent/false.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            kind: None,
            by: None,
            time: None,
            text: None,
            url: None,
            title: None,
            score: None,
            descendants: None,
            parent: None,
            kids: Vec::new(),
            parts: Vec::new(),
            deleted: false,
            dead: false,
            flags: CategoryFlags::default(),
        }
    }

    pub fn with_flag(mut self, category: Category) -> Self {
        self.flags.set(category);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn invalid_category_is_rejected_not_coerced() {
        let err = "front".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("front"));
    }

    #[test]
    fn cycle_order_is_fixed() {
        let order: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(order, ["ask", "show", "job", "top", "best", "new"]);
    }

    #[test]
    fn upstream_payload_deserializes_without_flags() {
        let json = r#"{
            "by": "dhouston",
            "descendants": 71,
            "id": 8863,
            "kids": [9224, 8917],
            "score": 104,
            "time": 1175714200,
            "title": "My YC app: Dropbox",
            "type": "story",
            "url": "http://www.getdropbox.com/u/2/screencast.html"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, 8863);
        assert_eq!(item.kind, Some(ItemKind::Story));
        assert_eq!(item.kids, vec![9224, 8917]);
        assert!(item.flags.is_empty());
        assert!(!item.deleted);
    }

    #[test]
    fn tombstoned_payload_keeps_markers() {
        let json = r#"{"id": 192327, "deleted": true, "dead": true, "type": "comment"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(item.deleted);
        assert!(item.dead);
    }

    #[test]
    fn flags_serialize_camel_case() {
        let item = Item::new(1).with_flag(Category::Top);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["isTop"], serde_json::json!(true));
        assert_eq!(value["isBest"], serde_json::json!(false));
    }

    #[test]
    fn flags_accumulate_and_never_clear() {
        let mut flags = CategoryFlags::only(Category::Top);
        flags.merge(CategoryFlags::only(Category::Best));
        assert!(flags.contains(Category::Top));
        assert!(flags.contains(Category::Best));
        flags.merge(CategoryFlags::default());
        assert!(flags.contains(Category::Top));
    }
}
