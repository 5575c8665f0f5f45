//! Query options for listing models.

use serde::{Deserialize, Serialize};

use crate::auth::{Caller, Permission, has_access};
use crate::types::ModelRecord;

/// Fixed page size for [`ModelFilter::page`].
pub const PAGE_SIZE: usize = 30;

/// Ownership scope of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewOption {
    #[default]
    #[serde(rename = "")]
    All,
    /// Only models the caller owns.
    Created,
    /// Only models owned by someone else.
    Shared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    Name,
    UpdatedAt,
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

/// Filter, sort and page options for [`ModelRegistry::list`](super::ModelRegistry::list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFilter {
    /// Case-insensitive substring of name or id.
    pub query: Option<String>,
    pub view: ViewOption,
    /// Case-insensitive tag name.
    pub tag: Option<String>,
    pub order_by: OrderBy,
    pub direction: Direction,
    /// 1-indexed page of [`PAGE_SIZE`] items. `None` returns everything.
    pub page: Option<usize>,
}

impl ModelFilter {
    /// Whether `record` passes the query, view and tag filters.
    pub fn matches(&self, caller: &Caller, record: &ModelRecord) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            if !record.matches_query(query) {
                return false;
            }
        }

        let owned = caller.owns(&record.user_id);
        match self.view {
            ViewOption::All => {}
            ViewOption::Created if !owned => return false,
            ViewOption::Shared if owned => return false,
            ViewOption::Created | ViewOption::Shared => {}
        }

        match self.tag.as_deref().filter(|t| !t.is_empty()) {
            Some(tag) => record.has_tag(tag),
            None => true,
        }
    }

    /// Sort `records` by the requested key and direction.
    ///
    /// Ties fall back to id so results are stable between calls.
    pub fn sort(&self, records: &mut [ModelRecord]) {
        records.sort_by(|a, b| {
            let ordering = match self.order_by {
                OrderBy::Name => a.name.cmp(&b.name),
                OrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then_with(|| a.id.cmp(&b.id));

            match self.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });
    }

    /// Slice out the requested page. Out-of-range pages are empty.
    pub fn paginate(&self, records: Vec<ModelRecord>) -> Vec<ModelRecord> {
        match self.page {
            None => records,
            Some(page) => {
                let skip = page.max(1).saturating_sub(1).saturating_mul(PAGE_SIZE);
                records.into_iter().skip(skip).take(PAGE_SIZE).collect()
            }
        }
    }
}

/// Non-admins see what they own plus what grants them write access.
pub(crate) fn visible_in_listing(caller: &Caller, record: &ModelRecord) -> bool {
    caller.is_admin()
        || caller.owns(&record.user_id)
        || has_access(caller, record.access_control.as_ref(), Permission::Write)
}

/// Number of pages needed for `total` items.
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessControl, AccessRule, ModelForm};

    fn record(id: &str, owner: &str, created_at: i64) -> ModelRecord {
        ModelRecord::from_form(ModelForm::new(id, id).base("llama3").owner(owner), owner, created_at)
    }

    #[test]
    fn view_option_splits_by_owner() {
        let caller = Caller::user("alice");
        let mine = record("mine", "alice", 1);
        let theirs = record("theirs", "bob", 1);

        let created = ModelFilter {
            view: ViewOption::Created,
            ..Default::default()
        };
        assert!(created.matches(&caller, &mine));
        assert!(!created.matches(&caller, &theirs));

        let shared = ModelFilter {
            view: ViewOption::Shared,
            ..Default::default()
        };
        assert!(!shared.matches(&caller, &mine));
        assert!(shared.matches(&caller, &theirs));
    }

    #[test]
    fn empty_query_and_tag_match_everything() {
        let filter = ModelFilter {
            query: Some(String::new()),
            tag: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.matches(&Caller::user("alice"), &record("m", "bob", 1)));
    }

    #[test]
    fn listing_visibility_uses_write_rule() {
        let caller = Caller::user("alice").with_groups(["eng"]);
        let mut readable = record("readable", "bob", 1);
        readable.access_control = Some(AccessControl {
            read: Some(AccessRule::groups(["eng"])),
            write: None,
        });
        let mut writable = record("writable", "bob", 1);
        writable.access_control = Some(AccessControl {
            read: None,
            write: Some(AccessRule::groups(["eng"])),
        });

        assert!(!visible_in_listing(&caller, &readable));
        assert!(visible_in_listing(&caller, &writable));
        assert!(visible_in_listing(&Caller::admin("root"), &readable));
    }

    #[test]
    fn sort_by_name_ascending() {
        let mut records = vec![record("b", "u", 1), record("c", "u", 1), record("a", "u", 1)];
        let filter = ModelFilter {
            order_by: OrderBy::Name,
            direction: Direction::Asc,
            ..Default::default()
        };
        filter.sort(&mut records);

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(30), 1);
        assert_eq!(page_count(31), 2);
    }

    #[test]
    fn filter_deserializes_wire_names() {
        let filter: ModelFilter = serde_json::from_str(
            r#"{"view": "shared", "order_by": "updated_at", "direction": "asc", "page": 2}"#,
        )
        .unwrap();
        assert_eq!(filter.view, ViewOption::Shared);
        assert_eq!(filter.order_by, OrderBy::UpdatedAt);
        assert_eq!(filter.direction, Direction::Asc);
        assert_eq!(filter.page, Some(2));
    }
}
