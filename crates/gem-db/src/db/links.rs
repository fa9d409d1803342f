//! Row shapes for association queries and small query helpers.

use std::collections::HashMap;

use gem_core::models::{MemberSummary, PublicationKind, PublicationSummary, SubgroupSummary};
use sqlx::FromRow;

/// A row from an association join, tagged with the id it was looked up by.
pub trait Linked {
    type Item;

    fn owner_id(&self) -> i64;
    fn into_item(self) -> Self::Item;
}

#[derive(Debug, FromRow)]
pub struct LinkedMember {
    pub owner_id: i64,
    pub id: i64,
    pub name: String,
}

impl Linked for LinkedMember {
    type Item = MemberSummary;

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn into_item(self) -> MemberSummary {
        MemberSummary {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LinkedSubgroup {
    pub owner_id: i64,
    pub id: i64,
    pub name: String,
}

impl Linked for LinkedSubgroup {
    type Item = SubgroupSummary;

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn into_item(self) -> SubgroupSummary {
        SubgroupSummary {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LinkedPublication {
    pub owner_id: i64,
    pub id: i64,
    pub title: String,
    pub kind: PublicationKind,
}

impl Linked for LinkedPublication {
    type Item = PublicationSummary;

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn into_item(self) -> PublicationSummary {
        PublicationSummary {
            id: self.id,
            title: self.title,
            kind: self.kind,
        }
    }
}

/// Group association rows by the id they were looked up by, keeping row order.
pub fn group_by_owner<L: Linked>(rows: Vec<L>) -> HashMap<i64, Vec<L::Item>> {
    let mut grouped: HashMap<i64, Vec<L::Item>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id()).or_default().push(row.into_item());
    }
    grouped
}

/// Build an `ILIKE` substring pattern, escaping the LIKE wildcards in `q`.
pub fn like_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Trimmed, non-empty search text
pub(crate) fn search_term(q: Option<&str>) -> Option<String> {
    q.map(str::trim).filter(|q| !q.is_empty()).map(like_pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("policy"), "%policy%");
        assert_eq!(like_pattern("  50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn search_term_ignores_blank_queries() {
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(Some(" gem ")).as_deref(), Some("%gem%"));
    }

    #[test]
    fn group_by_owner_keeps_order_within_owner() {
        let rows = vec![
            LinkedMember { owner_id: 1, id: 10, name: "Ana".into() },
            LinkedMember { owner_id: 2, id: 11, name: "Bruno".into() },
            LinkedMember { owner_id: 1, id: 12, name: "Carla".into() },
        ];
        let grouped = group_by_owner(rows);
        let first: Vec<i64> = grouped[&1].iter().map(|m| m.id).collect();
        assert_eq!(first, vec![10, 12]);
        assert_eq!(grouped[&2].len(), 1);
        assert!(!grouped.contains_key(&3));
    }
}
