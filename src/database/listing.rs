//! Pagination and sorting shared by every listing endpoint.
//!
//! Filters are resource specific and live next to their services; this module
//! only knows how to turn `page`, `limit` and `sort` query parameters into SQL
//! fragments on a [`QueryBuilder`].

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use crate::error::{Error, Result};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
/// Deep enough for any real listing while keeping the offset far from overflow.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.per_page - 1) / self.per_page
        }
    }

    pub fn push_limit(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" LIMIT ")
            .push_bind(self.per_page)
            .push(" OFFSET ")
            .push_bind(self.offset());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
        }
    }

    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

/// Ordered list of sort keys parsed from `sort=-created_at,title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort(Vec<SortKey>);

impl Sort {
    /// `allowed` maps public field names to SQL columns. Unknown fields are
    /// rejected so raw input never reaches the ORDER BY clause.
    pub fn parse(
        raw: Option<&str>,
        allowed: &[(&str, &'static str)],
        default: &str,
    ) -> Result<Self> {
        let requested = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);

        let mut keys = Vec::new();
        for part in requested.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part.strip_prefix('+').unwrap_or(part), false),
            };
            let column = allowed
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, column)| *column)
                .ok_or_else(|| Error::BadRequest(format!("Cannot sort by '{}'", name)))?;
            keys.push(SortKey { column, descending });
        }

        if keys.is_empty() && requested != default {
            return Self::parse(None, allowed, default);
        }
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn to_sql(&self) -> String {
        self.0
            .iter()
            .map(|k| format!("{} {}", k.column, if k.descending { "DESC" } else { "ASC" }))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ").push(self.to_sql());
    }
}

/// `%term%` for ILIKE with the wildcard characters of `term` escaped.
/// Blank input yields `None`.
pub fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[
        ("created_at", "j.created_at"),
        ("title", "j.title"),
        ("salary_min", "j.salary_min"),
    ];

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination::new(None, None);
        assert_eq!(p, Pagination { page: 1, per_page: DEFAULT_PER_PAGE });

        let p = Pagination::new(Some(-3), Some(10_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        let p = Pagination::new(Some(3), Some(0));
        assert_eq!(p.per_page, 1);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn huge_page_numbers_stay_in_range() {
        let p = Pagination::new(Some(i64::MAX), Some(MAX_PER_PAGE));
        assert_eq!(p.page, MAX_PAGE);
        assert_eq!(p.offset(), (MAX_PAGE - 1) * MAX_PER_PAGE);
        assert!(p.offset() > 0);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs j");
        Pagination::new(Some(i64::MAX), Some(i64::MAX)).push_limit(&mut qb);
        assert!(qb.sql().ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(Some(1), Some(20));
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(20), 1);
        assert_eq!(p.total_pages(21), 2);
    }

    #[test]
    fn sort_parses_direction_prefixes() {
        let sort = Sort::parse(Some("-created_at, title"), FIELDS, "-created_at").unwrap();
        assert_eq!(sort.to_sql(), "j.created_at DESC, j.title ASC");
    }

    #[test]
    fn sort_falls_back_to_default() {
        let sort = Sort::parse(Some("  "), FIELDS, "-created_at").unwrap();
        assert_eq!(sort.keys().len(), 1);
        assert!(sort.keys()[0].descending);

        let sort = Sort::parse(Some(","), FIELDS, "title").unwrap();
        assert_eq!(sort.to_sql(), "j.title ASC");
    }

    #[test]
    fn sort_rejects_unknown_fields() {
        let err = Sort::parse(Some("password_hash"), FIELDS, "-created_at").unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn paginated_map_keeps_counts() {
        let page = Paginated::new(vec![1, 2, 3], 43, Pagination::new(Some(2), Some(3)));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.total_pages, 15);
        assert_eq!(mapped.page, 2);
    }

    #[test]
    fn pushes_order_and_limit() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs j");
        Sort::parse(Some("salary_min"), FIELDS, "-created_at")
            .unwrap()
            .push_order_by(&mut qb);
        Pagination::new(Some(2), Some(10)).push_limit(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM jobs j ORDER BY j.salary_min ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" nurse ")).as_deref(), Some("%nurse%"));
        assert_eq!(like_pattern(Some("50%_off")).as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
