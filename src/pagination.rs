//! Cursor pagination shared by thread, user and post listings.
//!
//! A [`Page`] carries `limit` (0 = unbounded), an exclusive `since` cursor and
//! the direction. The cursor is compared against whatever key the listing is
//! ordered by: strictly greater when ascending, strictly less when descending.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::models::Id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<C> {
    pub limit: u64,
    pub since: Option<C>,
    pub desc: bool,
}

impl<C> Default for Page<C> {
    fn default() -> Self {
        Self { limit: 0, since: None, desc: false }
    }
}

impl<C> Page<C> {
    pub fn new(limit: u64, since: Option<C>, desc: bool) -> Self {
        Self { limit, since, desc }
    }

    /// Row cap, `None` when unbounded.
    pub fn cap(&self) -> Option<usize> {
        (self.limit > 0).then(|| usize::try_from(self.limit).unwrap_or(usize::MAX))
    }

    /// Applies the page direction to an ascending comparison.
    pub fn direction(&self, ord: Ordering) -> Ordering {
        if self.desc { ord.reverse() } else { ord }
    }

    pub fn truncate<T>(&self, items: &mut Vec<T>) {
        if let Some(cap) = self.cap() {
            items.truncate(cap);
        }
    }

    pub fn keyword(&self) -> &'static str {
        if self.desc { "DESC" } else { "ASC" }
    }

    /// SQL operator matching [`Page::admits`].
    pub fn comparator(&self) -> &'static str {
        if self.desc { "<" } else { ">" }
    }

    /// Same limit and direction with the cursor resolved to another key type.
    pub fn with_since<D>(&self, since: Option<D>) -> Page<D> {
        Page { limit: self.limit, since, desc: self.desc }
    }
}

impl<C: PartialOrd> Page<C> {
    /// Whether a row keyed by `key` lies past the cursor.
    pub fn admits(&self, key: &C) -> bool {
        match &self.since {
            None => true,
            Some(since) if self.desc => key < since,
            Some(since) => key > since,
        }
    }
}

#[cfg(feature = "postgres-store")]
mod sql {
    use sqlx::{Postgres, QueryBuilder};

    use super::Page;

    impl<C> Page<C> {
        pub fn push_order(&self, qb: &mut QueryBuilder<'_, Postgres>, column: &str) {
            qb.push(" ORDER BY ").push(column).push(" ").push(self.keyword());
        }

        pub fn push_limit(&self, qb: &mut QueryBuilder<'_, Postgres>) {
            if self.limit > 0 {
                qb.push(" LIMIT ").push_bind(i64::try_from(self.limit).unwrap_or(i64::MAX));
            }
        }
    }

    impl<C> Page<C> {
        /// `AND <column> >|< $n` when a cursor is set.
        pub fn push_since<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>, column: &str)
        where
            C: Clone + Send + 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
        {
            if let Some(since) = &self.since {
                qb.push(" AND ")
                    .push(column)
                    .push(" ")
                    .push(self.comparator())
                    .push(" ")
                    .push_bind(since.clone());
            }
        }
    }
}

/// Traversal mode of `GET /api/thread/{slug_or_id}/posts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostSort {
    #[default]
    Flat,
    Tree,
    ParentTree,
}

impl FromStr for PostSort {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "flat" => Ok(PostSort::Flat),
            "tree" => Ok(PostSort::Tree),
            "parent_tree" => Ok(PostSort::ParentTree),
            other => Err(ApiError::BadRequest(format!("unknown sort '{other}'"))),
        }
    }
}

/// Decoding of the raw `since` query value into a listing's cursor type.
pub trait Cursor: Sized {
    fn parse_cursor(raw: &str) -> Result<Option<Self>, ApiError>;
}

/// Post cursors are post ids; `0` means no cursor.
impl Cursor for Id {
    fn parse_cursor(raw: &str) -> Result<Option<Self>, ApiError> {
        let id: Id = raw
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid post cursor '{raw}'")))?;
        Ok((id != 0).then_some(id))
    }
}

impl Cursor for DateTime<Utc> {
    fn parse_cursor(raw: &str) -> Result<Option<Self>, ApiError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| ApiError::BadRequest(format!("invalid timestamp cursor '{raw}'")))
    }
}

impl Cursor for String {
    fn parse_cursor(raw: &str) -> Result<Option<Self>, ApiError> {
        Ok((!raw.is_empty()).then(|| raw.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Maximum number of rows (post listings in parent_tree mode: root posts); 0 = unbounded
    pub limit: Option<u64>,
    /// Exclusive cursor: post id, RFC 3339 timestamp or nickname depending on the listing
    pub since: Option<String>,
    /// Descending order
    pub desc: Option<bool>,
    /// Post listings only: flat, tree or parent_tree
    pub sort: Option<String>,
}

impl PageQuery {
    pub fn page<C: Cursor>(&self) -> Result<Page<C>, ApiError> {
        let since = match self.since.as_deref() {
            Some(raw) => C::parse_cursor(raw)?,
            None => None,
        };
        Ok(Page::new(self.limit.unwrap_or(0), since, self.desc.unwrap_or(false)))
    }

    pub fn sort(&self) -> Result<PostSort, ApiError> {
        self.sort.as_deref().unwrap_or_default().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_exclusive_in_both_directions() {
        let asc = Page::new(0, Some(5), false);
        assert!(asc.admits(&6));
        assert!(!asc.admits(&5));
        assert!(!asc.admits(&4));

        let desc = Page::new(0, Some(5), true);
        assert!(desc.admits(&4));
        assert!(!desc.admits(&5));
        assert!(!desc.admits(&6));

        let open: Page<i64> = Page::default();
        assert!(open.admits(&i64::MIN));
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let mut rows = vec![1, 2, 3];
        Page::<i64>::new(0, None, false).truncate(&mut rows);
        assert_eq!(rows, vec![1, 2, 3]);
        Page::<i64>::new(2, None, false).truncate(&mut rows);
        assert_eq!(rows, vec![1, 2]);
    }

    #[test]
    fn desc_flips_direction_and_operator() {
        let p = Page::<i64>::new(0, None, true);
        assert_eq!(p.direction(1.cmp(&2)), Ordering::Greater);
        assert_eq!(p.comparator(), "<");
        assert_eq!(p.keyword(), "DESC");
    }

    #[test]
    fn post_cursor_zero_means_none() {
        let q = PageQuery { since: Some("0".into()), ..Default::default() };
        assert_eq!(q.page::<Id>().unwrap().since, None);
        let q = PageQuery { since: Some("17".into()), limit: Some(3), desc: Some(true), sort: None };
        assert_eq!(q.page::<Id>().unwrap(), Page::new(3, Some(17), true));
        let q = PageQuery { since: Some("abc".into()), ..Default::default() };
        assert!(matches!(q.page::<Id>(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn timestamp_cursor_parses_rfc3339() {
        let q = PageQuery { since: Some("2024-01-02T03:04:05.000+03:00".into()), ..Default::default() };
        let since = q.page::<DateTime<Utc>>().unwrap().since.unwrap();
        assert_eq!(since.to_rfc3339(), "2024-01-02T00:04:05+00:00");
    }

    #[test]
    fn sort_defaults_to_flat_and_rejects_unknown() {
        assert_eq!(PageQuery::default().sort().unwrap(), PostSort::Flat);
        let q = PageQuery { sort: Some("parent_tree".into()), ..Default::default() };
        assert_eq!(q.sort().unwrap(), PostSort::ParentTree);
        let q = PageQuery { sort: Some("sideways".into()), ..Default::default() };
        assert!(q.sort().is_err());
    }
}
