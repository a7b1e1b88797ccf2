/// Keyset pagination over a user's todos
///
/// Pages are ordered by ascending `order`. The cursor is the `order` of the
/// last item of the previous page, so inserting or deleting rows never shifts
/// a page the client has not fetched yet.
///
/// # Example
///
/// ```
/// use todolist_shared::pagination::PageRequest;
///
/// let request = PageRequest::from_query(Some("5"), Some("12"));
/// assert_eq!(request.limit, 5);
/// assert_eq!(request.cursor, Some(12));
/// assert_eq!(request.fetch_size(), 6);
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page size used when the client sends none or garbage
pub const DEFAULT_PAGE_SIZE: i64 = 9;

/// Upper bound on the page size
pub const MAX_PAGE_SIZE: i64 = 50;

/// Parsed `limit`/`cursor` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub cursor: Option<i64>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl PageRequest {
    /// Builds a request from raw query values
    ///
    /// A missing, non-numeric, zero or negative `limit` falls back to
    /// [`DEFAULT_PAGE_SIZE`]; larger values are capped at [`MAX_PAGE_SIZE`].
    /// A missing, `"null"` or non-numeric `cursor` means "from the start".
    pub fn from_query(limit: Option<&str>, cursor: Option<&str>) -> Self {
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map_or(DEFAULT_PAGE_SIZE, |n| n.min(MAX_PAGE_SIZE));

        let cursor = cursor
            .map(str::trim)
            .filter(|raw| !raw.is_empty() && *raw != "null")
            .and_then(|raw| raw.parse::<i64>().ok());

        Self { limit, cursor }
    }

    /// Rows to ask the store for: one extra to detect a following page
    pub fn fetch_size(&self) -> i64 {
        self.limit + 1
    }

    /// Cache key for this page of `user_id`'s list
    pub fn cache_key(&self, user_id: Uuid) -> String {
        let cursor = self
            .cursor
            .map_or_else(|| "start".to_string(), |c| c.to_string());
        format!("{}{}_limit_{}", page_prefix(user_id), cursor, self.limit)
    }
}

/// Prefix shared by every cached page of `user_id`'s list
pub fn page_prefix(user_id: Uuid) -> String {
    format!("todos_{user_id}_page_")
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<i64>,
    pub total: i64,
}

impl<T> Page<T> {
    /// Trims the look-ahead row and derives `next_cursor`
    ///
    /// `rows` must come from a query of [`PageRequest::fetch_size`] rows in
    /// ascending order.
    pub fn from_rows(
        mut rows: Vec<T>,
        request: &PageRequest,
        total: i64,
        order_of: impl Fn(&T) -> i64,
    ) -> Self {
        let limit = usize::try_from(request.limit).unwrap_or(0);
        let has_more = rows.len() > limit;

        if has_more {
            rows.truncate(limit);
        }

        let next_cursor = if has_more { rows.last().map(&order_of) } else { None };

        Self {
            data: rows,
            next_cursor,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(PageRequest::from_query(None, None), PageRequest::default());
    }

    #[test]
    fn test_bad_limits_fall_back() {
        for raw in ["abc", "0", "-4", ""] {
            assert_eq!(PageRequest::from_query(Some(raw), None).limit, DEFAULT_PAGE_SIZE);
        }
        assert_eq!(PageRequest::from_query(Some("500"), None).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::from_query(Some("20"), None).limit, 20);
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(PageRequest::from_query(None, Some("null")).cursor, None);
        assert_eq!(PageRequest::from_query(None, Some("x1")).cursor, None);
        assert_eq!(PageRequest::from_query(None, Some("7")).cursor, Some(7));
    }

    #[test]
    fn test_cache_key() {
        let user = Uuid::nil();
        let start = PageRequest::default();
        let later = PageRequest { limit: 5, cursor: Some(4) };

        assert_eq!(
            start.cache_key(user),
            format!("todos_{user}_page_start_limit_9")
        );
        assert_eq!(later.cache_key(user), format!("todos_{user}_page_4_limit_5"));
        assert!(later.cache_key(user).starts_with(&page_prefix(user)));
    }

    #[test]
    fn test_from_rows_with_more() {
        let request = PageRequest { limit: 3, cursor: None };
        let page = Page::from_rows(vec![0, 1, 2, 3], &request, 10, |n| *n);

        assert_eq!(page.data, vec![0, 1, 2]);
        assert_eq!(page.next_cursor, Some(2));
        assert_eq!(page.total, 10);
    }

    #[test]
    fn test_from_rows_last_page() {
        let request = PageRequest { limit: 3, cursor: Some(2) };
        let page = Page::from_rows(vec![3, 4], &request, 5, |n| *n);

        assert_eq!(page.data, vec![3, 4]);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_serializes_next_cursor_camel_case() {
        let page = Page::from_rows(Vec::<i64>::new(), &PageRequest::default(), 0, |n| *n);
        let json = serde_json::to_value(&page).unwrap();

        assert!(json["nextCursor"].is_null());
        assert_eq!(json["total"], 0);
    }
}
