use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PER_PAGE: usize = 25;
pub const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn first_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        Value::Bool(_) | Value::Null => false,
    }
}

/// Case-insensitive substring match over a row's text and number fields.
pub fn matches_search<T: Serialize>(row: &T, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    serde_json::to_value(row).is_ok_and(|v| contains_text(&v, &needle))
}

/// Filters by the search term, then slices out one 1-based page. Page 0 is
/// treated as page 1, and `per_page` is clamped to `1..=MAX_PER_PAGE`.
pub fn paginate<T: Serialize + Clone>(rows: &[T], request: &PageRequest) -> Page<T> {
    let per_page = request.per_page.clamp(1, MAX_PER_PAGE);
    let page = request.page.max(1);

    let matching: Vec<&T> = match request.search.as_deref() {
        Some(term) => rows.iter().filter(|r| matches_search(*r, term)).collect(),
        None => rows.iter().collect(),
    };
    let total_items = matching.len();
    let total_pages = total_items.div_ceil(per_page);

    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect();

    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        (1..=7)
            .map(|i| {
                let tower = if i % 2 == 0 { "T2" } else { "T1" };
                json!({ "serial_no": i, "description": format!("Item {i}"), "tower": tower })
            })
            .collect()
    }

    #[test]
    fn test_pages_and_counts() {
        let request = PageRequest {
            search: None,
            page: 3,
            per_page: 3,
        };
        let page = paginate(&rows(), &request);
        assert_eq!(page.total_items, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["serial_no"], 7);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let request = PageRequest {
            search: Some("t2".into()),
            ..PageRequest::default()
        };
        let page = paginate(&rows(), &request);
        assert_eq!(page.total_items, 3);
        assert!(page.items.iter().all(|r| r["tower"] == "T2"));
    }

    #[test]
    fn test_out_of_range_page_is_empty_and_zero_is_first() {
        let beyond = PageRequest {
            page: 9,
            ..PageRequest::default()
        };
        assert!(paginate(&rows(), &beyond).items.is_empty());

        let zero = PageRequest {
            page: 0,
            per_page: 0,
            search: Some("  ".into()),
        };
        let page = paginate(&rows(), &zero);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.items.len(), 1);
    }
}
