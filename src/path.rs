//! Helpers for building management API paths.

/// Percent-encodes a single path segment. Spaces become `%20`.
pub fn escape(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Query string for list pagination, e.g. `limit=10&offset=20`. Empty when neither is set.
pub fn paginate(limit: Option<u32>, offset: Option<u32>) -> String {
    let mut args = Vec::new();
    if let Some(limit) = limit {
        args.push(format!("limit={}", limit));
    }
    if let Some(offset) = offset {
        args.push(format!("offset={}", offset));
    }
    args.join("&")
}

/// Appends a query string to `path`, respecting any query already present.
pub fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}
