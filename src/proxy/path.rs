//! Service key extraction and path rewriting.

use url::Url;

use crate::error::DispatchError;

/// Split `/{service}/{rest...}` into the service key and the remainder.
///
/// The remainder keeps its leading `/` and is empty when the path names
/// only the service (`/orders`).
pub fn split_service(path: &str) -> Result<(&str, &str), DispatchError> {
    let trimmed = path.trim_start_matches('/');
    let (key, rest) = trimmed
        .find('/')
        .map_or((trimmed, ""), |i| trimmed.split_at(i));

    if key.is_empty() {
        return Err(DispatchError::InvalidPath(path.to_string()));
    }
    Ok((key, rest))
}

/// Path sent upstream: the remainder when stripping, otherwise the original
/// path. Always starts with `/`.
#[must_use]
pub fn forwarded_path<'a>(original: &'a str, rest: &'a str, strip: bool) -> &'a str {
    if !strip {
        original
    } else if rest.is_empty() {
        "/"
    } else {
        rest
    }
}

/// `base + path`, with the query string re-attached.
#[must_use]
pub fn target_uri(base: &Url, path: &str, query: Option<&str>) -> String {
    let mut target = format!("{}{path}", base.as_str().trim_end_matches('/'));
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_first_segment() {
        assert_eq!(split_service("/orders/123").unwrap(), ("orders", "/123"));
        assert_eq!(split_service("/orders").unwrap(), ("orders", ""));
        assert_eq!(split_service("/orders/").unwrap(), ("orders", "/"));
        assert_eq!(
            split_service("/orders/123/items").unwrap(),
            ("orders", "/123/items")
        );
    }

    #[test]
    fn empty_key_is_invalid() {
        assert_eq!(split_service("//orders").unwrap(), ("orders", ""));
        assert!(matches!(split_service("/"), Err(DispatchError::InvalidPath(_))));
        assert!(matches!(split_service(""), Err(DispatchError::InvalidPath(_))));
    }

    #[test]
    fn strip_and_keep() {
        let (_, rest) = split_service("/orders/123").unwrap();
        assert_eq!(forwarded_path("/orders/123", rest, true), "/123");
        assert_eq!(forwarded_path("/orders/123", rest, false), "/orders/123");

        let (_, rest) = split_service("/orders").unwrap();
        assert_eq!(forwarded_path("/orders", rest, true), "/");
    }

    #[test]
    fn target_keeps_query_and_avoids_double_slash() {
        let base = Url::parse("http://10.0.0.5:8081").unwrap();
        assert_eq!(
            target_uri(&base, "/123", Some("expand=items")),
            "http://10.0.0.5:8081/123?expand=items"
        );

        let base = Url::parse("http://svc:80/api/").unwrap();
        assert_eq!(target_uri(&base, "/v1", None), "http://svc/api/v1");
    }
}
