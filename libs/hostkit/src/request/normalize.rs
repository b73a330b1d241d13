//! Collapse concrete request URLs into template keys, so two requests for
//! `/items/123` and `/items/456` share the identity `/items/number`.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("uuid pattern is valid")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("number pattern is valid"));

// Alphabetic characters outside the Latin script (Cyrillic, Greek, CJK, ...).
static FREE_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}&&\P{Latin}]").expect("free-text pattern is valid"));

pub const UUID_PLACEHOLDER: &str = "uuid";
pub const NUMBER_PLACEHOLDER: &str = "number";
pub const STRING_PLACEHOLDER: &str = "string";

/// Template key for `url`, optionally prefixed with `METHOD:`.
///
/// Never fails: input that does not parse as an absolute URL (including
/// plain paths) is split on `?` by hand.
pub fn normalize(url: &str, method: Option<&str>) -> String {
    let path = path_of(url);

    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect();

    let template = format!("/{}", segments.join("/"));
    match method {
        Some(m) if !m.trim().is_empty() => format!("{}:{template}", m.trim().to_ascii_uppercase()),
        _ => template,
    }
}

fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

fn classify_segment(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    if UUID_RE.is_match(&decoded) {
        UUID_PLACEHOLDER.to_string()
    } else if NUMBER_RE.is_match(&decoded) {
        NUMBER_PLACEHOLDER.to_string()
    } else if FREE_TEXT_RE.is_match(&decoded) {
        STRING_PLACEHOLDER.to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_and_ids_collapse_to_one_key() {
        assert_eq!(normalize("/items/123?x=1", None), "/items/number");
        assert_eq!(normalize("/items/123?x=1", None), normalize("/items/456", None));
    }

    #[test]
    fn normalization_is_deterministic() {
        for input in ["/a/b", "", "///", "?only=query", "/товары/7", "http://[::1"] {
            assert_eq!(normalize(input, Some("get")), normalize(input, Some("get")));
        }
    }

    #[test]
    fn uuid_segments_become_placeholders() {
        assert_eq!(
            normalize("/users/550e8400-e29b-41d4-a716-446655440000/roles", None),
            "/users/uuid/roles"
        );
        assert_eq!(
            normalize("/users/550E8400-E29B-11D4-A716-446655440000", None),
            "/users/uuid"
        );
        // version nibble 7 is outside v1-5
        assert_eq!(
            normalize("/users/550e8400-e29b-71d4-a716-446655440000", None),
            "/users/550e8400-e29b-71d4-a716-446655440000"
        );
    }

    #[test]
    fn non_latin_text_becomes_string_placeholder() {
        assert_eq!(normalize("/catalog/товары/42", None), "/catalog/string/number");
        assert_eq!(normalize("/catalog/%D1%82%D0%BE%D0%B2%D0%B0%D1%80", None), "/catalog/string");
        // Latin with diacritics is not free text
        assert_eq!(normalize("/catalog/café", None), "/catalog/café");
    }

    #[test]
    fn unmatched_segments_keep_their_encoding() {
        assert_eq!(normalize("/files/a%2Fb", None), "/files/a%2Fb");
        assert_ne!(normalize("/files/a%2Fb", None), normalize("/files/a/b", None));
    }

    #[test]
    fn method_prefix_is_uppercased() {
        assert_eq!(normalize("/api/profile/9", Some("post")), "POST:/api/profile/number");
        assert_eq!(normalize("/api/profile", Some("")), "/api/profile");
    }

    #[test]
    fn absolute_urls_keep_only_the_path() {
        assert_eq!(
            normalize("https://api.example.com/v1/orders/77?expand=lines#top", Some("GET")),
            "GET:/v1/orders/number"
        );
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(normalize("//items///5/", None), "/items/number");
        assert_eq!(normalize("", None), "/");
    }

    #[test]
    fn unparseable_input_falls_back_to_manual_split() {
        assert_eq!(normalize("http://[::1/items/3?x=1", None), "/http:/[::1/items/number");
    }
}
