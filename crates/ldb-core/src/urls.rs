//! URL normalization for stored links and custom buttons.

use regex::Regex;

const DEFAULT_SCHEME: &str = "https";

/// Normalize operator/user input into a clickable URL.
///
/// `@name` and `t.me/name` shorthand expand to full Telegram links; a value
/// without a scheme gets the default scheme prefixed. A missing scheme is
/// never by itself a reason to reject input.
pub fn normalize(raw: &str) -> String {
    let mut url = raw.trim().to_string();

    if let Some(name) = url.strip_prefix('@') {
        return format!("https://t.me/{name}");
    }
    if url.starts_with("t.me/") {
        return format!("https://{url}");
    }
    if url.contains("t.me/@") {
        url = url.replace("t.me/@", "t.me/");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("{DEFAULT_SCHEME}://{url}");
    }
    url
}

/// Accept only http(s) URLs with a plausible host part.
pub fn is_valid(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*(:\d+)?$").expect("valid regex");
    host_re.is_match(host)
}

/// Heuristic: does free text look like something `normalize` should touch?
///
/// Personal "link" records may hold arbitrary text (a service name, a phrase);
/// only values that read as an address get scheme normalization.
pub fn looks_urlish(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() || s.contains(char::is_whitespace) {
        return false;
    }
    s.starts_with('@')
        || s.starts_with("http://")
        || s.starts_with("https://")
        || s.contains('.')
}

/// Short human label for a URL (used on inline link buttons).
pub fn display_name(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return "Link".to_string();
    }
    if host == "t.me" || host.ends_with(".t.me") {
        return "Telegram".to_string();
    }
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_expands_handle_shorthand() {
        assert_eq!(normalize("@shop"), "https://t.me/shop");
        assert_eq!(normalize("t.me/shop"), "https://t.me/shop");
        assert_eq!(normalize("https://t.me/@shop"), "https://t.me/shop");
    }

    #[test]
    fn normalize_prefixes_missing_scheme() {
        assert_eq!(normalize("example.com"), "https://example.com");
        assert_eq!(normalize("  example.com/x  "), "https://example.com/x");
        assert_eq!(normalize("http://example.com"), "http://example.com");
    }

    #[test]
    fn validity_requires_a_host() {
        assert!(is_valid("https://example.com"));
        assert!(is_valid("https://example.com:8080/path"));
        assert!(!is_valid("https://"));
        assert!(!is_valid("ftp://example.com"));
        assert!(!is_valid("https://bad host"));
    }

    #[test]
    fn urlish_heuristic() {
        assert!(looks_urlish("example.com"));
        assert!(looks_urlish("@channel"));
        assert!(!looks_urlish("my shop name"));
        assert!(!looks_urlish(""));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("https://t.me/shop"), "Telegram");
        assert_eq!(display_name("https://example.com/x"), "example.com");
    }
}
