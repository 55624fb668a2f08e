//! Free-text sanitizers applied before persistence
//!
//! Uniform policy: script-tag-like substrings and angle brackets are
//! stripped from all free text, then the field is truncated to its
//! declared maximum. IPs that don't match a strict v4/v6 literal shape
//! become the sentinel `"unknown"` instead of failing the request.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());

static IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());

static IPV6: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$").unwrap());

/// Strip script tags and angle brackets, trim, truncate to `max_len` chars
pub fn sanitize_string(input: &str, max_len: usize) -> String {
    let without_scripts = SCRIPT_TAG.replace_all(input, "");
    let cleaned: String = without_scripts
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect();
    cleaned.trim().chars().take(max_len).collect()
}

/// Sanitize a page path (max 500 chars)
pub fn sanitize_page(page: &str) -> String {
    sanitize_string(page, 500)
}

/// Sanitize a user-agent string (max 1000 chars)
pub fn sanitize_user_agent(user_agent: &str) -> String {
    sanitize_string(user_agent, 1000)
}

/// Keep an IP only if it is strictly IPv4/IPv6 shaped, else `"unknown"`
pub fn sanitize_ip(ip: &str) -> String {
    if IPV4.is_match(ip) || IPV6.is_match(ip) {
        ip.to_string()
    } else {
        "unknown".to_string()
    }
}

/// Whether an action name is confined to `[A-Za-z0-9_-]`
pub fn is_valid_action(action: &str) -> bool {
    !action.is_empty()
        && action
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
