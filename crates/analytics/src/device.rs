//! Device, OS, and browser classification from the page user agent.

use once_cell::sync::Lazy;
use regex::Regex;

// The pattern is a compile-time constant; a failure here is a programming
// error caught by the tests.
#[allow(clippy::unwrap_used)]
static MOBILE_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|Windows Phone").unwrap()
});

/// Coarse device classification used in the payload.
#[must_use]
pub fn device_type(user_agent: &str) -> &'static str {
    if MOBILE_UA.is_match(user_agent) {
        "Mobile"
    } else {
        "Desktop"
    }
}

/// Operating-system classification.
///
/// Ordered substring checks; "like Mac" must be tested before "Mac" since
/// iOS user agents contain both.
#[must_use]
pub fn os_type(user_agent: &str) -> &'static str {
    if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("like Mac") {
        "iOS"
    } else if user_agent.contains("Win") {
        "Windows"
    } else if user_agent.contains("Mac") {
        "Macintosh"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else if user_agent.contains("X11") {
        "Unix"
    } else {
        "Others"
    }
}

/// Browser classification.
///
/// Order matters: Chrome user agents also contain "Safari", and Edge user
/// agents also contain "Chrome", so the arms run IE, Edge, iOS Chrome,
/// Safari, Firefox, Chrome, Others.
#[must_use]
pub fn browser(user_agent: &str) -> &'static str {
    let is_chrome = user_agent.contains("Chrome");
    if user_agent.contains("Trident") || user_agent.contains("MSIE") {
        "Internet Explorer"
    } else if user_agent.contains("Edge") || user_agent.contains("Edg/") {
        "Microsoft Edge"
    } else if user_agent.contains("CriOS") {
        "Chrome"
    } else if user_agent.contains("Safari") && !is_chrome {
        "Safari"
    } else if user_agent.contains("Firefox") {
        "Firefox"
    } else if is_chrome {
        "Chrome"
    } else {
        "Others"
    }
}
