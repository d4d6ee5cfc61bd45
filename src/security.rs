//! Input sanitization and validation helpers.
//!
//! Everything here is pure; the contact form and login flow compose these
//! before any network call is made.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-']+$").expect("valid regex"));

/// Inline handler attribute such as `onmouseover = ...`, but not `options=`.
static EVENT_HANDLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").expect("valid regex"));

static EVAL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\beval\s*\(").expect("valid regex"));

static JS_PROTOCOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));

/// Lowercase markers rejected anywhere in free-text input.
const SPAM_MARKERS: &[&str] = &[
    "http://",
    "https://",
    "www.",
    "<script",
    "<iframe",
    "javascript:",
    "onclick",
    "onerror",
];

/// Trim, then truncate to `max_chars` characters.
///
/// Idempotent: applying it to its own output yields the same string.
#[must_use]
pub fn trim_truncate(input: &str, max_chars: usize) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => trimmed[..idx].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Strip markup that could be rendered as HTML or script.
///
/// Trims, truncates to `max_chars`, then removes `<`/`>`, the `javascript:`
/// protocol and inline `on<event>=` attributes.
#[must_use]
pub fn sanitize_string(input: &str, max_chars: usize) -> String {
    let mut out = trim_truncate(input, max_chars).replace(['<', '>'], "");
    // Removing one match can splice a new one together, so repeat until stable.
    loop {
        let next = EVENT_HANDLER_RE
            .replace_all(&JS_PROTOCOL_RE.replace_all(&out, ""), "")
            .into_owned();
        if next == out {
            return out.trim().to_string();
        }
        out = next;
    }
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Letters, whitespace, hyphens and apostrophes only.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// [`is_valid_name`] plus a 2..=100 character length bound.
#[must_use]
pub fn is_valid_person_name(name: &str) -> bool {
    let len = name.chars().count();
    is_valid_name(name) && (2..=100).contains(&len)
}

/// Links, script/iframe tags, `javascript:` and inline event handlers.
#[must_use]
pub fn has_spam_patterns(text: &str) -> bool {
    let lower = text.to_lowercase();
    SPAM_MARKERS.iter().any(|m| lower.contains(m))
        || EVENT_HANDLER_RE.is_match(&lower)
        || EVAL_CALL_RE.is_match(&lower)
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Absolute `http`/`https` URL.
#[must_use]
pub fn is_valid_url(input: &str) -> bool {
    url::Url::parse(input).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Password policy outcome; `errors` lists every unmet rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub errors: Vec<&'static str>,
}

impl PasswordStrength {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[must_use]
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();
    if password.chars().count() < 8 {
        errors.push("Password minimal 8 karakter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password harus mengandung huruf kecil");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password harus mengandung huruf besar");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password harus mengandung angka");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password harus mengandung karakter khusus");
    }
    PasswordStrength { errors }
}

/// Hex string of `len` cryptographically random bytes.
#[must_use]
pub fn generate_secure_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

/// SHA-256 of `input`, hex encoded.
#[must_use]
pub fn hash_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_truncate_counts_chars() {
        assert_eq!(trim_truncate("  hello  ", 100), "hello");
        assert_eq!(trim_truncate("abcdef", 3), "abc");
        assert_eq!(trim_truncate("ééééé", 2), "éé");
    }

    #[test]
    fn test_trim_truncate_idempotent() {
        for (input, max) in [("  John Doe ", 100), ("a b c d e", 4), ("x".repeat(300).as_str(), 100)] {
            let once = trim_truncate(input, max);
            assert_eq!(trim_truncate(&once, max), once);
        }
    }

    #[test]
    fn test_sanitize_strips_markup() {
        assert_eq!(sanitize_string("<b>hi</b>", 100), "bhi/b");
        assert_eq!(sanitize_string("JavaScript:alert(1)", 100), "alert(1)");
        assert_eq!(sanitize_string("img onerror=x", 100), "img x");
        assert_eq!(sanitize_string("javajavascript:script:x", 100), "x");
        assert_eq!(sanitize_string("options=basic", 100), "options=basic");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let once = sanitize_string("  <p onclick=go()>javascript:hey</p>  ", 1000);
        assert_eq!(sanitize_string(&once, 1000), once);
    }

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a @b.co"));
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("John Doe"));
        assert!(is_valid_name("Mary-Jane O'Neil"));
        assert!(!is_valid_name("John123"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("<script>"));
    }

    #[test]
    fn test_person_name_length() {
        assert!(!is_valid_person_name("J"));
        assert!(is_valid_person_name("Jo"));
        assert!(!is_valid_person_name(&"a".repeat(101)));
    }

    #[test]
    fn test_spam_patterns() {
        assert!(has_spam_patterns("visit http://spam.example"));
        assert!(has_spam_patterns("HTTPS://x"));
        assert!(has_spam_patterns("go to www.example.com"));
        assert!(has_spam_patterns("<SCRIPT>alert(1)</SCRIPT>"));
        assert!(has_spam_patterns("<div onmouseover=steal()>"));
        assert!(!has_spam_patterns("Hi, I'd like to discuss a project."));
        assert!(!has_spam_patterns("The document. Window seat please."));
    }

    #[test]
    fn test_spam_patterns_need_word_boundaries() {
        assert!(has_spam_patterns("<a onmouseover = steal()>"));
        assert!(has_spam_patterns("run eval(payload)"));
        assert!(has_spam_patterns("EVAL (x)"));
        assert!(!has_spam_patterns(
            "We need two pricing options=basic and pro; also a medieval(ish) theme."
        ));
        assert!(!has_spam_patterns("conditions=agreed, questions=none"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_valid_url() {
        assert!(is_valid_url("https://example.com/a"));
        assert!(is_valid_url("http://localhost:3000"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("not a url"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Str0ng!pass").is_valid());
        let weak = validate_password_strength("abc");
        assert_eq!(weak.errors.len(), 4);
        assert!(weak.errors.contains(&"Password minimal 8 karakter"));
    }

    #[test]
    fn test_secure_token() {
        let t1 = generate_secure_token(32);
        let t2 = generate_secure_token(32);
        assert_eq!(t1.len(), 64);
        assert!(t1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_hash_string() {
        assert_eq!(
            hash_string("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
