// src/preprocess.rs
//! Email text normalization: subject/body are folded into one canonical,
//! lowercase string with URLs, addresses and numbers masked by fixed tokens.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const URL_TOKEN: &str = "[url]";
pub const EMAIL_TOKEN: &str = "[email]";
pub const NUM_TOKEN: &str = "[num]";

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|www\S+|https\S+").expect("url regex"));
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+").expect("email regex"));
static RE_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number regex"));

/// Output of [`normalize`]. Only this module constructs it, so holding one
/// means the masking steps have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Combine subject and body into the text the model was trained on.
///
/// Steps run in a fixed order: combine, collapse whitespace, lowercase, then
/// mask URLs, e-mail addresses and digit runs. Masking runs after
/// lowercasing, so the patterns only ever see lowercase input.
pub fn normalize(subject: Option<&str>, body: Option<&str>) -> NormalizedText {
    // 1) Combine with section markers
    let combined = format!(
        "[SUBJ] {} [BODY] {}",
        subject.unwrap_or_default(),
        body.unwrap_or_default()
    );

    // 2) Collapse whitespace
    let collapsed = combined.split_whitespace().collect::<Vec<_>>().join(" ");

    // 3) Lowercase
    let lowered = collapsed.to_lowercase();

    // 4) Mask URLs, then addresses, then numbers
    let out = RE_URL.replace_all(&lowered, URL_TOKEN);
    let out = RE_EMAIL.replace_all(&out, EMAIL_TOKEN);
    let out = RE_NUM.replace_all(&out, NUM_TOKEN);

    NormalizedText(out.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_with_markers_and_lowercases() {
        let t = normalize(Some("Hello World"), Some("Body Text"));
        assert_eq!(t.as_str(), "[subj] hello world [body] body text");
    }

    #[test]
    fn missing_fields_become_empty() {
        assert_eq!(normalize(None, None).as_str(), "[subj] [body]");
        assert_eq!(normalize(Some(""), None).as_str(), "[subj] [body]");
        assert_eq!(normalize(None, Some("x")).as_str(), "[subj] [body] x");
    }

    #[test]
    fn collapses_newlines_tabs_and_runs() {
        let t = normalize(Some("  a \t b  "), Some("line1\n\n  line\r\nend "));
        assert_eq!(t.as_str(), "[subj] a b [body] line[num] line end");
    }

    #[test]
    fn masks_urls() {
        let t = normalize(Some("Click http://evil.com now"), Some(""));
        assert!(t.as_str().contains(URL_TOKEN));
        assert!(!t.as_str().contains("evil.com"));
        assert_eq!(t.as_str(), "[subj] click [url] now [body]");

        let t = normalize(None, Some("visit WWW.Bank-Login.example/reset today"));
        assert_eq!(t.as_str(), "[subj] [body] visit [url] today");

        let t = normalize(None, Some("go to HTTPS://secure.example.org/a?b=1"));
        assert_eq!(t.as_str(), "[subj] [body] go to [url]");
    }

    #[test]
    fn masks_emails() {
        let t = normalize(Some(""), Some("contact me@x.com"));
        assert!(t.as_str().contains(EMAIL_TOKEN));
        assert!(!t.as_str().contains("me@x.com"));
        assert_eq!(t.as_str(), "[subj] [body] contact [email]");
    }

    #[test]
    fn masks_digit_runs() {
        let t = normalize(Some("Order 12345"), Some(""));
        assert!(t.as_str().contains(NUM_TOKEN));
        assert!(!t.as_str().contains("12345"));
        assert_eq!(t.as_str(), "[subj] order [num] [body]");

        let t = normalize(None, Some("a1b22c333"));
        assert_eq!(t.as_str(), "[subj] [body] a[num]b[num]c[num]");
    }

    #[test]
    fn digits_inside_urls_are_swallowed_by_url_mask() {
        let t = normalize(None, Some("http://10.0.0.1/login and 42"));
        assert_eq!(t.as_str(), "[subj] [body] [url] and [num]");
    }

    #[test]
    fn output_is_lowercase_without_digits() {
        let samples = [
            ("URGENT: Verify Account 2024", "Dear USER, pay $1,000 by 12/31 at WWW.PAY.COM"),
            ("", ""),
            ("ÄÖÜ Straße 9", "Call +1 (555) 010-9999 or Mail@Example.ORG"),
            ("tab\tsep", "multi\n\nline 007"),
        ];
        for (s, b) in samples {
            let t = normalize(Some(s), Some(b));
            let text = t.as_str();
            assert_eq!(text, text.to_lowercase(), "not lowercase: {text}");
            assert!(
                !text.chars().any(|c| c.is_ascii_digit()),
                "raw digits left in: {text}"
            );
            assert!(!text.contains("  "), "whitespace not collapsed: {text}");
        }
    }

    #[test]
    fn is_deterministic() {
        let a = normalize(Some("Win $500 now"), Some("reply to prize@lotto.biz"));
        let b = normalize(Some("Win $500 now"), Some("reply to prize@lotto.biz"));
        assert_eq!(a, b);
    }
}
