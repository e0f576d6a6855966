use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// What kind of payload a piece of QR content carries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Url,
    Email,
    Sms,
    Tel,
    #[default]
    Text,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Url => write!(f, "url"),
            ContentType::Email => write!(f, "email"),
            ContentType::Sms => write!(f, "sms"),
            ContentType::Tel => write!(f, "tel"),
            ContentType::Text => write!(f, "text"),
        }
    }
}

impl ContentType {
    /// Only web links can be swapped for a tracking redirect.
    pub fn is_trackable(&self) -> bool {
        matches!(self, ContentType::Url)
    }
}

/// Classify free-form content. First match wins: url, email, sms, tel, text.
pub fn classify(content: &str) -> ContentType {
    if is_web_url(content) {
        ContentType::Url
    } else if is_mailto(content) {
        ContentType::Email
    } else if is_dial_string(content, "sms:") {
        ContentType::Sms
    } else if is_dial_string(content, "tel:") {
        ContentType::Tel
    } else {
        ContentType::Text
    }
}

pub fn is_web_url(content: &str) -> bool {
    parse_web_url(content).is_some()
}

/// Parse an absolute http(s) URL. The parser silently trims surrounding
/// spaces and drops tabs and newlines, so any whitespace or control
/// character makes the content plain text instead.
pub fn parse_web_url(content: &str) -> Option<Url> {
    if content
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return None;
    }
    Url::parse(content)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

fn is_mailto(content: &str) -> bool {
    let Some(address) = content.strip_prefix("mailto:") else {
        return false;
    };
    let mut parts = address.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    // Domain needs at least one dot and no empty labels
    domain.contains('.')
        && !domain.chars().any(char::is_whitespace)
        && domain.split('.').all(|label| !label.is_empty())
}

fn is_dial_string(content: &str, scheme: &str) -> bool {
    let Some(number) = content.strip_prefix(scheme) else {
        return false;
    };
    let digits = number.strip_prefix('+').unwrap_or(number);
    (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_documented_examples() {
        assert_eq!(classify("https://example.com"), ContentType::Url);
        assert_eq!(classify("mailto:a@b.com"), ContentType::Email);
        assert_eq!(classify("tel:+12345678"), ContentType::Tel);
        assert_eq!(classify("hello"), ContentType::Text);
    }

    #[test]
    fn only_http_schemes_are_urls() {
        assert_eq!(classify("http://a.com/path?q=1"), ContentType::Url);
        assert_eq!(classify("ftp://a.com"), ContentType::Text);
        assert_eq!(classify("example.com"), ContentType::Text);
        assert_eq!(classify("https://"), ContentType::Text);
    }

    #[test]
    fn whitespace_and_control_characters_are_not_urls() {
        assert_eq!(classify(" https://a.com"), ContentType::Text);
        assert_eq!(classify("https://a.com "), ContentType::Text);
        assert_eq!(classify("https://a.\ncom/x"), ContentType::Text);
        assert_eq!(classify("https://a.com/\tpath"), ContentType::Text);
        assert_eq!(classify("https://a.com/\u{7f}"), ContentType::Text);
    }

    #[test]
    fn parsed_urls_serialize_as_ascii() {
        let url = parse_web_url("https://例え.jp/パス").unwrap();
        assert!(url.as_str().is_ascii());
        assert_eq!(parse_web_url("https://a.com").unwrap().as_str(), "https://a.com/");
        assert!(parse_web_url("https://a.com/\tpath").is_none());
    }

    #[test]
    fn mailto_requires_local_part_and_dotted_domain() {
        assert_eq!(classify("mailto:@b.com"), ContentType::Text);
        assert_eq!(classify("mailto:a@localhost"), ContentType::Text);
        assert_eq!(classify("mailto:a@@b.com"), ContentType::Text);
        assert_eq!(classify("mailto:a@b..com"), ContentType::Text);
        assert_eq!(classify("mailto:first.last@mail.example.org"), ContentType::Email);
    }

    #[test]
    fn dial_strings_need_seven_to_fifteen_digits() {
        assert_eq!(classify("sms:1234567"), ContentType::Sms);
        assert_eq!(classify("sms:+123456789012345"), ContentType::Sms);
        assert_eq!(classify("sms:123456"), ContentType::Text);
        assert_eq!(classify("tel:+1234567890123456"), ContentType::Text);
        assert_eq!(classify("tel:+1-234-567-89"), ContentType::Text);
        assert_eq!(classify("tel:"), ContentType::Text);
    }

    #[test]
    fn empty_and_odd_input_is_text() {
        assert_eq!(classify(""), ContentType::Text);
        assert_eq!(classify("BEGIN:VCARD\nEND:VCARD"), ContentType::Text);
        assert_eq!(classify("日本語"), ContentType::Text);
    }

    #[test]
    fn classification_is_deterministic() {
        for input in ["https://a.com", "mailto:x@y.z", "plain text", "sms:+1234567"] {
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn only_urls_are_trackable() {
        assert!(ContentType::Url.is_trackable());
        assert!(!ContentType::Email.is_trackable());
        assert!(!ContentType::Text.is_trackable());
    }
}
