//! Template tokens: `{TOKEN}` placeholders resolved against a file's
//! metadata and the running sequence number.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::metadata::FileInfo;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("Invalid token regex"));

/// Every token a template may contain, in the order editors list them.
pub const TOKENS: &[&str] = &[
    "ORIGINAL FILENAME",
    "YYYY",
    "YY",
    "MONTH",
    "Month",
    "MON",
    "Mon",
    "MM",
    "DAY",
    "Day",
    "DDD",
    "Ddd",
    "DD",
    "HOUR",
    "MINUTE",
    "SECOND",
    "TITLE",
    "CREATOR",
    "COPYRIGHT",
    "MAKE",
    "MODEL",
    "DIMENSIONS",
    "SHUTTER SPEED",
    "APERTURE",
    "ISO",
    "FOCAL LENGTH",
    "XX",
    "XXX",
    "XXXX",
    "XXXXX",
    "XXXXXX",
    "XXXXXXX",
];

/// Width of a sequence token (`XX` → 2 … `XXXXXXX` → 7).
fn sequence_width(name: &str) -> Option<usize> {
    (2..=7)
        .contains(&name.len())
        .then_some(name.len())
        .filter(|_| name.bytes().all(|b| b == b'X'))
}

pub fn is_known(name: &str) -> bool {
    TOKENS.contains(&name)
}

pub fn uses_sequence(template: &str) -> bool {
    TOKEN_RE
        .captures_iter(template)
        .any(|caps| sequence_width(&caps[1]).is_some())
}

/// Names between braces that are not tokens. They are kept as literal text
/// by [`resolve`]; editors use this to warn about typos.
pub fn unknown_tokens(template: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|name| !is_known(name))
        .collect()
}

fn text(value: &Option<String>) -> Cow<'_, str> {
    Cow::Borrowed(value.as_deref().unwrap_or(""))
}

fn token_value<'a>(info: &'a FileInfo, name: &str, sequence: u64) -> Option<Cow<'a, str>> {
    if let Some(width) = sequence_width(name) {
        return Some(Cow::Owned(format!("{:0width$}", sequence)));
    }

    let date = |fmt: &str| -> Cow<'a, str> {
        info.created
            .map(|dt| Cow::Owned(dt.format(fmt).to_string()))
            .unwrap_or(Cow::Borrowed(""))
    };

    let value = match name {
        "ORIGINAL FILENAME" => Cow::Owned(info.base_name()),
        "YYYY" => date("%Y"),
        "YY" => date("%y"),
        "MONTH" => Cow::Owned(date("%B").to_uppercase()),
        "Month" => date("%B"),
        "MON" => Cow::Owned(date("%b").to_uppercase()),
        "Mon" => date("%b"),
        "MM" => date("%m"),
        "DAY" => Cow::Owned(date("%A").to_uppercase()),
        "Day" => date("%A"),
        "DDD" => Cow::Owned(date("%a").to_uppercase()),
        "Ddd" => date("%a"),
        "DD" => date("%d"),
        "HOUR" => date("%H"),
        "MINUTE" => date("%M"),
        "SECOND" => date("%S"),
        "TITLE" => text(&info.title),
        "CREATOR" => text(&info.creator),
        "COPYRIGHT" => text(&info.copyright),
        "MAKE" => text(&info.make),
        "MODEL" => text(&info.model),
        "DIMENSIONS" => match (info.width, info.height) {
            (Some(w), Some(h)) => Cow::Owned(format!("{}x{}", w, h)),
            _ => Cow::Borrowed(""),
        },
        "SHUTTER SPEED" => text(&info.exposure_time),
        "APERTURE" => text(&info.aperture),
        "ISO" => text(&info.iso),
        "FOCAL LENGTH" => text(&info.focal_length),
        _ => return None,
    };
    Some(value)
}

/// Replaces every known `{TOKEN}` in `template`. Unknown names and unmatched
/// braces are copied through unchanged.
pub fn resolve(info: &FileInfo, template: &str, sequence: u64) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &Captures| match token_value(info, &caps[1], sequence) {
            Some(value) => value.into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> FileInfo {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap();
        FileInfo {
            make: Some("Canon".into()),
            model: Some("EOS R5".into()),
            width: Some(8192),
            height: Some(5464),
            ..FileInfo::new("/card/DCIM/IMG_1234.CR3").with_created(created)
        }
    }

    #[test]
    fn literal_templates_are_unchanged() {
        for template in ["", "plain", "no tokens here/at all", "100% {", "}{", "{}"] {
            assert_eq!(resolve(&sample(), template, 42), template);
        }
    }

    #[test]
    fn resolves_date_tokens() {
        let info = sample();
        assert_eq!(resolve(&info, "{YYYY}-{MM}-{DD}", 0), "2024-01-01");
        assert_eq!(resolve(&info, "{YY}{MON}{Mon}", 0), "24JANJan");
        assert_eq!(resolve(&info, "{MONTH} {Month}", 0), "JANUARY January");
        assert_eq!(resolve(&info, "{DAY} {Day} {DDD} {Ddd}", 0), "MONDAY Monday MON Mon");
        assert_eq!(resolve(&info, "{HOUR}{MINUTE}{SECOND}", 0), "070509");
    }

    #[test]
    fn resolves_descriptive_tokens() {
        let info = sample();
        assert_eq!(resolve(&info, "{ORIGINAL FILENAME}", 0), "IMG_1234");
        assert_eq!(resolve(&info, "{MAKE} {MODEL} {DIMENSIONS}", 0), "Canon EOS R5 8192x5464");
        assert_eq!(resolve(&info, "[{TITLE}][{ISO}]", 0), "[][]");
    }

    #[test]
    fn sequence_tokens_are_zero_padded_to_their_width() {
        let info = sample();
        for width in 2..=7 {
            let template = format!("{{{}}}", "X".repeat(width));
            for seq in [0, 1, 7, 42] {
                let out = resolve(&info, &template, seq);
                assert_eq!(out.len(), width);
                assert!(out.bytes().all(|b| b.is_ascii_digit()));
                assert_eq!(out.parse::<u64>().unwrap(), seq);
            }
        }
    }

    #[test]
    fn unknown_tokens_and_open_braces_stay_literal() {
        let info = sample();
        assert_eq!(resolve(&info, "{YYYYY}_{X}_{XXXXXXXX}", 3), "{YYYYY}_{X}_{XXXXXXXX}");
        assert_eq!(resolve(&info, "{YYYY", 0), "{YYYY");
        assert_eq!(resolve(&info, "{{YYYY}", 0), "{2024");
        assert_eq!(unknown_tokens("{YYYY}{year}{XX}{Foo}"), vec!["year", "Foo"]);
    }

    #[test]
    fn missing_date_resolves_empty() {
        let info = FileInfo::new("a.jpg");
        assert_eq!(resolve(&info, "{YYYY}-{MM}_{XXX}", 5), "-_005");
    }

    #[test]
    fn detects_sequence_tokens() {
        assert!(uses_sequence("{YYYY}_{XXXX}"));
        assert!(!uses_sequence("{YYYY}_XXXX"));
        assert!(!uses_sequence("{X}"));
    }
}
