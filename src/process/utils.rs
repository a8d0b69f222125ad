use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[[:punct:]\s]+$").expect("punctuation regex should compile"));

/// Drop embedded line breaks and surrounding whitespace from a header cell.
/// The export wraps some long question texts over several lines. Export
/// headers and mapping-tab names both go through here so they compare equal.
pub fn normalize_column_name(raw: &str) -> String {
    let joined: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    joined.trim().to_string()
}

/// Non-blank and nothing but ASCII punctuation and whitespace (`", "`, `"."`).
pub fn is_punctuation_only(s: &str) -> bool {
    PUNCTUATION_ONLY.is_match(s)
}

/// Has a letter and no lower-case letters.
pub fn is_shouting(s: &str) -> bool {
    s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
/// `"ST. MARY'S WARD"` becomes `"St. Mary'S Ward"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_newlines_are_removed() {
        assert_eq!(
            normalize_column_name("Which issues\nmatter\r\n to you?"),
            "Which issuesmatter to you?"
        );
        assert_eq!(normalize_column_name(" Why \n"), "Why");
    }

    #[test]
    fn punctuation_only() {
        assert!(is_punctuation_only(", "));
        assert!(is_punctuation_only(","));
        assert!(is_punctuation_only(" - . "));
        assert!(!is_punctuation_only(""));
        assert!(!is_punctuation_only("1, High St"));
    }

    #[test]
    fn title_casing() {
        assert!(is_shouting("NEWCASTLE-UPON-TYNE"));
        assert!(!is_shouting("Leeds"));
        assert!(!is_shouting("123"));
        assert_eq!(title_case("NEWCASTLE-UPON-TYNE"), "Newcastle-Upon-Tyne");
        assert_eq!(title_case("ST. MARY'S WARD"), "St. Mary'S Ward");
    }
}
