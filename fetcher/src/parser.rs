//! Extraction of location codes from free-form text.

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use regex::Regex;

/// Characters dropped before tokenizing, so `L07-R2 (C3)` reads as `L07R2C3`.
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-()]+").unwrap());
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([LRC])0*(\d+)").unwrap());

/// Identifies a physical storage location by level, row and column.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LocationKey {
    pub level: u32,
    pub row: u32,
    pub column: u32,
}

impl LocationKey {
    pub fn new(level: u32, row: u32, column: u32) -> Self {
        Self { level, row, column }
    }
}

/// Formats the key as its canonical label, e.g. `L07-R02-C13`.
impl Display for LocationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{:02}-R{:02}-C{:02}", self.level, self.row, self.column)
    }
}

#[derive(Default)]
struct Partial {
    level: Option<u32>,
    row: Option<u32>,
    column: Option<u32>,
}

impl Partial {
    fn complete(&self) -> Option<LocationKey> {
        Some(LocationKey::new(self.level?, self.row?, self.column?))
    }
}

/// Parses every complete location code in `text`, in order of appearance.
///
/// A code is complete once an `L`, an `R` and a `C` token have all been seen since the
/// previous code. A letter seen twice before that overwrites its earlier value, and a trailing
/// incomplete code is dropped. Text without any complete code gives an empty result.
pub fn parse_locations(text: &str) -> Vec<LocationKey> {
    let cleaned = SEPARATORS.replace_all(&text.to_uppercase(), "").into_owned();

    let mut keys = Vec::new();
    let mut partial = Partial::default();

    for token in TOKEN.captures_iter(&cleaned) {
        let Ok(value) = token[2].parse::<u32>() else {
            continue;
        };
        match &token[1] {
            "L" => partial.level = Some(value),
            "R" => partial.row = Some(value),
            _ => partial.column = Some(value),
        }
        if let Some(key) = partial.complete() {
            keys.push(key);
            partial = Partial::default();
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(level: u32, row: u32, column: u32) -> LocationKey {
        LocationKey::new(level, row, column)
    }

    #[test]
    fn ignores_separators() {
        assert_eq!(parse_locations("L07-R2(C3)"), vec![key(7, 2, 3)]);
    }

    #[test]
    fn strips_leading_zeros_only() {
        assert_eq!(parse_locations("L0007R02C03"), vec![key(7, 2, 3)]);
        assert_eq!(parse_locations("L0010R100C0"), vec![key(10, 100, 0)]);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(parse_locations("l1 r2 c3"), vec![key(1, 2, 3)]);
    }

    #[test]
    fn drops_incomplete_trailing_code() {
        assert!(parse_locations("L1R2").is_empty());
        assert_eq!(parse_locations("L1R2C3 L4R5"), vec![key(1, 2, 3)]);
    }

    #[test]
    fn last_repeated_letter_wins() {
        assert_eq!(parse_locations("L1L2R3C4"), vec![key(2, 3, 4)]);
    }

    #[test]
    fn letters_may_come_in_any_order() {
        assert_eq!(parse_locations("C3R2L1"), vec![key(1, 2, 3)]);
    }

    #[test]
    fn finds_several_codes_in_pasted_text() {
        let text = "Parts: L01-R02-C03, L01-R02-C04\nand (L2 R10 C1)";
        assert_eq!(
            parse_locations(text),
            vec![key(1, 2, 3), key(1, 2, 4), key(2, 10, 1)],
        );
    }

    #[test]
    fn unparseable_text_is_empty() {
        assert!(parse_locations("").is_empty());
        assert!(parse_locations("hello world").is_empty());
        assert!(parse_locations("LRC").is_empty());
    }

    #[test]
    fn skips_values_too_large() {
        assert_eq!(parse_locations("L99999999999L1R2C3"), vec![key(1, 2, 3)]);
    }

    #[test]
    fn label_is_zero_padded() {
        assert_eq!(key(7, 2, 13).to_string(), "L07-R02-C13");
        assert_eq!(key(100, 0, 5).to_string(), "L100-R00-C05");
    }
}
