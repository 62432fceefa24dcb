//! Command vocabulary: label synonyms, colors, number words and plural forms.

/// Canonical label followed by every spoken form that maps to it.
const OBJECT_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "person",
        &[
            "person", "people", "someone", "man", "men", "woman", "women", "kid", "kids",
            "child", "children", "girl", "boy",
        ],
    ),
    ("dog", &["dog", "puppy"]),
    ("cat", &["cat", "kitten"]),
    ("car", &["car", "vehicle", "sedan", "auto"]),
    ("bicycle", &["bicycle", "bike", "cycle"]),
    ("chair", &["chair", "seat"]),
    ("bottle", &["bottle"]),
    ("cup", &["cup", "mug"]),
    ("backpack", &["backpack", "bag", "rucksack"]),
];

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("bus", "buses"),
    ("knife", "knives"),
    ("mouse", "mice"),
    ("glass", "glasses"),
];

pub const COLORS: &[&str] = &[
    "red", "green", "blue", "yellow", "black", "white", "gray", "brown", "orange", "purple",
    "pink",
];

const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

/// Maps a single lowercase token to its canonical label.
///
/// Plural forms built with `-s` or `-es` on top of a known synonym resolve too, so
/// "dogs" and "bikes" work without listing them.
pub fn canonical_label(token: &str) -> Option<&'static str> {
    let lookup = |word: &str| {
        OBJECT_SYNONYMS
            .iter()
            .find(|(_, synonyms)| synonyms.contains(&word))
            .map(|(canonical, _)| *canonical)
    };
    lookup(token)
        .or_else(|| token.strip_suffix("es").and_then(lookup))
        .or_else(|| token.strip_suffix('s').and_then(lookup))
}

/// Parses digits or an English number word up to ten.
pub fn parse_count(word: &str) -> Option<u32> {
    let word = word.trim().to_lowercase();
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
        return word.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .position(|w| *w == word)
        .map(|n| n as u32)
}

/// Returns the form of `word` to use next to `count`.
pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        return word.to_string();
    }
    IRREGULAR_PLURALS
        .iter()
        .find(|(singular, _)| *singular == word)
        .map(|(_, plural)| plural.to_string())
        .unwrap_or_else(|| format!("{word}s"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_resolve_to_canonical_labels() {
        assert_eq!(canonical_label("people"), Some("person"));
        assert_eq!(canonical_label("puppy"), Some("dog"));
        assert_eq!(canonical_label("dogs"), Some("dog"));
        assert_eq!(canonical_label("bikes"), Some("bicycle"));
        assert_eq!(canonical_label("table"), None);
    }

    #[test]
    fn pluralize_uses_irregular_table_first() {
        assert_eq!(pluralize("person", 1), "person");
        assert_eq!(pluralize("person", 2), "people");
        assert_eq!(pluralize("chair", 2), "chairs");
        assert_eq!(pluralize("chair", 0), "chairs");
    }

    #[test]
    fn counts_accept_digits_and_words() {
        assert_eq!(parse_count("2"), Some(2));
        assert_eq!(parse_count("two"), Some(2));
        assert_eq!(parse_count("Ten"), Some(10));
        assert_eq!(parse_count("eleven"), None);
        assert_eq!(parse_count("people"), None);
    }
}
