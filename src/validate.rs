use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_TOPIC_CHARS: usize = 100;

lazy_static! {
    // Latin letters, whitespace, apostrophes, periods, hyphens
    static ref NAME_SHAPE: Regex = Regex::new(r"^[\p{Latin}\s'.\-]+$").unwrap();
    static ref INNER_SPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Blunt name-shaped filter. Says nothing about whether the name is real.
pub fn is_valid_topic(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_TOPIC_CHARS {
        return false;
    }
    NAME_SHAPE.is_match(trimmed)
}

/// Trim and collapse runs of whitespace to single spaces.
pub fn normalize_topic(raw: &str) -> String {
    INNER_SPACE.replace_all(raw.trim(), " ").into_owned()
}
