//! Character-policy sanitizer for names, tag keys, and tag values.
//!
//! Every string that ends up in a map key or a reporter call passes through
//! here first. Characters outside the configured ranges/characters are
//! replaced with the replacement character.

use std::sync::Arc;

use serde::Deserialize;

/// Default replacement character.
pub const DEFAULT_REPLACEMENT_CHARACTER: char = '_';

/// Inclusive character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharRange {
    pub low: char,
    pub high: char,
}

impl CharRange {
    pub const fn new(low: char, high: char) -> Self {
        Self { low, high }
    }

    fn contains(&self, c: char) -> bool {
        self.low <= c && c <= self.high
    }
}

/// `[a-zA-Z0-9]`
pub const ALPHANUMERIC_RANGE: [CharRange; 3] = [
    CharRange::new('a', 'z'),
    CharRange::new('A', 'Z'),
    CharRange::new('0', '9'),
];

/// `-` and `_`
pub const UNDERSCORE_DASH_CHARACTERS: [char; 2] = ['-', '_'];

/// `-`, `_`, and `.`
pub const UNDERSCORE_DASH_DOT_CHARACTERS: [char; 3] = ['-', '_', '.'];

/// Allowed characters for one string class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidCharacters {
    #[serde(default)]
    pub ranges: Vec<CharRange>,
    #[serde(default)]
    pub characters: Vec<char>,
}

impl ValidCharacters {
    /// Alphanumerics plus the given extra characters.
    pub fn alphanumeric_with(extra: &[char]) -> Self {
        Self {
            ranges: ALPHANUMERIC_RANGE.to_vec(),
            characters: extra.to_vec(),
        }
    }

    fn allows(&self, c: char) -> bool {
        self.ranges.iter().any(|r| r.contains(c)) || self.characters.contains(&c)
    }

    fn apply(&self, s: &str, replacement: char) -> String {
        if s.chars().all(|c| self.allows(c)) {
            return s.to_owned();
        }
        s.chars()
            .map(|c| if self.allows(c) { c } else { replacement })
            .collect()
    }
}

/// Sanitization policy for each string class. `None` leaves that class as is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SanitizeOptions {
    #[serde(default)]
    pub name_characters: Option<ValidCharacters>,
    #[serde(default)]
    pub key_characters: Option<ValidCharacters>,
    #[serde(default)]
    pub value_characters: Option<ValidCharacters>,
    #[serde(default = "default_replacement_character")]
    pub replacement_character: char,
}

fn default_replacement_character() -> char {
    DEFAULT_REPLACEMENT_CHARACTER
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            name_characters: None,
            key_characters: None,
            value_characters: None,
            replacement_character: DEFAULT_REPLACEMENT_CHARACTER,
        }
    }
}

/// Maps raw strings to reporter-safe strings. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub enum Sanitizer {
    /// Pass-through.
    #[default]
    NoOp,
    /// Character policy.
    Policy(Arc<SanitizeOptions>),
}

impl Sanitizer {
    pub fn new(opts: SanitizeOptions) -> Self {
        Sanitizer::Policy(Arc::new(opts))
    }

    /// Sanitize a metric name, prefix, or separator.
    pub fn name(&self, s: &str) -> String {
        self.apply(s, |o| o.name_characters.as_ref())
    }

    /// Sanitize a tag key.
    pub fn key(&self, s: &str) -> String {
        self.apply(s, |o| o.key_characters.as_ref())
    }

    /// Sanitize a tag value.
    pub fn value(&self, s: &str) -> String {
        self.apply(s, |o| o.value_characters.as_ref())
    }

    fn apply<F>(&self, s: &str, pick: F) -> String
    where
        F: Fn(&SanitizeOptions) -> Option<&ValidCharacters>,
    {
        match self {
            Sanitizer::NoOp => s.to_owned(),
            Sanitizer::Policy(opts) => match pick(opts) {
                Some(valid) => valid.apply(s, opts.replacement_character),
                None => s.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Sanitizer {
        Sanitizer::new(SanitizeOptions {
            name_characters: Some(ValidCharacters::alphanumeric_with(&UNDERSCORE_DASH_DOT_CHARACTERS)),
            key_characters: Some(ValidCharacters::alphanumeric_with(&UNDERSCORE_DASH_CHARACTERS)),
            value_characters: None,
            replacement_character: DEFAULT_REPLACEMENT_CHARACTER,
        })
    }

    #[test]
    fn noop_passes_through() {
        assert_eq!(Sanitizer::NoOp.name("a b:c"), "a b:c");
    }

    #[test]
    fn replaces_disallowed_characters() {
        let s = policy();
        assert_eq!(s.name("http.req count"), "http.req_count");
        assert_eq!(s.key("host.name"), "host_name");
    }

    #[test]
    fn unset_class_is_untouched() {
        assert_eq!(policy().value("a b.c"), "a b.c");
    }
}
