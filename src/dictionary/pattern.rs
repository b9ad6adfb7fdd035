//! Wildcard pattern compilation.
//!
//! Supports the following wildcards:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `\*` and `\?` match literal `*` and `?` characters

use std::sync::Arc;

use regex::Regex;

use crate::error::{FalxError, Result};

/// Check whether a value contains an unescaped wildcard character.
pub fn contains_wildcard(value: &str) -> bool {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

/// A compiled wildcard pattern.
///
/// Besides the anchored regex, compilation extracts the literal prefix before
/// the first wildcard. A non-empty prefix lets the dictionary scan only the
/// key range starting with it; an empty prefix forces a scan of every term in
/// the field.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    pattern: String,
    regex: Arc<Regex>,
    prefix: String,
}

impl WildcardPattern {
    /// Compile a wildcard pattern.
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut regex_pattern = String::new();
        regex_pattern.push('^');

        let mut prefix = String::new();
        let mut prefix_done = false;

        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    if i + 1 < chars.len() {
                        let next = chars[i + 1];
                        match next {
                            '*' => regex_pattern.push_str("\\*"),
                            '?' => regex_pattern.push_str("\\?"),
                            c => {
                                regex_pattern.push('\\');
                                regex_pattern.push(c);
                            }
                        }
                        if !prefix_done {
                            prefix.push(next);
                        }
                        i += 1;
                    } else {
                        // Trailing backslash matches itself.
                        regex_pattern.push_str("\\\\");
                        if !prefix_done {
                            prefix.push('\\');
                        }
                    }
                }
                '*' => {
                    regex_pattern.push_str(".*");
                    prefix_done = true;
                }
                '?' => {
                    regex_pattern.push('.');
                    prefix_done = true;
                }
                // Regex special characters that need escaping.
                '^' | '$' | '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '|' => {
                    regex_pattern.push('\\');
                    regex_pattern.push(chars[i]);
                    if !prefix_done {
                        prefix.push(chars[i]);
                    }
                }
                c => {
                    regex_pattern.push(c);
                    if !prefix_done {
                        prefix.push(c);
                    }
                }
            }
            i += 1;
        }

        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern)
            .map_err(|e| FalxError::validation(format!("invalid wildcard pattern: {e}")))?;

        Ok(WildcardPattern {
            pattern: pattern.to_string(),
            regex: Arc::new(regex),
            prefix,
        })
    }

    /// Get the original wildcard pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Get the literal prefix before the first wildcard.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A pattern with no literal prefix has to scan every term in the field.
    pub fn is_expensive(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Check if a term matches the pattern.
    pub fn matches(&self, term: &str) -> bool {
        self.regex.is_match(term)
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for WildcardPattern {}
