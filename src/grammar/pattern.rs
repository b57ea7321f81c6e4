//! Terminal patterns
//!
//! A `Pattern` is the matching side of a terminal grammar item: a quoted
//! literal, a bare discard-mark, a slash-delimited regex or a bracket
//! character class. Patterns are immutable once built and always match
//! anchored at the current cursor, never searching ahead.

use std::fmt;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compiled regex kept together with its source text, so compiled
/// grammars can be serialized and the regex recompiled on load.
#[derive(Debug, Clone)]
pub struct Anchored {
    src: String,
    re: Regex,
}

impl Anchored {
    /// Compile `src`, anchored at the match position.
    pub fn new(src: &str) -> Result<Self, PatternError> {
        let re = Regex::new(&format!("^(?:{})", src)).map_err(|e| PatternError {
            src: src.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Anchored {
            src: src.to_string(),
            re,
        })
    }

    /// The original pattern text (without anchoring).
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Length of the match at the start of `text`, if any.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        self.re.find(text).map(|m| m.end())
    }
}

impl PartialEq for Anchored {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
    }
}

impl Eq for Anchored {}

impl Serialize for Anchored {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.src)
    }
}

impl<'de> Deserialize<'de> for Anchored {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let src = String::deserialize(deserializer)?;
        Anchored::new(&src).map_err(D::Error::custom)
    }
}

/// A terminal matcher.
///
/// Literals and marks are silent: they must appear in the input but
/// contribute no child to the syntax tree. Regex and class terminals
/// contribute the matched text as a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Quoted literal, matched verbatim.
    Literal(String),
    /// Bare discard-mark: the text must appear but carries no semantic tag.
    Mark(String),
    /// Slash-delimited regex.
    Regex(Anchored),
    /// Bracket character class.
    Class(Anchored),
}

impl Pattern {
    /// Build a regex terminal from the pattern body (without slashes).
    pub fn regex(src: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Anchored::new(src)?))
    }

    /// Build a character-class terminal from the bracketed class text.
    pub fn class(src: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Class(Anchored::new(src)?))
    }

    /// Whether a match contributes no child to the tree.
    pub fn is_silent(&self) -> bool {
        matches!(self, Pattern::Literal(_) | Pattern::Mark(_))
    }

    /// The verbatim text of a literal or mark.
    pub fn literal_text(&self) -> Option<&str> {
        match self {
            Pattern::Literal(s) | Pattern::Mark(s) => Some(s),
            _ => None,
        }
    }

    /// Length of the match at the start of `text`, if any.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        match self {
            Pattern::Literal(s) | Pattern::Mark(s) => {
                if !s.is_empty() && text.starts_with(s.as_str()) {
                    Some(s.len())
                } else {
                    None
                }
            }
            Pattern::Regex(a) | Pattern::Class(a) => a.match_len(text),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "\"{}\"", s),
            Pattern::Mark(s) => write!(f, "{}", s),
            Pattern::Regex(a) => write!(f, "/{}/", a.src()),
            Pattern::Class(a) => write!(f, "{}", a.src()),
        }
    }
}

/// A terminal pattern that failed to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternError {
    pub src: String,
    pub reason: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pattern '{}': {}", self.src, self.reason)
    }
}

impl std::error::Error for PatternError {}
