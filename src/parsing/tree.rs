//! Syntax trees
//!
//! The engine produces `SyntaxTree` values: a leaf token or a tagged node
//! whose tag may carry a `:subtag` refinement (e.g. a numeric literal tagged
//! `NUM:REAL` vs `NUM:INT`). Trees are produced fresh per parse call and
//! owned exclusively by the caller; nothing downstream mutates a tag.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyntaxTree {
    Leaf(String),
    Node {
        tag: String,
        subtag: Option<String>,
        children: Vec<SyntaxTree>,
    },
}

impl SyntaxTree {
    pub fn leaf(text: impl Into<String>) -> Self {
        SyntaxTree::Leaf(text.into())
    }

    pub fn node(tag: impl Into<String>, children: Vec<SyntaxTree>) -> Self {
        SyntaxTree::Node {
            tag: tag.into(),
            subtag: None,
            children,
        }
    }

    pub fn refined(
        tag: impl Into<String>,
        subtag: impl Into<String>,
        children: Vec<SyntaxTree>,
    ) -> Self {
        SyntaxTree::Node {
            tag: tag.into(),
            subtag: Some(subtag.into()),
            children,
        }
    }

    /// The node tag, if this is a node.
    pub fn tag(&self) -> Option<&str> {
        match self {
            SyntaxTree::Leaf(_) => None,
            SyntaxTree::Node { tag, .. } => Some(tag),
        }
    }

    pub fn subtag(&self) -> Option<&str> {
        match self {
            SyntaxTree::Leaf(_) => None,
            SyntaxTree::Node { subtag, .. } => subtag.as_deref(),
        }
    }

    pub fn children(&self) -> &[SyntaxTree] {
        match self {
            SyntaxTree::Leaf(_) => &[],
            SyntaxTree::Node { children, .. } => children,
        }
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            SyntaxTree::Leaf(s) => Some(s),
            SyntaxTree::Node { .. } => None,
        }
    }

    pub fn is_tagged(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    /// Concatenated text of all leaf descendants, in order.
    pub fn leaf_text(&self) -> String {
        match self {
            SyntaxTree::Leaf(s) => s.clone(),
            SyntaxTree::Node { children, .. } => {
                children.iter().map(|c| c.leaf_text()).collect()
            }
        }
    }
}

/// Compact s-expression rendering: `(TAG:SUB child ...)`, leaves quoted.
impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxTree::Leaf(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            SyntaxTree::Node {
                tag,
                subtag,
                children,
            } => {
                write!(f, "({}", tag)?;
                if let Some(sub) = subtag {
                    write!(f, ":{}", sub)?;
                }
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact_sexpr() {
        let tree = SyntaxTree::node(
            "LIST",
            vec![
                SyntaxTree::refined("NUM", "INT", vec![SyntaxTree::leaf("1")]),
                SyntaxTree::refined("NUM", "INT", vec![SyntaxTree::leaf("2")]),
            ],
        );
        assert_eq!(tree.to_string(), r#"(LIST (NUM:INT "1") (NUM:INT "2"))"#);
    }

    #[test]
    fn leaf_text_concatenates_in_order() {
        let tree = SyntaxTree::node(
            "REAL",
            vec![
                SyntaxTree::leaf("1.5"),
                SyntaxTree::node("EXPO", vec![SyntaxTree::leaf("e3")]),
            ],
        );
        assert_eq!(tree.leaf_text(), "1.5e3");
    }

    #[test]
    fn display_escapes_quotes() {
        let tree = SyntaxTree::leaf(r#"say "hi""#);
        assert_eq!(tree.to_string(), r#""say \"hi\"""#);
    }
}
