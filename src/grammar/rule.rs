//! Compiled rule trees
//!
//! `RuleItem` is the data the parsing engine interprets: terminals,
//! references, sequences, ordered-choice alternations and quantified items.
//! Macro calls and macro parameters only exist between the meta-grammar
//! parse and macro expansion; a `CompiledGrammar` never contains them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grammar::pattern::Pattern;

/// Suffix quantifiers attached to a single grammar item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `?`
    Optional,
    /// `!` — exactly one match, contributing nothing to the tree.
    ExactlyOneSilent,
    /// `-` — succeeds, consuming nothing, only if the item does not match.
    NegativeLookahead,
    /// `/` — suppress the whitespace skip before the following terminal.
    NoSpaceBefore,
}

impl Quantifier {
    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            '*' => Some(Quantifier::ZeroOrMore),
            '+' => Some(Quantifier::OneOrMore),
            '?' => Some(Quantifier::Optional),
            '!' => Some(Quantifier::ExactlyOneSilent),
            '-' => Some(Quantifier::NegativeLookahead),
            '/' => Some(Quantifier::NoSpaceBefore),
            _ => None,
        }
    }

    pub fn suffix(self) -> char {
        match self {
            Quantifier::ZeroOrMore => '*',
            Quantifier::OneOrMore => '+',
            Quantifier::Optional => '?',
            Quantifier::ExactlyOneSilent => '!',
            Quantifier::NegativeLookahead => '-',
            Quantifier::NoSpaceBefore => '/',
        }
    }
}

/// One node of a rule tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleItem {
    Terminal(Pattern),
    Reference {
        name: String,
        /// `name:alt` call-site rename: parse rule `name`, tag the node `alt`.
        rename: Option<String>,
    },
    Sequence(Vec<RuleItem>),
    Alternation(Vec<RuleItem>),
    Quantified(Box<RuleItem>, Quantifier),
    MacroCall {
        name: String,
        args: Vec<RuleItem>,
    },
    MacroParam(String),
}

impl RuleItem {
    pub fn reference(name: impl Into<String>) -> Self {
        RuleItem::Reference {
            name: name.into(),
            rename: None,
        }
    }

    pub fn quantified(item: RuleItem, q: Quantifier) -> Self {
        RuleItem::Quantified(Box::new(item), q)
    }
}

/// A pure template: invoking it substitutes formals with actual argument
/// sub-trees, then re-expands any nested macro calls in the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub params: Vec<String>,
    pub body: RuleItem,
}

/// Precheck facts about one nonterminal, computed once at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Precheck {
    /// A literal that must occur somewhere in the remaining input for any
    /// alternative of the rule to succeed.
    pub required_literal: Option<String>,
    /// When every alternative is known to start with one of a fixed set of
    /// bytes, that set. Lets e.g. an operator reference fail on the first
    /// non-operator character.
    pub first_bytes: Option<Vec<u8>>,
}

/// An immutable compiled grammar: nonterminal name to ordered alternatives,
/// plus the designated whitespace pattern and the tag-shaping sets.
///
/// Built once, never mutated afterwards; safe to share read-only across any
/// number of parse invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledGrammar {
    rules: BTreeMap<String, Vec<RuleItem>>,
    whitespace: Pattern,
    /// Tags whose wrapper node is kept even around a single child
    /// (list-like constructs).
    keep_tags: BTreeSet<String>,
    /// Tags that absorb a single tagged child as a `tag:subtag` refinement.
    refine_tags: BTreeSet<String>,
    prechecks: BTreeMap<String, Precheck>,
}

impl CompiledGrammar {
    pub fn new(
        rules: BTreeMap<String, Vec<RuleItem>>,
        whitespace: Pattern,
        keep_tags: BTreeSet<String>,
        refine_tags: BTreeSet<String>,
    ) -> Self {
        let prechecks = analyze(&rules);
        CompiledGrammar {
            rules,
            whitespace,
            keep_tags,
            refine_tags,
            prechecks,
        }
    }

    pub fn alternatives(&self, name: &str) -> Option<&[RuleItem]> {
        self.rules.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn whitespace(&self) -> &Pattern {
        &self.whitespace
    }

    pub fn is_keep_tag(&self, tag: &str) -> bool {
        self.keep_tags.contains(tag)
    }

    pub fn is_refine_tag(&self, tag: &str) -> bool {
        self.refine_tags.contains(tag)
    }

    pub fn precheck(&self, name: &str) -> Option<&Precheck> {
        self.prechecks.get(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(|s| s.as_str())
    }
}

/// Grammar-specification syntax rendering. Re-compiling the rendered
/// text yields an equivalent rule tree.
impl fmt::Display for RuleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleItem::Terminal(p) => write!(f, "{}", p),
            RuleItem::Reference { name, rename: None } => write!(f, "{}", name),
            RuleItem::Reference {
                name,
                rename: Some(alt),
            } => write!(f, "{}:{}", name, alt),
            RuleItem::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write_grouped(f, item)?;
                }
                Ok(())
            }
            RuleItem::Alternation(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", alt)?;
                }
                Ok(())
            }
            RuleItem::Quantified(inner, q) => {
                write_grouped(f, inner)?;
                write!(f, "{}", q.suffix())
            }
            RuleItem::MacroCall { name, args } => {
                write!(f, "%{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write_grouped(f, arg)?;
                }
                write!(f, ">")
            }
            RuleItem::MacroParam(p) => write!(f, "${}", p),
        }
    }
}

/// Compound items need parentheses in sequence or suffix position.
fn write_grouped(f: &mut fmt::Formatter<'_>, item: &RuleItem) -> fmt::Result {
    match item {
        RuleItem::Sequence(_) | RuleItem::Alternation(_) => write!(f, "({})", item),
        _ => write!(f, "{}", item),
    }
}

impl fmt::Display for CompiledGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} := {}",
            crate::grammar::compiler::SPACE_RULE,
            self.whitespace
        )?;
        for (name, alts) in &self.rules {
            write!(f, "{} := ", name)?;
            for (i, alt) in alts.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{}", alt)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Compute per-rule prechecks.
///
/// `required_literal` is sound only because literals are matched verbatim
/// with no case folding: if the text never contains the literal, no
/// alternative that requires it can succeed anywhere at or after the cursor.
fn analyze(rules: &BTreeMap<String, Vec<RuleItem>>) -> BTreeMap<String, Precheck> {
    let mut out = BTreeMap::new();
    for (name, alts) in rules {
        let mut required: Option<BTreeSet<String>> = None;
        for alt in alts {
            let lits = must_literals(alt);
            required = Some(match required {
                None => lits,
                Some(acc) => acc.intersection(&lits).cloned().collect(),
            });
        }
        let required_literal = required
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|s| s.len());

        let mut first_bytes: Option<Vec<u8>> = Some(Vec::new());
        for alt in alts {
            match (first_bytes.as_mut(), alt_first_bytes(alt)) {
                (Some(acc), Some(bytes)) => {
                    for b in bytes {
                        if !acc.contains(&b) {
                            acc.push(b);
                        }
                    }
                }
                _ => {
                    first_bytes = None;
                    break;
                }
            }
        }

        out.insert(
            name.clone(),
            Precheck {
                required_literal,
                first_bytes,
            },
        );
    }
    out
}

/// Literals that must appear in the input for `item` to match.
fn must_literals(item: &RuleItem) -> BTreeSet<String> {
    match item {
        RuleItem::Terminal(p) => p
            .literal_text()
            .map(|s| {
                let mut set = BTreeSet::new();
                set.insert(s.to_string());
                set
            })
            .unwrap_or_default(),
        RuleItem::Sequence(items) => {
            let mut set = BTreeSet::new();
            for it in items {
                set.extend(must_literals(it));
            }
            set
        }
        RuleItem::Alternation(alts) => {
            let mut iter = alts.iter().map(must_literals);
            match iter.next() {
                None => BTreeSet::new(),
                Some(first) => iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect()),
            }
        }
        RuleItem::Quantified(inner, q) => match q {
            Quantifier::OneOrMore | Quantifier::ExactlyOneSilent | Quantifier::NoSpaceBefore => {
                must_literals(inner)
            }
            _ => BTreeSet::new(),
        },
        _ => BTreeSet::new(),
    }
}

/// Bytes `item` can start with, when that set is statically known.
fn alt_first_bytes(item: &RuleItem) -> Option<Vec<u8>> {
    match item {
        RuleItem::Terminal(Pattern::Literal(s)) | RuleItem::Terminal(Pattern::Mark(s)) => {
            s.as_bytes().first().map(|b| vec![*b])
        }
        RuleItem::Terminal(Pattern::Class(a)) => class_first_bytes(a.src()),
        RuleItem::Sequence(items) => alt_first_bytes(items.first()?),
        RuleItem::Alternation(alts) => {
            let mut acc = Vec::new();
            for alt in alts {
                for b in alt_first_bytes(alt)? {
                    if !acc.contains(&b) {
                        acc.push(b);
                    }
                }
            }
            Some(acc)
        }
        RuleItem::Quantified(inner, q) => match q {
            Quantifier::OneOrMore | Quantifier::ExactlyOneSilent => alt_first_bytes(inner),
            _ => None,
        },
        _ => None,
    }
}

/// Enumerate the bytes of a simple (non-negated, ASCII) character class.
fn class_first_bytes(src: &str) -> Option<Vec<u8>> {
    let body = src.strip_prefix('[')?.strip_suffix(']')?;
    if body.starts_with('^') {
        return None;
    }
    let chars: Vec<char> = body.chars().collect();
    let mut bytes = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            let escaped = *chars.get(i + 1)?;
            if !escaped.is_ascii() {
                return None;
            }
            bytes.push(escaped as u8);
            i += 2;
        } else if i + 2 < chars.len() && chars[i + 1] == '-' {
            let (lo, hi) = (c, chars[i + 2]);
            if !lo.is_ascii() || !hi.is_ascii() || lo > hi {
                return None;
            }
            for b in (lo as u8)..=(hi as u8) {
                bytes.push(b);
            }
            i += 3;
        } else {
            if !c.is_ascii() {
                return None;
            }
            bytes.push(c as u8);
            i += 1;
        }
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar_of(rules: Vec<(&str, Vec<RuleItem>)>) -> CompiledGrammar {
        let map = rules
            .into_iter()
            .map(|(n, alts)| (n.to_string(), alts))
            .collect();
        CompiledGrammar::new(
            map,
            Pattern::regex(r"[ \t]*").unwrap(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
    }

    #[test]
    fn required_literal_is_the_common_one() {
        let g = grammar_of(vec![(
            "PAREN",
            vec![RuleItem::Sequence(vec![
                RuleItem::Terminal(Pattern::Literal("(".into())),
                RuleItem::reference("SEQ"),
                RuleItem::Terminal(Pattern::Literal(")".into())),
            ])],
        )]);
        let pc = g.precheck("PAREN").unwrap();
        // Both parens are required; the tie on length keeps one of them.
        assert!(pc.required_literal.is_some());
    }

    #[test]
    fn optional_literal_is_not_required() {
        let g = grammar_of(vec![(
            "X",
            vec![RuleItem::quantified(
                RuleItem::Terminal(Pattern::Literal(",".into())),
                Quantifier::Optional,
            )],
        )]);
        assert_eq!(g.precheck("X").unwrap().required_literal, None);
    }

    #[test]
    fn class_rule_has_first_byte_set() {
        let g = grammar_of(vec![(
            "OP",
            vec![RuleItem::Terminal(Pattern::class("[-+*/^!]").unwrap())],
        )]);
        let bytes = g.precheck("OP").unwrap().first_bytes.clone().unwrap();
        assert!(bytes.contains(&b'+'));
        assert!(bytes.contains(&b'-'));
        assert!(!bytes.contains(&b'3'));
    }

    #[test]
    fn reference_start_disables_first_bytes() {
        let g = grammar_of(vec![(
            "X",
            vec![RuleItem::Sequence(vec![
                RuleItem::reference("Y"),
                RuleItem::Terminal(Pattern::Literal(";".into())),
            ])],
        )]);
        assert_eq!(g.precheck("X").unwrap().first_bytes, None);
    }

    #[test]
    fn rule_items_render_in_grammar_syntax() {
        let item = RuleItem::Sequence(vec![
            RuleItem::Terminal(Pattern::Literal("(".into())),
            RuleItem::quantified(RuleItem::reference("NUM"), Quantifier::OneOrMore),
            RuleItem::Terminal(Pattern::Literal(")".into())),
        ]);
        assert_eq!(item.to_string(), "\"(\" NUM+ \")\"");

        let renamed = RuleItem::Reference {
            name: "NUM".into(),
            rename: Some("COUNT".into()),
        };
        assert_eq!(renamed.to_string(), "NUM:COUNT");

        let grouped = RuleItem::quantified(
            RuleItem::Alternation(vec![
                RuleItem::reference("A"),
                RuleItem::reference("B"),
            ]),
            Quantifier::ZeroOrMore,
        );
        assert_eq!(grouped.to_string(), "(A | B)*");
    }

    #[test]
    fn class_ranges_expand() {
        assert_eq!(
            class_first_bytes("[a-c]"),
            Some(vec![b'a', b'b', b'c'])
        );
        assert_eq!(class_first_bytes("[^a]"), None);
    }
}
