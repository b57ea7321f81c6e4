//! Grammar compiler
//!
//! Parses a grammar-specification document line by line with the bootstrap
//! meta-grammar, refactors each raw rule tree into a `RuleItem` tree,
//! expands macros, downgrades dangling references to discard-marks, and
//! produces an immutable `CompiledGrammar`.
//!
//! All errors here are build-time and fatal: the grammar cannot be used
//! until its specification is fixed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::grammar::meta;
use crate::grammar::pattern::{Pattern, PatternError};
use crate::grammar::rule::{CompiledGrammar, Macro, Quantifier, RuleItem};
use crate::parsing::tree::SyntaxTree;

/// Reserved rule name defining the whitespace pattern.
pub const SPACE_RULE: &str = "SPACE";

/// Tag-shaping configuration carried into the compiled grammar.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub keep_tags: BTreeSet<String>,
    pub refine_tags: BTreeSet<String>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        CompilerOptions::default()
    }

    /// Tags whose wrapper survives even around a single child.
    pub fn keep(mut self, tags: &[&str]) -> Self {
        self.keep_tags.extend(tags.iter().map(|s| s.to_string()));
        self
    }

    /// Tags that absorb a single tagged child as a `tag:subtag` refinement.
    pub fn refine(mut self, tags: &[&str]) -> Self {
        self.refine_tags.extend(tags.iter().map(|s| s.to_string()));
        self
    }
}

/// Grammar-build errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    SpecSyntax { line: usize, detail: String },
    UndefinedMacro { name: String },
    MacroArity { name: String, expected: usize, got: usize },
    UnboundMacroParam { name: String },
    MacroRecursion { name: String },
    BadPattern(PatternError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::SpecSyntax { line, detail } => {
                write!(f, "grammar line {}: {}", line, detail)
            }
            CompileError::UndefinedMacro { name } => write!(f, "undefined macro '%{}'", name),
            CompileError::MacroArity {
                name,
                expected,
                got,
            } => write!(
                f,
                "macro '%{}' expects {} argument(s), got {}",
                name, expected, got
            ),
            CompileError::UnboundMacroParam { name } => {
                write!(f, "unbound macro parameter '${}'", name)
            }
            CompileError::MacroRecursion { name } => {
                write!(f, "macro '%{}' expands through itself", name)
            }
            CompileError::BadPattern(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<PatternError> for CompileError {
    fn from(e: PatternError) -> Self {
        CompileError::BadPattern(e)
    }
}

/// Compile a grammar-specification document.
pub fn compile(text: &str, options: CompilerOptions) -> Result<CompiledGrammar, CompileError> {
    let mut rules: BTreeMap<String, Vec<RuleItem>> = BTreeMap::new();
    let mut macros: BTreeMap<String, Macro> = BTreeMap::new();
    let mut whitespace = Pattern::regex(r"[ \t]*")?;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let tree = meta::parse_rule_line(line, lineno)?;
        match tree.tag() {
            Some("RULEDEF") => {
                let name = child(&tree, 0, lineno)?.leaf_text();
                if name.contains(':') {
                    return Err(CompileError::SpecSyntax {
                        line: lineno,
                        detail: format!("rule name '{}' may not contain ':'", name),
                    });
                }
                let body = build_item(child(&tree, 1, lineno)?, lineno)?;
                if name == SPACE_RULE {
                    whitespace = space_pattern(body, lineno)?;
                } else {
                    rules.entry(name).or_default().extend(into_alternatives(body));
                }
            }
            Some("MACRODEF") => {
                let name = child(&tree, 0, lineno)?
                    .leaf_text()
                    .trim_start_matches('%')
                    .to_string();
                let params = child(&tree, 1, lineno)?
                    .children()
                    .iter()
                    .map(|p| p.leaf_text().trim_start_matches('$').to_string())
                    .collect();
                let body = build_item(child(&tree, 2, lineno)?, lineno)?;
                macros.insert(name, Macro { params, body });
            }
            _ => {
                return Err(CompileError::SpecSyntax {
                    line: lineno,
                    detail: format!("not a rule definition: '{}'", line),
                })
            }
        }
    }

    for alts in rules.values_mut() {
        for alt in alts.iter_mut() {
            *alt = expand(alt.clone(), &macros, &mut Vec::new())?;
        }
    }
    for alts in rules.values() {
        for alt in alts {
            check_no_params(alt)?;
        }
    }

    let known: BTreeSet<String> = rules.keys().cloned().collect();
    for alts in rules.values_mut() {
        for alt in alts.iter_mut() {
            downgrade(alt, &known);
        }
    }

    Ok(CompiledGrammar::new(
        rules,
        whitespace,
        options.keep_tags,
        options.refine_tags,
    ))
}

/// Strip a trailing `## comment`, ignoring `##` inside quoted literals,
/// regexes and character classes.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut delim: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match delim {
            Some(close) => {
                if b == b'\\' {
                    i += 1;
                } else if b == close {
                    delim = None;
                }
            }
            None => match b {
                b'"' => delim = Some(b'"'),
                b'[' => delim = Some(b']'),
                // a slash directly after an atom is a suffix quantifier,
                // not a regex opener
                b'/' => {
                    let opens = i == 0
                        || matches!(bytes[i - 1], b' ' | b'\t' | b'(' | b'|' | b'<');
                    if opens {
                        delim = Some(b'/');
                    }
                }
                b'#' if i + 1 < bytes.len() && bytes[i + 1] == b'#' => {
                    return &line[..i];
                }
                _ => {}
            },
        }
        i += 1;
    }
    line
}

fn child<'a>(tree: &'a SyntaxTree, idx: usize, lineno: usize) -> Result<&'a SyntaxTree, CompileError> {
    tree.children().get(idx).ok_or_else(|| CompileError::SpecSyntax {
        line: lineno,
        detail: "incomplete rule tree".to_string(),
    })
}

fn into_alternatives(body: RuleItem) -> Vec<RuleItem> {
    match body {
        RuleItem::Alternation(alts) => alts,
        other => vec![other],
    }
}

fn space_pattern(body: RuleItem, lineno: usize) -> Result<Pattern, CompileError> {
    match body {
        RuleItem::Terminal(p @ Pattern::Regex(_)) | RuleItem::Terminal(p @ Pattern::Class(_)) => {
            Ok(p)
        }
        _ => Err(CompileError::SpecSyntax {
            line: lineno,
            detail: format!("{} must be a single regex or class terminal", SPACE_RULE),
        }),
    }
}

/// Refactor a raw meta-grammar parse tree into a rule tree. Group wrappers
/// and single-child chains are already spliced away by the engine's tag
/// shaping; what remains is a direct mapping.
fn build_item(tree: &SyntaxTree, lineno: usize) -> Result<RuleItem, CompileError> {
    let unexpected = |what: String| CompileError::SpecSyntax {
        line: lineno,
        detail: what,
    };
    match tree.tag() {
        Some("NAME") => {
            let text = tree.leaf_text();
            match text.split_once(':') {
                Some((name, alt)) => Ok(RuleItem::Reference {
                    name: name.to_string(),
                    rename: Some(alt.to_string()),
                }),
                None => Ok(RuleItem::reference(text)),
            }
        }
        Some("LITERAL") => Ok(RuleItem::Terminal(Pattern::Literal(
            meta::unescape_literal(&tree.leaf_text()),
        ))),
        Some("REGEX") => Ok(RuleItem::Terminal(Pattern::regex(&meta::unslash_regex(
            &tree.leaf_text(),
        ))?)),
        Some("CLASS") => Ok(RuleItem::Terminal(Pattern::class(&tree.leaf_text())?)),
        Some("PARAM") => Ok(RuleItem::MacroParam(
            tree.leaf_text().trim_start_matches('$').to_string(),
        )),
        Some("SEQ") => Ok(RuleItem::Sequence(
            tree.children()
                .iter()
                .map(|c| build_item(c, lineno))
                .collect::<Result<_, _>>()?,
        )),
        Some("BODY") => Ok(RuleItem::Alternation(
            tree.children()
                .iter()
                .map(|c| build_item(c, lineno))
                .collect::<Result<_, _>>()?,
        )),
        Some("ITEM") => {
            let base = build_item(child(tree, 0, lineno)?, lineno)?;
            tree.children()[1..].iter().try_fold(base, |acc, suffix| {
                let c = suffix.leaf_text().chars().next().unwrap_or(' ');
                let q = Quantifier::from_suffix(c)
                    .ok_or_else(|| unexpected(format!("unknown suffix '{}'", c)))?;
                Ok(RuleItem::quantified(acc, q))
            })
        }
        Some("MACROCALL") => {
            let name = child(tree, 0, lineno)?
                .leaf_text()
                .trim_start_matches('%')
                .to_string();
            let args = child(tree, 1, lineno)?
                .children()
                .iter()
                .map(|c| build_item(c, lineno))
                .collect::<Result<_, _>>()?;
            Ok(RuleItem::MacroCall { name, args })
        }
        Some(tag) => Err(unexpected(format!("unexpected node '{}'", tag))),
        None => Err(unexpected("unexpected bare token".to_string())),
    }
}

/// Expand macro calls: pure substitution of actuals for formals, with the
/// result recursively re-expanded. The active-name stack rejects macros
/// that expand through themselves.
fn expand(
    item: RuleItem,
    macros: &BTreeMap<String, Macro>,
    active: &mut Vec<String>,
) -> Result<RuleItem, CompileError> {
    match item {
        RuleItem::MacroCall { name, args } => {
            let mac = macros
                .get(&name)
                .ok_or_else(|| CompileError::UndefinedMacro { name: name.clone() })?;
            if mac.params.len() != args.len() {
                return Err(CompileError::MacroArity {
                    name,
                    expected: mac.params.len(),
                    got: args.len(),
                });
            }
            if active.contains(&name) {
                return Err(CompileError::MacroRecursion { name });
            }
            let args = args
                .into_iter()
                .map(|a| expand(a, macros, active))
                .collect::<Result<Vec<_>, _>>()?;
            let bindings: BTreeMap<&str, &RuleItem> = mac
                .params
                .iter()
                .map(|p| p.as_str())
                .zip(args.iter())
                .collect();
            let substituted = substitute(&mac.body, &bindings);
            active.push(name);
            let out = expand(substituted, macros, active);
            active.pop();
            out
        }
        RuleItem::Sequence(items) => Ok(RuleItem::Sequence(
            items
                .into_iter()
                .map(|i| expand(i, macros, active))
                .collect::<Result<_, _>>()?,
        )),
        RuleItem::Alternation(alts) => Ok(RuleItem::Alternation(
            alts.into_iter()
                .map(|i| expand(i, macros, active))
                .collect::<Result<_, _>>()?,
        )),
        RuleItem::Quantified(inner, q) => {
            Ok(RuleItem::Quantified(Box::new(expand(*inner, macros, active)?), q))
        }
        other => Ok(other),
    }
}

fn substitute(body: &RuleItem, bindings: &BTreeMap<&str, &RuleItem>) -> RuleItem {
    match body {
        RuleItem::MacroParam(p) => match bindings.get(p.as_str()) {
            Some(actual) => (*actual).clone(),
            None => body.clone(),
        },
        RuleItem::Sequence(items) => {
            RuleItem::Sequence(items.iter().map(|i| substitute(i, bindings)).collect())
        }
        RuleItem::Alternation(alts) => {
            RuleItem::Alternation(alts.iter().map(|i| substitute(i, bindings)).collect())
        }
        RuleItem::Quantified(inner, q) => {
            RuleItem::Quantified(Box::new(substitute(inner, bindings)), *q)
        }
        RuleItem::MacroCall { name, args } => RuleItem::MacroCall {
            name: name.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        other => other.clone(),
    }
}

fn check_no_params(item: &RuleItem) -> Result<(), CompileError> {
    match item {
        RuleItem::MacroParam(p) => Err(CompileError::UnboundMacroParam { name: p.clone() }),
        RuleItem::Sequence(items) | RuleItem::Alternation(items) => {
            items.iter().try_for_each(check_no_params)
        }
        RuleItem::Quantified(inner, _) => check_no_params(inner),
        RuleItem::MacroCall { args, .. } => args.iter().try_for_each(check_no_params),
        _ => Ok(()),
    }
}

/// Downgrade references to undefined nonterminals to discard-marks: the
/// text must still appear but carries no semantic tag.
fn downgrade(item: &mut RuleItem, known: &BTreeSet<String>) {
    match item {
        RuleItem::Reference { name, .. } => {
            if !known.contains(name) {
                *item = RuleItem::Terminal(Pattern::Mark(name.clone()));
            }
        }
        RuleItem::Sequence(items) | RuleItem::Alternation(items) => {
            for i in items {
                downgrade(i, known);
            }
        }
        RuleItem::Quantified(inner, _) => downgrade(inner, known),
        _ => {}
    }
}
