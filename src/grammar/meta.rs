//! Meta-grammar bootstrap
//!
//! A fixed grammar-of-grammars describing the shape of one
//! grammar-specification line: `NAME := expression`, `|` alternation,
//! juxtaposition sequencing, parenthesized groups, suffix quantifiers, the
//! four terminal kinds and the macro definition/invocation syntax.
//!
//! The meta-grammar is written in the same textual syntax the rest of the
//! system compiles, but it is turned into a table by the simplest possible
//! means — a logos tokenizer plus a naive split on `:=`, bare `|` and
//! suffix characters — because it must not depend on the grammar compiler
//! it bootstraps. It therefore uses no parentheses and no macros itself.

use logos::Logos;
use once_cell::sync::Lazy;

use crate::grammar::compiler::CompileError;
use crate::grammar::pattern::Pattern;
use crate::grammar::rule::{CompiledGrammar, Quantifier, RuleItem};
use crate::parsing::engine::{self, Parse};
use crate::parsing::tree::SyntaxTree;

/// The grammar of grammar-specification lines.
///
/// Helper nonterminals stand in for parenthesized groups so the naive
/// bootstrap compiler never has to handle nesting.
const META_GRAMMAR: &str = r#"
DEFINITION := MACRODEF | RULEDEF
MACRODEF := MACRONAME "<"/ FORMALS ">" ":=" BODY
RULEDEF := NAME ":=" BODY
FORMALS := PARAM*
BODY := SEQ TAIL*
TAIL := "|" SEQ
SEQ := ITEM+
ITEM := ATOM SUFFIX/*
ATOM := GROUP | LITERAL | REGEX | CLASS | PARAM | MACROCALL | NAME
GROUP := "(" BODY ")"
MACROCALL := MACRONAME "<"/ ARGS ">"
ARGS := ITEM*
MACRONAME := /%[A-Za-z_][A-Za-z0-9_]*/
PARAM := /\$[A-Za-z_][A-Za-z0-9_]*/
LITERAL := /"(?:[^"\\]|\\.)*"/
REGEX := /\/(?:[^\/\\]|\\.)+\//
CLASS := /\[(?:[^\]\\]|\\.)+\]/
NAME := /[A-Za-z_][A-Za-z0-9_]*(?::[A-Za-z_][A-Za-z0-9_]*)?/
SUFFIX := [-*+?!/]
"#;

/// Tokens of the meta-grammar's own text.
///
/// `/` is both the regex delimiter and the no-space suffix. One DFA
/// pattern cannot split the two: a suffix `/` with no later `/` on the
/// line would send a delimiter pattern past the point of no return and
/// the lexer cannot back out of a failed repetition. The `/` callback
/// decides positionally instead — after an atom character it is a
/// suffix, otherwise it opens a regex and consumes the body up to the
/// closing unescaped `/`.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t]+")]
enum MetaToken {
    #[token(":=")]
    Define,
    #[token("|")]
    Pipe,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
    #[token("!")]
    Bang,
    #[token("-")]
    Dash,
    #[token("/", lex_slash)]
    Slash(SlashKind),
    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    Literal,
    #[regex(r"\[(?:[^\]\\]|\\.)+\]")]
    ClassTok,
    #[regex(r"[A-Za-z_][A-Za-z0-9_:]*")]
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SlashKind {
    /// `X/` — the no-space suffix.
    Suffix,
    /// `/.../` — a whole delimited regex, consumed by the callback.
    Regex,
}

fn lex_slash(lex: &mut logos::Lexer<MetaToken>) -> SlashKind {
    let start = lex.span().start;
    let opens = start == 0
        || matches!(
            lex.source().as_bytes()[start - 1],
            b' ' | b'\t' | b'(' | b'|' | b'<'
        );
    if !opens {
        return SlashKind::Suffix;
    }
    let rest = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'\\' => i += 2,
            b'/' => {
                lex.bump(i + 1);
                return SlashKind::Regex;
            }
            _ => i += 1,
        }
    }
    // unterminated regex: a lone suffix token here makes the line fail
    // loudly in the bootstrap splitter
    SlashKind::Suffix
}

impl MetaToken {
    fn suffix(&self) -> Option<Quantifier> {
        match self {
            MetaToken::Star => Some(Quantifier::ZeroOrMore),
            MetaToken::Plus => Some(Quantifier::OneOrMore),
            MetaToken::Question => Some(Quantifier::Optional),
            MetaToken::Bang => Some(Quantifier::ExactlyOneSilent),
            MetaToken::Dash => Some(Quantifier::NegativeLookahead),
            MetaToken::Slash(SlashKind::Suffix) => Some(Quantifier::NoSpaceBefore),
            _ => None,
        }
    }
}

static META: Lazy<CompiledGrammar> =
    Lazy::new(|| bootstrap().expect("meta-grammar bootstrap failed"));

/// The bootstrap grammar table, built once.
pub fn meta_grammar() -> &'static CompiledGrammar {
    &META
}

/// Parse one grammar-specification line into a raw rule tree
/// (`RULEDEF` or `MACRODEF` tagged).
pub fn parse_rule_line(line: &str, lineno: usize) -> Result<SyntaxTree, CompileError> {
    let syntax_err = |detail: String| CompileError::SpecSyntax {
        line: lineno,
        detail,
    };
    match engine::parse(meta_grammar(), "DEFINITION", line) {
        Ok(Parse::Match { tree, remainder }) => {
            if remainder.trim().is_empty() {
                Ok(tree)
            } else {
                Err(syntax_err(format!(
                    "trailing text '{}'",
                    remainder.trim()
                )))
            }
        }
        Ok(Parse::NoMatch) => Err(syntax_err(format!("not a rule definition: '{}'", line))),
        Err(fault) => Err(syntax_err(fault.to_string())),
    }
}

/// Strip the surrounding quotes of a literal token and resolve `\x` escapes.
pub fn unescape_literal(quoted: &str) -> String {
    let body = &quoted[1..quoted.len().saturating_sub(1)];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip the slashes of a regex token and unescape `\/`.
pub fn unslash_regex(slashed: &str) -> String {
    let body = &slashed[1..slashed.len().saturating_sub(1)];
    body.replace("\\/", "/")
}

fn bootstrap() -> Result<CompiledGrammar, String> {
    let mut rules = std::collections::BTreeMap::new();
    for line in META_GRAMMAR.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut lexer = MetaToken::lexer(line);
        let mut tokens = Vec::new();
        while let Some(result) = lexer.next() {
            match result {
                Ok(tok) => tokens.push((tok, lexer.slice().to_string())),
                Err(()) => return Err(format!("unlexable meta line: {}", line)),
            }
        }
        if tokens.len() < 3 || tokens[0].0 != MetaToken::Name || tokens[1].0 != MetaToken::Define {
            return Err(format!("malformed meta line: {}", line));
        }
        let lhs = tokens[0].1.clone();

        let mut alts: Vec<Vec<RuleItem>> = vec![Vec::new()];
        for (tok, text) in &tokens[2..] {
            if let Some(q) = tok.suffix() {
                let last = alts
                    .last_mut()
                    .and_then(|seq| seq.pop())
                    .ok_or_else(|| format!("dangling suffix in meta line: {}", line))?;
                if let Some(seq) = alts.last_mut() {
                    seq.push(RuleItem::quantified(last, q));
                }
                continue;
            }
            let item = match tok {
                MetaToken::Pipe => {
                    alts.push(Vec::new());
                    continue;
                }
                MetaToken::Literal => {
                    RuleItem::Terminal(Pattern::Literal(unescape_literal(text)))
                }
                MetaToken::Slash(SlashKind::Regex) => RuleItem::Terminal(
                    Pattern::regex(&unslash_regex(text)).map_err(|e| e.to_string())?,
                ),
                MetaToken::ClassTok => {
                    RuleItem::Terminal(Pattern::class(text).map_err(|e| e.to_string())?)
                }
                MetaToken::Name => RuleItem::reference(text.clone()),
                _ => return Err(format!("unexpected token '{}' in meta line: {}", text, line)),
            };
            if let Some(seq) = alts.last_mut() {
                seq.push(item);
            }
        }

        let alternatives = alts
            .into_iter()
            .map(|mut seq| match seq.len() {
                0 => Err(format!("empty alternative in meta line: {}", line)),
                1 => Ok(seq.remove(0)),
                _ => Ok(RuleItem::Sequence(seq)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        rules.insert(lhs, alternatives);
    }

    let keep_tags = ["ARGS", "FORMALS"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Ok(CompiledGrammar::new(
        rules,
        Pattern::regex(r"[ \t]*").map_err(|e| e.to_string())?,
        keep_tags,
        std::collections::BTreeSet::new(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_lexes_by_position() {
        let line = r#"M := A "<"/ B /[a-z]+/ C/*"#;
        let tokens: Vec<MetaToken> = MetaToken::lexer(line)
            .collect::<Result<_, _>>()
            .unwrap();
        let slashes: Vec<SlashKind> = tokens
            .iter()
            .filter_map(|t| match t {
                MetaToken::Slash(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            slashes,
            [SlashKind::Suffix, SlashKind::Regex, SlashKind::Suffix]
        );
    }

    #[test]
    fn suffix_slash_with_no_closing_slash_lexes() {
        // a suffix `/` mid-line must not be mistaken for an unterminated
        // regex delimiter that swallows the rest of the line
        let line = r#"MACRODEF := MACRONAME "<"/ FORMALS ">" ":=" BODY"#;
        assert!(MetaToken::lexer(line).all(|t| t.is_ok()));
    }

    #[test]
    fn bootstrap_builds() {
        let meta = meta_grammar();
        assert!(meta.contains("DEFINITION"));
        assert!(meta.contains("MACROCALL"));
        assert!(meta.contains("SUFFIX"));
    }

    #[test]
    fn simple_rule_line_parses() {
        let tree = parse_rule_line("NUM := /-?\\d+/", 1).unwrap();
        assert!(tree.is_tagged("RULEDEF"));
        assert_eq!(tree.children()[0].leaf_text(), "NUM");
    }

    #[test]
    fn macro_definition_line_parses() {
        let tree = parse_rule_line(r#"%PAIR<$A> := $A "," $A"#, 1).unwrap();
        assert!(tree.is_tagged("MACRODEF"));
        assert_eq!(tree.children()[0].leaf_text(), "%PAIR");
        assert!(tree.children()[1].is_tagged("FORMALS"));
    }

    #[test]
    fn garbage_line_is_a_spec_syntax_error() {
        let err = parse_rule_line("this is not := := a rule", 7).unwrap_err();
        match err {
            CompileError::SpecSyntax { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn literal_unescaping() {
        assert_eq!(unescape_literal(r#""a\"b""#), "a\"b");
        assert_eq!(unescape_literal(r#""\\""#), "\\");
    }
}
