//! End-to-end parses: compile a grammar from text, run the engine,
//! check tree shape and remainder.

use mex::grammar::compiler::{compile, CompilerOptions};
use mex::parsing::engine::{self, Parse};
use mex::parsing::tree::SyntaxTree;

fn must_match(g: &mex::grammar::rule::CompiledGrammar, start: &str, text: &str) -> (SyntaxTree, String) {
    match engine::parse(g, start, text).unwrap() {
        Parse::Match { tree, remainder } => (tree, remainder),
        Parse::NoMatch => panic!("no match for '{}'", text),
    }
}

#[test]
fn bracketed_list_keeps_only_numbers() {
    let g = compile(
        "SPACE := /[ \\t]*/\n%SEP<$X $D> := ($X ($D! $X)*)?\nLIST := \"[\" %SEP<NUM \",\"> \"]\"\nNUM := /-?\\d+/",
        CompilerOptions::new().keep(&["LIST"]),
    )
    .unwrap();

    let (tree, remainder) = must_match(&g, "LIST", "[1, 2,3] rest");
    assert_eq!(remainder, " rest");
    assert!(tree.is_tagged("LIST"));
    let texts: Vec<String> = tree.children().iter().map(|c| c.leaf_text()).collect();
    assert_eq!(texts, ["1", "2", "3"]);
    for child in tree.children() {
        assert!(child.is_tagged("NUM"));
    }

    let (empty, _) = must_match(&g, "LIST", "[]");
    assert!(empty.is_tagged("LIST"));
    assert!(empty.children().is_empty());

    assert_eq!(engine::parse(&g, "LIST", "[1, 2,").unwrap(), Parse::NoMatch);
}

#[test]
fn no_space_suffix_forbids_the_gap() {
    let g = compile(
        "REAL := /\\d+\\.\\d+/ EXPO/?\nEXPO := /[eE][+-]?\\d+/",
        CompilerOptions::new(),
    )
    .unwrap();

    let (tree, remainder) = must_match(&g, "REAL", "2.5e3");
    assert_eq!(remainder, "");
    assert_eq!(tree.leaf_text(), "2.5e3");

    let (tree, remainder) = must_match(&g, "REAL", "2.5 e3");
    assert_eq!(remainder, " e3");
    assert_eq!(tree.leaf_text(), "2.5");
}

#[test]
fn refine_tag_absorbs_the_winning_alternative() {
    let g = compile(
        "NUM := REAL | INT\nREAL := /\\d+\\.\\d+/\nINT := /\\d+/",
        CompilerOptions::new().refine(&["NUM"]),
    )
    .unwrap();

    let (tree, _) = must_match(&g, "NUM", "3.5");
    assert_eq!(tree.tag(), Some("NUM"));
    assert_eq!(tree.subtag(), Some("REAL"));

    let (tree, _) = must_match(&g, "NUM", "42");
    assert_eq!(tree.subtag(), Some("INT"));
}

#[test]
fn reference_rename_retags_the_node() {
    let g = compile(
        "VAL := NUM:COUNT\nNUM := /\\d+/",
        CompilerOptions::new(),
    )
    .unwrap();
    let (tree, _) = must_match(&g, "VAL", "7");
    assert!(tree.is_tagged("COUNT"));
    assert_eq!(tree.leaf_text(), "7");
}

#[test]
fn custom_whitespace_rule_is_honored() {
    let g = compile(
        "SPACE := /\\s*/\nPAIR := NUM NUM\nNUM := /\\d+/",
        CompilerOptions::new(),
    )
    .unwrap();
    let (tree, remainder) = must_match(&g, "PAIR", "1\n  2");
    assert_eq!(remainder, "");
    assert_eq!(tree.children().len(), 2);
}

#[test]
fn ordered_choice_is_committed() {
    // The first alternative wins even when the second would consume more.
    let g = compile(
        "X := \"a\" | \"ab\"\nY := X \"c\"",
        CompilerOptions::new(),
    )
    .unwrap();
    let (_, remainder) = must_match(&g, "X", "ab");
    assert_eq!(remainder, "b");
    assert_eq!(engine::parse(&g, "Y", "abc").unwrap(), Parse::NoMatch);
    let (_, remainder) = must_match(&g, "Y", "ac");
    assert_eq!(remainder, "");
}

#[test]
fn negative_lookahead_consumes_nothing() {
    let g = compile(
        "WORD := KEYWORD- /[a-z]+/\nKEYWORD := \"if\"",
        CompilerOptions::new(),
    )
    .unwrap();
    let (tree, _) = must_match(&g, "WORD", "foo");
    assert_eq!(tree.leaf_text(), "foo");
    assert_eq!(engine::parse(&g, "WORD", "ifx").unwrap(), Parse::NoMatch);
}
