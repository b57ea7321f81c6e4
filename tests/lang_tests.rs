//! Rendering of interpreter outcomes, pinned with inline snapshots.

use insta::assert_snapshot;
use mex::lang::{self, interpret_line, Outcome};
use mex::parsing::engine::{self, Parse};

fn deferred_rendering(line: &str) -> String {
    match interpret_line(line).unwrap() {
        Outcome::Deferred(t) => t.to_string(),
        other => panic!("expected deferred outcome for '{}', got {:?}", line, other),
    }
}

#[test]
fn deferred_sum_with_a_free_name() {
    assert_snapshot!(
        deferred_rendering("2 x + 1"),
        @r#"(APPLY:BIN "+" (APPLY:BIN "@" (NUM:INT "2") (NAME "x")) (NUM:INT "1"))"#
    );
}

#[test]
fn prefix_application_stays_symbolic() {
    assert_snapshot!(
        deferred_rendering("-x"),
        @r#"(APPLY:PRE "-" (NAME "x"))"#
    );
}

#[test]
fn list_line_parse_tree() {
    let parsed = engine::parse(lang::expr_grammar(), lang::START_RULE, "[1, 2]").unwrap();
    match parsed {
        Parse::Match { tree, remainder } => {
            assert_eq!(remainder, "");
            assert_snapshot!(
                tree.to_string(),
                @r#"(SEQ (LIST (SEQ (NUM:INT "1")) (SEQ (NUM:INT "2"))))"#
            );
        }
        Parse::NoMatch => panic!("list line must parse"),
    }
}

#[test]
fn value_outcomes_render_bare() {
    assert_eq!(interpret_line("6 * 7").unwrap().to_string(), "42");
    assert_eq!(interpret_line("7 / 2").unwrap().to_string(), "3.5");
}
