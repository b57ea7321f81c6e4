//! Engine invariants over arbitrary input lines: parsing is a pure
//! function of (grammar, start, text), and consumption is monotonic —
//! the remainder is always a suffix of the input.

use mex::lang;
use mex::parsing::engine::{self, Parse};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parsing_is_deterministic(input in r"[-+*/^!()\[\], .0-9a-z]{0,24}") {
        let g = lang::expr_grammar();
        let first = engine::parse(g, lang::START_RULE, &input).unwrap();
        let second = engine::parse(g, lang::START_RULE, &input).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn remainder_is_a_suffix_of_the_input(input in r"[-+*/^!()\[\], .0-9a-z]{0,24}") {
        let g = lang::expr_grammar();
        if let Parse::Match { remainder, .. } =
            engine::parse(g, lang::START_RULE, &input).unwrap()
        {
            prop_assert!(input.ends_with(&remainder));
            prop_assert!(remainder.len() <= input.len());
        }
    }

    #[test]
    fn plain_integer_sums_always_evaluate(terms in prop::collection::vec(0i64..1000, 1..6)) {
        let line = terms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        let expected: i64 = terms.iter().sum();
        prop_assert_eq!(
            lang::interpret_line(&line).unwrap(),
            lang::Outcome::Value(mex::reduce::Value::Int(expected))
        );
    }
}
