//! A grammar reloaded from its JSON artifact parses exactly like the
//! freshly compiled one.

use mex::grammar::artifact;
use mex::grammar::compiler::{compile, CompilerOptions};
use mex::parsing::engine;

const GRAMMAR: &str = "SPACE := /[ \\t]*/\nPAIR := NUM \",\" NUM\nNUM := REAL | INT\nREAL := /\\d+\\.\\d+/\nINT := /\\d+/";

#[test]
fn reloaded_grammar_parses_identically() {
    let compiled = compile(GRAMMAR, CompilerOptions::new().refine(&["NUM"])).unwrap();
    let reloaded = artifact::from_json(&artifact::to_json(&compiled).unwrap()).unwrap();
    assert_eq!(compiled, reloaded);

    for input in ["1, 2", "3.5,7", "1,2 extra", "nope"] {
        assert_eq!(
            engine::parse(&compiled, "PAIR", input).unwrap(),
            engine::parse(&reloaded, "PAIR", input).unwrap()
        );
    }
}

#[test]
fn artifact_survives_a_file_roundtrip() {
    let compiled = compile(GRAMMAR, CompilerOptions::new()).unwrap();
    let path = std::env::temp_dir().join(format!("mex-artifact-{}.json", std::process::id()));
    artifact::save(&compiled, &path).unwrap();
    let reloaded = artifact::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(compiled, reloaded);
}

#[test]
fn garbage_artifact_is_a_format_error() {
    assert!(matches!(
        artifact::from_json("{ not json"),
        Err(artifact::ArtifactError::Format(_))
    ));
}
