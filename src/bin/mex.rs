//! Command-line interface for mex
//!
//! Usage:
//!   mex compile `<grammar>` [-o `<artifact>`]                  - Compile a grammar file to a JSON artifact
//!   mex parse [--grammar|--artifact `<path>`] [--start `<rule>`] [--format tree|json] `<text>`
//!   mex eval [--ops `<yaml>`] `<line>`                         - Parse and reduce one expression line

use std::path::PathBuf;

use clap::{Arg, Command};

use mex::grammar::artifact;
use mex::grammar::compiler::{compile, CompilerOptions};
use mex::grammar::rule::CompiledGrammar;
use mex::lang;
use mex::parsing::engine::{self, Parse};
use mex::reduce::ops;

fn main() {
    let matches = Command::new("mex")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Grammar compiler, parsing engine and expression reducer")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("compile")
                .about("Compile a grammar file to a JSON artifact")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar specification")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Where to write the artifact (stdout if omitted)"),
                )
                .arg(
                    Arg::new("keep")
                        .long("keep")
                        .help("Comma-separated tags whose wrapper always survives"),
                )
                .arg(
                    Arg::new("refine")
                        .long("refine")
                        .help("Comma-separated tags refined with their child's tag"),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse text with a grammar and print the syntax tree")
                .arg(
                    Arg::new("text")
                        .help("Input text to parse")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("grammar")
                        .long("grammar")
                        .short('g')
                        .help("Path to a grammar specification")
                        .conflicts_with("artifact"),
                )
                .arg(
                    Arg::new("artifact")
                        .long("artifact")
                        .short('a')
                        .help("Path to a compiled JSON artifact"),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .short('s')
                        .help("Start rule")
                        .default_value(lang::START_RULE),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format ('tree' or 'json')")
                        .default_value("tree"),
                ),
        )
        .subcommand(
            Command::new("eval")
                .about("Parse and reduce one expression line")
                .arg(
                    Arg::new("line")
                        .help("Expression line to evaluate")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("ops")
                        .long("ops")
                        .help("YAML file overriding operator priorities"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("compile", m)) => {
            let grammar = m.get_one::<String>("grammar").unwrap();
            let output = m.get_one::<String>("output");
            let keep = m.get_one::<String>("keep");
            let refine = m.get_one::<String>("refine");
            handle_compile(grammar, output, keep, refine);
        }
        Some(("parse", m)) => {
            let text = m.get_one::<String>("text").unwrap();
            let start = m.get_one::<String>("start").unwrap();
            let format = m.get_one::<String>("format").unwrap();
            let grammar = load_grammar(
                m.get_one::<String>("grammar"),
                m.get_one::<String>("artifact"),
            );
            handle_parse(&grammar, start, text, format);
        }
        Some(("eval", m)) => {
            let line = m.get_one::<String>("line").unwrap();
            let ops_path = m.get_one::<String>("ops");
            handle_eval(line, ops_path);
        }
        _ => unreachable!(),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn split_tags(arg: Option<&String>) -> Vec<String> {
    arg.map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
        .unwrap_or_default()
}

fn handle_compile(
    grammar_path: &str,
    output: Option<&String>,
    keep: Option<&String>,
    refine: Option<&String>,
) {
    let text = std::fs::read_to_string(grammar_path).unwrap_or_else(|e| fail(e));
    let keep = split_tags(keep);
    let refine = split_tags(refine);
    let options = CompilerOptions::new()
        .keep(&keep.iter().map(String::as_str).collect::<Vec<_>>())
        .refine(&refine.iter().map(String::as_str).collect::<Vec<_>>());
    let grammar = compile(&text, options).unwrap_or_else(|e| fail(e));
    match output {
        Some(path) => {
            artifact::save(&grammar, &PathBuf::from(path)).unwrap_or_else(|e| fail(e));
        }
        None => {
            let json = artifact::to_json(&grammar).unwrap_or_else(|e| fail(e));
            println!("{}", json);
        }
    }
}

fn load_grammar(grammar: Option<&String>, compiled: Option<&String>) -> CompiledGrammar {
    match (grammar, compiled) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| fail(e));
            compile(&text, CompilerOptions::new()).unwrap_or_else(|e| fail(e))
        }
        (None, Some(path)) => {
            artifact::load(&PathBuf::from(path)).unwrap_or_else(|e| fail(e))
        }
        (None, None) => lang::expr_grammar().clone(),
    }
}

fn handle_parse(grammar: &CompiledGrammar, start: &str, text: &str, format: &str) {
    match engine::parse(grammar, start, text).unwrap_or_else(|e| fail(e)) {
        Parse::NoMatch => fail("no match"),
        Parse::Match { tree, remainder } => {
            match format {
                "json" => {
                    let json =
                        serde_json::to_string_pretty(&tree).unwrap_or_else(|e| fail(e));
                    println!("{}", json);
                }
                _ => println!("{}", tree),
            }
            if !remainder.trim().is_empty() {
                eprintln!("Unparsed remainder: '{}'", remainder);
            }
        }
    }
}

fn handle_eval(line: &str, ops_path: Option<&String>) {
    let outcome = match ops_path {
        Some(path) => {
            let config = ops::load_config(&PathBuf::from(path)).unwrap_or_else(|e| fail(e));
            let mut table = lang::default_ops().clone();
            table.apply_config(&config);
            lang::interpret_line_with(line, &table)
        }
        None => lang::interpret_line(line),
    };
    match outcome.unwrap_or_else(|e| fail(e)) {
        lang::Outcome::Empty => {}
        lang::Outcome::SyntaxError { remainder } => {
            fail(format!("syntax error at '{}'", remainder.trim()))
        }
        result => println!("{}", result),
    }
}
