//! Compiled-grammar artifact
//!
//! A `CompiledGrammar` serializes to JSON so a process can cache the
//! compilation result and skip the meta-grammar pass on the next start.
//! Regex terminals are stored as their source text and recompiled on load.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::grammar::rule::CompiledGrammar;

#[derive(Debug)]
pub enum ArtifactError {
    Io(std::io::Error),
    Format(String),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::Io(e) => write!(f, "artifact i/o error: {}", e),
            ArtifactError::Format(msg) => write!(f, "artifact format error: {}", msg),
        }
    }
}

impl std::error::Error for ArtifactError {}

impl From<std::io::Error> for ArtifactError {
    fn from(e: std::io::Error) -> Self {
        ArtifactError::Io(e)
    }
}

pub fn to_json(grammar: &CompiledGrammar) -> Result<String, ArtifactError> {
    serde_json::to_string_pretty(grammar).map_err(|e| ArtifactError::Format(e.to_string()))
}

pub fn from_json(json: &str) -> Result<CompiledGrammar, ArtifactError> {
    serde_json::from_str(json).map_err(|e| ArtifactError::Format(e.to_string()))
}

pub fn save(grammar: &CompiledGrammar, path: &Path) -> Result<(), ArtifactError> {
    fs::write(path, to_json(grammar)?)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<CompiledGrammar, ArtifactError> {
    from_json(&fs::read_to_string(path)?)
}
