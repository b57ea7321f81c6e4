//! Operator table
//!
//! Each operator carries a symbol, a category (binary, unary prefix,
//! unary suffix), a numeric priority, an associativity and an apply
//! function over concrete values. One symbol may appear in several
//! categories — `-` is both binary subtraction and prefix negation —
//! and the reducer picks the category from the operator's position.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::reduce::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OpCategory {
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "prefix")]
    UnaryPrefix,
    #[serde(rename = "suffix")]
    UnarySuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assoc {
    Left,
    Right,
}

/// Failure inside an operator's apply function.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyError {
    pub message: String,
}

impl ApplyError {
    pub fn new(message: impl Into<String>) -> Self {
        ApplyError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApplyError {}

pub type ApplyFn = fn(&[Value]) -> Result<Value, ApplyError>;

#[derive(Debug, Clone)]
pub struct Op {
    pub symbol: String,
    pub category: OpCategory,
    pub priority: u32,
    pub assoc: Assoc,
    pub apply: ApplyFn,
}

/// Symbol of the implicit operator inserted between adjacent operands.
pub const JUXTAPOSE: &str = "@";

#[derive(Debug, Clone, Default)]
pub struct OpTable {
    ops: HashMap<String, Vec<Op>>,
}

impl OpTable {
    pub fn new() -> Self {
        OpTable::default()
    }

    /// Register an operator, replacing any previous entry with the same
    /// symbol and category.
    pub fn register(&mut self, op: Op) {
        let entries = self.ops.entry(op.symbol.clone()).or_default();
        entries.retain(|e| e.category != op.category);
        entries.push(op);
    }

    fn find(&self, symbol: &str, category: OpCategory) -> Option<&Op> {
        self.ops
            .get(symbol)?
            .iter()
            .find(|op| op.category == category)
    }

    pub fn binary(&self, symbol: &str) -> Option<&Op> {
        self.find(symbol, OpCategory::Binary)
    }

    pub fn prefix(&self, symbol: &str) -> Option<&Op> {
        self.find(symbol, OpCategory::UnaryPrefix)
    }

    pub fn suffix(&self, symbol: &str) -> Option<&Op> {
        self.find(symbol, OpCategory::UnarySuffix)
    }

    pub fn juxtaposition(&self) -> Option<&Op> {
        self.binary(JUXTAPOSE)
    }

    /// Re-prioritize operators from a configuration file. Only priority
    /// and associativity can change; apply functions stay as registered.
    /// An adjustment with a `category` touches only that category's entry
    /// for the symbol; without one it touches every category.
    pub fn apply_config(&mut self, config: &OpConfig) {
        for (symbol, adjust) in &config.0 {
            if let Some(entries) = self.ops.get_mut(symbol) {
                for op in entries {
                    if adjust.category.is_some_and(|c| c != op.category) {
                        continue;
                    }
                    op.priority = adjust.priority;
                    if let Some(assoc) = adjust.assoc {
                        op.assoc = assoc;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpAdjust {
    pub priority: u32,
    #[serde(default)]
    pub assoc: Option<Assoc>,
    #[serde(default)]
    pub category: Option<OpCategory>,
}

/// Operator overrides, keyed by symbol. Loaded from YAML:
///
/// ```yaml
/// "+": { priority: 4 }
/// "^": { priority: 9, assoc: right }
/// "-": { priority: 3, category: binary }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct OpConfig(pub BTreeMap<String, OpAdjust>);

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Format(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "operator config i/o error: {}", e),
            ConfigError::Format(msg) => write!(f, "operator config format error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

pub fn parse_config(yaml: &str) -> Result<OpConfig, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::Format(e.to_string()))
}

pub fn load_config(path: &Path) -> Result<OpConfig, ConfigError> {
    parse_config(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(args: &[Value]) -> Result<Value, ApplyError> {
        Ok(args[0].clone())
    }

    fn op(symbol: &str, category: OpCategory, priority: u32) -> Op {
        Op {
            symbol: symbol.to_string(),
            category,
            priority,
            assoc: Assoc::Left,
            apply: first,
        }
    }

    #[test]
    fn one_symbol_two_categories() {
        let mut table = OpTable::new();
        table.register(op("-", OpCategory::Binary, 5));
        table.register(op("-", OpCategory::UnaryPrefix, 9));
        assert_eq!(table.binary("-").unwrap().priority, 5);
        assert_eq!(table.prefix("-").unwrap().priority, 9);
        assert!(table.suffix("-").is_none());
    }

    #[test]
    fn config_overrides_priority_and_assoc() {
        let mut table = OpTable::new();
        table.register(op("^", OpCategory::Binary, 8));
        let config = parse_config("\"^\": { priority: 3, assoc: right }").unwrap();
        table.apply_config(&config);
        let caret = table.binary("^").unwrap();
        assert_eq!(caret.priority, 3);
        assert_eq!(caret.assoc, Assoc::Right);
    }

    #[test]
    fn config_can_target_one_category() {
        let mut table = OpTable::new();
        table.register(op("-", OpCategory::Binary, 5));
        table.register(op("-", OpCategory::UnaryPrefix, 9));
        let config = parse_config("\"-\": { priority: 3, category: binary }").unwrap();
        table.apply_config(&config);
        assert_eq!(table.binary("-").unwrap().priority, 3);
        assert_eq!(table.prefix("-").unwrap().priority, 9);
    }

    #[test]
    fn config_ignores_unknown_symbols() {
        let mut table = OpTable::new();
        table.register(op("+", OpCategory::Binary, 5));
        let config = parse_config("\"&\": { priority: 1 }").unwrap();
        table.apply_config(&config);
        assert_eq!(table.binary("+").unwrap().priority, 5);
    }
}
