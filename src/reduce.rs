//! Operator-sequence reduction: values, operator tables and the
//! two-stack reducer with deferred applications.

pub mod ops;
pub mod reducer;
pub mod value;

pub use ops::{Assoc, Op, OpCategory, OpTable};
pub use reducer::{reduce_sequence, Reduced, ReduceError};
pub use value::Value;
