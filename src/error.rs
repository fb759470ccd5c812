//! Errors that end a pipeline run.
//!
//! Only layout problems are fatal. Cell-level parse failures never surface
//! here; they degrade to substitute values and are counted in
//! [`Diagnostics`](crate::pipeline::Diagnostics).

use thiserror::Error;

use crate::columns::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("source table has no columns; no role can be bound")]
    NoColumns,
    #[error(
        "no column matches role '{role}' and positional fallback index {index} is out of range ({available} column(s) available)"
    )]
    MissingRole {
        role: Role,
        index: usize,
        available: usize,
    },
    #[error("weighted aggregation requires a bound denominator column")]
    MissingWeights,
}
