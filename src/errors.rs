use crate::float_types::Real;
use thiserror::Error;

/// Errors raised while constructing sets, predicates, transformations and paths.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CsgError {
    /// Zero direction, malformed tuple, wrong matrix shape, non-finite value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Expression is not a set, not a function, or a variable is not a symbol.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Path slice endpoints outside `[0, length]`.
    #[error("slice [{start}, {end}] out of range for path of length {length}")]
    IndexOutOfRange {
        start: Real,
        end: Real,
        length: Real,
    },

    /// The simplifier was handed a complement of a composite set.
    #[error("set is not in negation normal form")]
    NotNormalForm,

    /// The backend has no way to build a concrete shape for this set.
    #[error("cannot realize set: {0}")]
    Unrealizable(String),

    /// Preferences could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// The operation cannot be applied to the given puzzle state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IllegalOperationError {
    #[error("operation expects {expected} pieces but the puzzle has {found}")]
    WrongArity { expected: usize, found: usize },

    #[error("no selector of the partitional operation matches any piece")]
    UnresolvedSelection,

    #[error("piece {piece} is only partially covered by selector {selector}")]
    AmbiguousSelection { piece: usize, selector: usize },

    #[error("pieces collide along the path at t = {t}")]
    CollisionAlongPath { t: Real },

    #[error("operation not applicable: {0}")]
    NotApplicable(String),
}

/// The puzzle produced by an operation violates its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IllegalStateError {
    #[error("invalid puzzle state: {0}")]
    InvalidState(String),
}

/// Anything that can go wrong while applying an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error(transparent)]
    IllegalOperation(#[from] IllegalOperationError),

    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),

    #[error(transparent)]
    Csg(#[from] CsgError),
}
