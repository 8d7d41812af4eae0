//! Execution errors

use thiserror::Error;

/// Errors raised while executing module code
#[derive(Debug, Error)]
pub enum RunError {
    /// No loaded module defines the type
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// No matching method on the type or its ancestors
    #[error("Method not found: {type_name}::{method}")]
    MethodNotFound {
        /// Full name of the searched type
        type_name: String,
        /// Method name
        method: String,
    },

    /// Field missing from an object or static store
    #[error("Field not found: {type_name}::{field}")]
    FieldNotFound {
        /// Full name of the declaring type
        type_name: String,
        /// Field name
        field: String,
    },

    /// The invoked method has an empty body
    #[error("Stub was not woven: {type_name}::{method}")]
    StubNotWoven {
        /// Full name of the declaring type
        type_name: String,
        /// Method name
        method: String,
    },

    /// Checked cast or unbox failed
    #[error("Invalid cast: {value} is not a {target}")]
    InvalidCast {
        /// Description of the value
        value: String,
        /// Target type
        target: String,
    },

    /// Operand stack underflow
    #[error("Operand stack underflow in {0}")]
    StackUnderflow(String),

    /// Wrong argument count for a call
    #[error("Expected {expected} arguments, got {actual}")]
    ArgCount {
        /// Declared parameter count (receiver included)
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A value had the wrong shape for an instruction
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What the instruction required
        expected: String,
        /// What was on the stack
        actual: String,
    },

    /// A reference value was required
    #[error("Value is not a reference")]
    NotAReference,
}
