//! Minimal interpreter for latchkey modules
//!
//! Executes method bodies over the structured instruction set so that
//! woven modules can be validated end to end: field loads and stores,
//! by-reference slot handles, virtual dispatch, checked casts, and
//! constructor calls. Visibility is not enforced here; that is the real
//! runtime's load-time concern.

pub mod error;
pub mod interp;
pub mod value;

pub use error::RunError;
pub use interp::Vm;
pub use value::{ObjHandle, ObjectData, RefSlot, Value};
