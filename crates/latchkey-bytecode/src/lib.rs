//! Latchkey Module Format
//!
//! This crate provides the module metadata model, type-reference algebra,
//! and structured instruction set that the latchkey weaver operates on,
//! together with the binary encoding of compiled modules.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod encoder;
pub mod instr;
pub mod module;
pub mod types;

pub use builder::{MethodBuilder, ModuleBuilder, TypeBuilder};
pub use encoder::{DecodeError, ModuleReader, ModuleWriter};
pub use instr::Instr;
pub use module::{
    Attribute, FieldDef, FieldRef, MethodDef, MethodRef, Module, ModuleError, ParamDef, TypeDef,
};
pub use types::{Constant, GenericParamKind, TypeRef, Visibility};
