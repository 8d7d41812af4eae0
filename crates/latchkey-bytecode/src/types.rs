//! Type references and constants
//!
//! A [`TypeRef`] describes a type as it appears in metadata: a built-in
//! type, a named type, a generic instantiation, an unresolved generic
//! parameter placeholder, or a by-reference view of another type.
//! References are compared structurally; two references denote the same
//! type exactly when they are equal.

use crate::encoder::{DecodeError, ModuleReader, ModuleWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which declaration a generic parameter placeholder belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericParamKind {
    /// Declared on the enclosing type
    Type,
    /// Declared on the method itself
    Method,
}

/// A type as referenced from metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// The "no value" type, only valid as a return type
    Void,
    /// Boolean value type
    Bool,
    /// 64-bit integer value type
    Int,
    /// 64-bit float value type
    Float,
    /// Immutable string reference type
    Str,
    /// The root reference type; any value can be widened to it
    Object,
    /// A named type, identified by its dotted full name
    Named(String),
    /// A generic instantiation of a named generic definition
    GenericInst {
        /// Full name of the generic definition
        definition: String,
        /// Concrete (or placeholder) argument types, by position
        args: Vec<TypeRef>,
    },
    /// An unresolved generic parameter placeholder
    GenericParam {
        /// Owner kind of the placeholder
        kind: GenericParamKind,
        /// Position within the owner's parameter list
        position: u16,
    },
    /// A by-reference view of the element type
    ByRef(Box<TypeRef>),
}

impl TypeRef {
    /// Whether this is a value type (subject to boxing and unboxing)
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeRef::Bool | TypeRef::Int | TypeRef::Float)
    }

    /// Whether this is a generic parameter placeholder
    pub fn is_generic_param(&self) -> bool {
        matches!(self, TypeRef::GenericParam { .. })
    }

    /// The full name of the underlying named definition, if any
    pub fn definition_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::GenericInst { definition, .. } => Some(definition),
            _ => None,
        }
    }

    /// Encode this reference into a writer
    pub fn encode(&self, writer: &mut ModuleWriter) {
        match self {
            TypeRef::Void => writer.emit_u8(0),
            TypeRef::Bool => writer.emit_u8(1),
            TypeRef::Int => writer.emit_u8(2),
            TypeRef::Float => writer.emit_u8(3),
            TypeRef::Str => writer.emit_u8(4),
            TypeRef::Object => writer.emit_u8(5),
            TypeRef::Named(name) => {
                writer.emit_u8(6);
                writer.emit_string(name);
            }
            TypeRef::GenericInst { definition, args } => {
                writer.emit_u8(7);
                writer.emit_string(definition);
                writer.emit_u16(args.len() as u16);
                for arg in args {
                    arg.encode(writer);
                }
            }
            TypeRef::GenericParam { kind, position } => {
                writer.emit_u8(8);
                writer.emit_u8(match kind {
                    GenericParamKind::Type => 0,
                    GenericParamKind::Method => 1,
                });
                writer.emit_u16(*position);
            }
            TypeRef::ByRef(element) => {
                writer.emit_u8(9);
                element.encode(writer);
            }
        }
    }

    /// Decode a reference from a reader
    pub fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        let ty = match tag {
            0 => TypeRef::Void,
            1 => TypeRef::Bool,
            2 => TypeRef::Int,
            3 => TypeRef::Float,
            4 => TypeRef::Str,
            5 => TypeRef::Object,
            6 => TypeRef::Named(reader.read_string()?),
            7 => {
                let definition = reader.read_string()?;
                let count = reader.read_u16()? as usize;
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(TypeRef::decode(reader)?);
                }
                TypeRef::GenericInst { definition, args }
            }
            8 => {
                let kind = match reader.read_u8()? {
                    0 => GenericParamKind::Type,
                    1 => GenericParamKind::Method,
                    other => return Err(DecodeError::InvalidTag(other, reader.offset())),
                };
                let position = reader.read_u16()?;
                TypeRef::GenericParam { kind, position }
            }
            9 => TypeRef::ByRef(Box::new(TypeRef::decode(reader)?)),
            other => return Err(DecodeError::InvalidTag(other, reader.offset())),
        };
        Ok(ty)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Str => write!(f, "str"),
            TypeRef::Object => write!(f, "object"),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::GenericInst { definition, args } => {
                write!(f, "{definition}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, "]")
            }
            TypeRef::GenericParam { kind, position } => match kind {
                GenericParamKind::Type => write!(f, "!{position}"),
                GenericParamKind::Method => write!(f, "!!{position}"),
            },
            TypeRef::ByRef(element) => write!(f, "ref {element}"),
        }
    }
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Visible everywhere
    Public,
    /// Visible within the defining module
    Internal,
    /// Visible within the defining type
    Private,
}

impl Visibility {
    pub(crate) fn encode(self, writer: &mut ModuleWriter) {
        writer.emit_u8(match self {
            Visibility::Public => 0,
            Visibility::Internal => 1,
            Visibility::Private => 2,
        });
    }

    pub(crate) fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            0 => Ok(Visibility::Public),
            1 => Ok(Visibility::Internal),
            2 => Ok(Visibility::Private),
            other => Err(DecodeError::InvalidTag(other, reader.offset())),
        }
    }
}

/// A compile-time constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// The null reference
    Null,
    /// Integer constant
    Int(i64),
    /// Float constant
    Float(f64),
    /// Boolean constant
    Bool(bool),
    /// String constant
    Str(String),
}

impl Constant {
    /// Encode this constant into a writer
    pub fn encode(&self, writer: &mut ModuleWriter) {
        match self {
            Constant::Null => writer.emit_u8(0),
            Constant::Int(value) => {
                writer.emit_u8(1);
                writer.emit_i64(*value);
            }
            Constant::Float(value) => {
                writer.emit_u8(2);
                writer.emit_f64(*value);
            }
            Constant::Bool(value) => {
                writer.emit_u8(3);
                writer.emit_u8(*value as u8);
            }
            Constant::Str(value) => {
                writer.emit_u8(4);
                writer.emit_string(value);
            }
        }
    }

    /// Decode a constant from a reader
    pub fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        let constant = match tag {
            0 => Constant::Null,
            1 => Constant::Int(reader.read_i64()?),
            2 => Constant::Float(reader.read_f64()?),
            3 => Constant::Bool(reader.read_u8()? != 0),
            4 => Constant::Str(reader.read_string()?),
            other => return Err(DecodeError::InvalidTag(other, reader.offset())),
        };
        Ok(constant)
    }
}
