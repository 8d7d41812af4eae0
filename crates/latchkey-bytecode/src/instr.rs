//! Structured instruction set
//!
//! Method bodies are sequences of stack-machine instructions. The set is
//! deliberately small: member access, calls, allocation, representation
//! conversions, and the handful of arithmetic operations target bodies
//! need. An empty body marks a stub; invoking one traps at run time.

use crate::encoder::{DecodeError, ModuleReader, ModuleWriter};
use crate::module::{FieldRef, MethodRef};
use crate::types::{Constant, TypeRef};
use serde::{Deserialize, Serialize};

/// A single stack-machine instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// Push argument `n` (argument 0 is the receiver for instance methods)
    LoadArg(u16),
    /// Push a constant
    LoadConst(Constant),

    /// Pop an object, push the value of an instance field
    LoadField(FieldRef),
    /// Pop a value then an object, store into an instance field
    StoreField(FieldRef),
    /// Pop an object, push a live reference to an instance field slot
    LoadFieldRef(FieldRef),

    /// Push the value of a static field
    LoadStatic(FieldRef),
    /// Pop a value, store into a static field
    StoreStatic(FieldRef),
    /// Push a live reference to a static field slot
    LoadStaticRef(FieldRef),

    /// Call a method with exact (non-virtual) dispatch
    Call(MethodRef),
    /// Call an instance method with virtual dispatch on the receiver
    CallVirtual(MethodRef),
    /// Allocate an instance and run the referenced constructor
    NewObject(MethodRef),

    /// Widen a value type into an object-typed value
    Box(TypeRef),
    /// Narrow an object-typed value back to a value type, checked
    Unbox(TypeRef),
    /// Checked downcast of a reference-typed value
    CastClass(TypeRef),

    /// Pop two integers, push their sum
    IAdd,
    /// Pop two integers, push their difference
    ISub,
    /// Pop two integers, push their product
    IMul,
    /// Pop two strings, push their concatenation
    StrConcat,
    /// Discard the top of the stack
    Pop,
    /// Return, popping the return value for non-void methods
    Return,
}

impl Instr {
    /// Encode this instruction into a writer
    pub fn encode(&self, writer: &mut ModuleWriter) {
        match self {
            Instr::LoadArg(index) => {
                writer.emit_u8(0x00);
                writer.emit_u16(*index);
            }
            Instr::LoadConst(constant) => {
                writer.emit_u8(0x01);
                constant.encode(writer);
            }
            Instr::LoadField(field) => {
                writer.emit_u8(0x10);
                field.encode(writer);
            }
            Instr::StoreField(field) => {
                writer.emit_u8(0x11);
                field.encode(writer);
            }
            Instr::LoadFieldRef(field) => {
                writer.emit_u8(0x12);
                field.encode(writer);
            }
            Instr::LoadStatic(field) => {
                writer.emit_u8(0x13);
                field.encode(writer);
            }
            Instr::StoreStatic(field) => {
                writer.emit_u8(0x14);
                field.encode(writer);
            }
            Instr::LoadStaticRef(field) => {
                writer.emit_u8(0x15);
                field.encode(writer);
            }
            Instr::Call(method) => {
                writer.emit_u8(0x20);
                method.encode(writer);
            }
            Instr::CallVirtual(method) => {
                writer.emit_u8(0x21);
                method.encode(writer);
            }
            Instr::NewObject(ctor) => {
                writer.emit_u8(0x22);
                ctor.encode(writer);
            }
            Instr::Box(ty) => {
                writer.emit_u8(0x30);
                ty.encode(writer);
            }
            Instr::Unbox(ty) => {
                writer.emit_u8(0x31);
                ty.encode(writer);
            }
            Instr::CastClass(ty) => {
                writer.emit_u8(0x32);
                ty.encode(writer);
            }
            Instr::IAdd => writer.emit_u8(0x40),
            Instr::ISub => writer.emit_u8(0x41),
            Instr::IMul => writer.emit_u8(0x42),
            Instr::StrConcat => writer.emit_u8(0x43),
            Instr::Pop => writer.emit_u8(0x44),
            Instr::Return => writer.emit_u8(0x50),
        }
    }

    /// Decode an instruction from a reader
    pub fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        let instr = match tag {
            0x00 => Instr::LoadArg(reader.read_u16()?),
            0x01 => Instr::LoadConst(Constant::decode(reader)?),
            0x10 => Instr::LoadField(FieldRef::decode(reader)?),
            0x11 => Instr::StoreField(FieldRef::decode(reader)?),
            0x12 => Instr::LoadFieldRef(FieldRef::decode(reader)?),
            0x13 => Instr::LoadStatic(FieldRef::decode(reader)?),
            0x14 => Instr::StoreStatic(FieldRef::decode(reader)?),
            0x15 => Instr::LoadStaticRef(FieldRef::decode(reader)?),
            0x20 => Instr::Call(MethodRef::decode(reader)?),
            0x21 => Instr::CallVirtual(MethodRef::decode(reader)?),
            0x22 => Instr::NewObject(MethodRef::decode(reader)?),
            0x30 => Instr::Box(TypeRef::decode(reader)?),
            0x31 => Instr::Unbox(TypeRef::decode(reader)?),
            0x32 => Instr::CastClass(TypeRef::decode(reader)?),
            0x40 => Instr::IAdd,
            0x41 => Instr::ISub,
            0x42 => Instr::IMul,
            0x43 => Instr::StrConcat,
            0x44 => Instr::Pop,
            0x50 => Instr::Return,
            other => return Err(DecodeError::InvalidTag(other, reader.offset())),
        };
        Ok(instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instr_roundtrip() {
        let instrs = vec![
            Instr::LoadArg(0),
            Instr::LoadField(FieldRef {
                declaring: TypeRef::Named("app.Widget".to_string()),
                name: "_value".to_string(),
                ty: TypeRef::Int,
            }),
            Instr::Box(TypeRef::Int),
            Instr::Return,
        ];

        let mut writer = ModuleWriter::new();
        for instr in &instrs {
            instr.encode(&mut writer);
        }

        let bytes = writer.into_bytes();
        let mut reader = ModuleReader::new(&bytes);
        let mut decoded = Vec::new();
        while reader.has_more() {
            decoded.push(Instr::decode(&mut reader).unwrap());
        }
        assert_eq!(decoded, instrs);
    }

    #[test]
    fn test_invalid_tag() {
        let mut reader = ModuleReader::new(&[0xEE]);
        assert!(matches!(
            Instr::decode(&mut reader),
            Err(DecodeError::InvalidTag(0xEE, _))
        ));
    }
}
