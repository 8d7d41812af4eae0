//! Module metadata format
//!
//! A [`Module`] is the unit the weaver transforms: a named container of
//! type definitions (possibly nested), module-level attributes, and the
//! ordered list of directly referenced module names. The binary format is
//! a fixed header (magic, version, crc32 checksum of the payload) followed
//! by the encoded metadata graph.

use crate::encoder::{DecodeError, ModuleReader, ModuleWriter};
use crate::instr::Instr;
use crate::types::{Constant, TypeRef, Visibility};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic number for latchkey module files: "LKBC"
pub const MAGIC: [u8; 4] = *b"LKBC";

/// Current module format version
pub const VERSION: u32 = 1;

/// Name given to constructor methods
pub const CONSTRUCTOR_NAME: &str = "constructor";

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected LKBC, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },
}

/// A declarative marker instance attached to a metadata element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Full name of the marker type
    pub type_name: String,
    /// Positional constructor arguments
    pub args: Vec<Constant>,
}

impl Attribute {
    /// Create a marker instance
    pub fn new(type_name: impl Into<String>, args: Vec<Constant>) -> Self {
        Self {
            type_name: type_name.into(),
            args,
        }
    }

    /// String value of the argument at `index`, if present
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(Constant::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer value of the argument at `index`, if present
    pub fn int_arg(&self, index: usize) -> Option<i64> {
        match self.args.get(index) {
            Some(Constant::Int(value)) => Some(*value),
            _ => None,
        }
    }

    fn encode(&self, writer: &mut ModuleWriter) {
        writer.emit_string(&self.type_name);
        writer.emit_u16(self.args.len() as u16);
        for arg in &self.args {
            arg.encode(writer);
        }
    }

    fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let type_name = reader.read_string()?;
        let count = reader.read_u16()? as usize;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(Constant::decode(reader)?);
        }
        Ok(Self { type_name, args })
    }
}

/// Find the first attribute of the given marker type
pub fn find_attribute<'a>(attributes: &'a [Attribute], type_name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.type_name == type_name)
}

/// Remove every attribute of the given marker type
pub fn remove_attribute(attributes: &mut Vec<Attribute>, type_name: &str) {
    attributes.retain(|a| a.type_name != type_name);
}

/// A method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Markers attached to the parameter
    pub attributes: Vec<Attribute>,
}

impl ParamDef {
    /// Create a parameter with no markers
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            attributes: Vec::new(),
        }
    }

    fn encode(&self, writer: &mut ModuleWriter) {
        writer.emit_string(&self.name);
        self.ty.encode(writer);
        encode_attributes(&self.attributes, writer);
    }

    fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            ty: TypeRef::decode(reader)?,
            attributes: decode_attributes(reader)?,
        })
    }
}

/// A field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Storage type
    pub ty: TypeRef,
    /// Whether the field is static
    pub is_static: bool,
    /// Field visibility
    pub visibility: Visibility,
    /// Initial value, applied at allocation (instance) or load (static)
    pub init: Option<Constant>,
}

impl FieldDef {
    fn encode(&self, writer: &mut ModuleWriter) {
        writer.emit_string(&self.name);
        self.ty.encode(writer);
        writer.emit_u8(self.is_static as u8);
        self.visibility.encode(writer);
        match &self.init {
            Some(constant) => {
                writer.emit_u8(1);
                constant.encode(writer);
            }
            None => writer.emit_u8(0),
        }
    }

    fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let ty = TypeRef::decode(reader)?;
        let is_static = reader.read_u8()? != 0;
        let visibility = Visibility::decode(reader)?;
        let init = if reader.read_u8()? != 0 {
            Some(Constant::decode(reader)?)
        } else {
            None
        };
        Ok(Self {
            name,
            ty,
            is_static,
            visibility,
            init,
        })
    }
}

/// A method definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name; constructors are named [`CONSTRUCTOR_NAME`]
    pub name: String,
    /// Method visibility
    pub visibility: Visibility,
    /// Whether the method is static
    pub is_static: bool,
    /// Whether the method participates in virtual dispatch
    pub is_virtual: bool,
    /// Names of the method's own generic parameters, by position
    pub generic_params: Vec<String>,
    /// Declared parameters (the receiver is not listed)
    pub params: Vec<ParamDef>,
    /// Declared return type
    pub return_type: TypeRef,
    /// Markers attached to the return value
    pub return_attributes: Vec<Attribute>,
    /// Instruction body; empty for stubs
    pub body: Vec<Instr>,
    /// Markers attached to the method
    pub attributes: Vec<Attribute>,
}

impl MethodDef {
    /// Whether this method is a constructor
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME && !self.is_static
    }

    /// Whether this method has no body
    pub fn is_stub(&self) -> bool {
        self.body.is_empty()
    }

    fn encode(&self, writer: &mut ModuleWriter) {
        writer.emit_string(&self.name);
        self.visibility.encode(writer);
        let mut flags = 0u8;
        if self.is_static {
            flags |= 1;
        }
        if self.is_virtual {
            flags |= 2;
        }
        writer.emit_u8(flags);
        writer.emit_u16(self.generic_params.len() as u16);
        for param in &self.generic_params {
            writer.emit_string(param);
        }
        writer.emit_u16(self.params.len() as u16);
        for param in &self.params {
            param.encode(writer);
        }
        self.return_type.encode(writer);
        encode_attributes(&self.return_attributes, writer);
        writer.emit_u32(self.body.len() as u32);
        for instr in &self.body {
            instr.encode(writer);
        }
        encode_attributes(&self.attributes, writer);
    }

    fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let visibility = Visibility::decode(reader)?;
        let flags = reader.read_u8()?;
        let generic_count = reader.read_u16()? as usize;
        let mut generic_params = Vec::with_capacity(generic_count);
        for _ in 0..generic_count {
            generic_params.push(reader.read_string()?);
        }
        let param_count = reader.read_u16()? as usize;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(ParamDef::decode(reader)?);
        }
        let return_type = TypeRef::decode(reader)?;
        let return_attributes = decode_attributes(reader)?;
        let body_count = reader.read_u32()? as usize;
        let mut body = Vec::with_capacity(body_count);
        for _ in 0..body_count {
            body.push(Instr::decode(reader)?);
        }
        let attributes = decode_attributes(reader)?;
        Ok(Self {
            name,
            visibility,
            is_static: flags & 1 != 0,
            is_virtual: flags & 2 != 0,
            generic_params,
            params,
            return_type,
            return_attributes,
            body,
            attributes,
        })
    }
}

/// A type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Dotted full name, unique within the module (nested types included)
    pub name: String,
    /// Type visibility
    pub visibility: Visibility,
    /// Whether the type can be derived from
    pub sealed: bool,
    /// Base type, if any
    pub base: Option<TypeRef>,
    /// Names of the type's generic parameters, by position
    pub generic_params: Vec<String>,
    /// Field definitions
    pub fields: Vec<FieldDef>,
    /// Method definitions
    pub methods: Vec<MethodDef>,
    /// Nested type definitions
    pub nested: Vec<TypeDef>,
    /// Markers attached to the type
    pub attributes: Vec<Attribute>,
}

impl TypeDef {
    /// Find a field by name on this type only (no base-chain walk)
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a nested or self definition by full name
    pub fn find(&self, full_name: &str) -> Option<&TypeDef> {
        if self.name == full_name {
            return Some(self);
        }
        self.nested.iter().find_map(|t| t.find(full_name))
    }

    fn encode(&self, writer: &mut ModuleWriter) {
        writer.emit_string(&self.name);
        self.visibility.encode(writer);
        writer.emit_u8(self.sealed as u8);
        match &self.base {
            Some(base) => {
                writer.emit_u8(1);
                base.encode(writer);
            }
            None => writer.emit_u8(0),
        }
        writer.emit_u16(self.generic_params.len() as u16);
        for param in &self.generic_params {
            writer.emit_string(param);
        }
        writer.emit_u16(self.fields.len() as u16);
        for field in &self.fields {
            field.encode(writer);
        }
        writer.emit_u16(self.methods.len() as u16);
        for method in &self.methods {
            method.encode(writer);
        }
        writer.emit_u16(self.nested.len() as u16);
        for nested in &self.nested {
            nested.encode(writer);
        }
        encode_attributes(&self.attributes, writer);
    }

    fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let visibility = Visibility::decode(reader)?;
        let sealed = reader.read_u8()? != 0;
        let base = if reader.read_u8()? != 0 {
            Some(TypeRef::decode(reader)?)
        } else {
            None
        };
        let generic_count = reader.read_u16()? as usize;
        let mut generic_params = Vec::with_capacity(generic_count);
        for _ in 0..generic_count {
            generic_params.push(reader.read_string()?);
        }
        let field_count = reader.read_u16()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(FieldDef::decode(reader)?);
        }
        let method_count = reader.read_u16()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(MethodDef::decode(reader)?);
        }
        let nested_count = reader.read_u16()? as usize;
        let mut nested = Vec::with_capacity(nested_count);
        for _ in 0..nested_count {
            nested.push(TypeDef::decode(reader)?);
        }
        let attributes = decode_attributes(reader)?;
        Ok(Self {
            name,
            visibility,
            sealed,
            base,
            generic_params,
            fields,
            methods,
            nested,
            attributes,
        })
    }
}

/// A reference to a field, possibly bound to a generic instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Declaring type (a [`TypeRef::GenericInst`] when bound)
    pub declaring: TypeRef,
    /// Field name
    pub name: String,
    /// Storage type; may be a generic parameter placeholder
    pub ty: TypeRef,
}

impl FieldRef {
    /// Encode this reference into a writer
    pub fn encode(&self, writer: &mut ModuleWriter) {
        self.declaring.encode(writer);
        writer.emit_string(&self.name);
        self.ty.encode(writer);
    }

    /// Decode a reference from a reader
    pub fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            declaring: TypeRef::decode(reader)?,
            name: reader.read_string()?,
            ty: TypeRef::decode(reader)?,
        })
    }
}

/// A reference to a method, possibly bound to a generic instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Declaring type (a [`TypeRef::GenericInst`] when bound)
    pub declaring: TypeRef,
    /// Method name
    pub name: String,
    /// Whether the target is static
    pub is_static: bool,
    /// Parameter types; may contain generic parameter placeholders
    pub params: Vec<TypeRef>,
    /// Return type; may be a generic parameter placeholder
    pub return_type: TypeRef,
}

impl MethodRef {
    /// Encode this reference into a writer
    pub fn encode(&self, writer: &mut ModuleWriter) {
        self.declaring.encode(writer);
        writer.emit_string(&self.name);
        writer.emit_u8(self.is_static as u8);
        writer.emit_u16(self.params.len() as u16);
        for param in &self.params {
            param.encode(writer);
        }
        self.return_type.encode(writer);
    }

    /// Decode a reference from a reader
    pub fn decode(reader: &mut ModuleReader<'_>) -> Result<Self, DecodeError> {
        let declaring = TypeRef::decode(reader)?;
        let name = reader.read_string()?;
        let is_static = reader.read_u8()? != 0;
        let count = reader.read_u16()? as usize;
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            params.push(TypeRef::decode(reader)?);
        }
        let return_type = TypeRef::decode(reader)?;
        Ok(Self {
            declaring,
            name,
            is_static,
            params,
            return_type,
        })
    }
}

/// A compiled module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Names of directly referenced modules, in reference order
    pub references: Vec<String>,
    /// Top-level type definitions
    pub types: Vec<TypeDef>,
    /// Module-level markers
    pub attributes: Vec<Attribute>,
}

impl Module {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            references: Vec::new(),
            types: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Find a type definition by full name, searching nested types too
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.iter().find_map(|t| t.find(full_name))
    }

    /// Encode the module to the binary format
    ///
    /// Format: magic (4 bytes) + version (u32) + checksum (u32), followed
    /// by the payload: name, references, module attributes, types. The
    /// checksum is the crc32 of the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ModuleWriter::new();

        writer.buffer.extend_from_slice(&MAGIC);
        writer.emit_u32(VERSION);
        let checksum_offset = writer.offset();
        writer.emit_u32(0);

        let payload_start = writer.offset();
        writer.emit_string(&self.name);
        writer.emit_u16(self.references.len() as u16);
        for reference in &self.references {
            writer.emit_string(reference);
        }
        encode_attributes(&self.attributes, &mut writer);
        writer.emit_u16(self.types.len() as u16);
        for ty in &self.types {
            ty.encode(&mut writer);
        }

        let checksum = crc32fast::hash(&writer.buffer[payload_start..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a module from the binary format
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = ModuleReader::new(data);

        let magic_bytes = reader.read_bytes(4)?;
        let magic: [u8; 4] = magic_bytes.try_into().expect("read_bytes returned 4 bytes");
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let stored_checksum = reader.read_u32()?;
        let actual_checksum = crc32fast::hash(&data[12..]);
        if stored_checksum != actual_checksum {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_checksum,
                actual: actual_checksum,
            });
        }

        let name = reader.read_string()?;
        let reference_count = reader.read_u16()? as usize;
        let mut references = Vec::with_capacity(reference_count);
        for _ in 0..reference_count {
            references.push(reader.read_string()?);
        }
        let attributes = decode_attributes(&mut reader)?;
        let type_count = reader.read_u16()? as usize;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(TypeDef::decode(&mut reader)?);
        }

        Ok(Self {
            name,
            references,
            types,
            attributes,
        })
    }
}

fn encode_attributes(attributes: &[Attribute], writer: &mut ModuleWriter) {
    writer.emit_u16(attributes.len() as u16);
    for attribute in attributes {
        attribute.encode(writer);
    }
}

fn decode_attributes(reader: &mut ModuleReader<'_>) -> Result<Vec<Attribute>, DecodeError> {
    let count = reader.read_u16()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        attributes.push(Attribute::decode(reader)?);
    }
    Ok(attributes)
}
