//! Declarative marker vocabulary
//!
//! Stubs are static methods carrying a `latchkey.Accessor` marker; the
//! optional `latchkey.TargetType` marker on parameters and return values
//! overrides the declared type with a string-encoded one. Both markers
//! are processing-only and are stripped from successfully woven methods,
//! which instead receive `std.Synthesized`.

use latchkey_bytecode::module::find_attribute;
use latchkey_bytecode::{Attribute, MethodDef, ParamDef};

/// Marker placed on accessor stub methods
pub const ACCESSOR_MARKER: &str = "latchkey.Accessor";

/// Marker overriding a declared parameter/return type with a named one
pub const TARGET_TYPE_MARKER: &str = "latchkey.TargetType";

/// Marker added to successfully woven methods
pub const SYNTHESIZED_MARKER: &str = "std.Synthesized";

/// Module-level access-waiver marker
pub const ACCESS_WAIVER_MARKER: &str = "std.AccessWaiver";

/// Base type all marker types derive from
pub const ANNOTATION_BASE: &str = "std.Annotation";

/// The category of member an accessor targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// Instance field access
    Field,
    /// Static field access
    StaticField,
    /// Instance method call
    Method,
    /// Static method call
    StaticMethod,
    /// Constructor call
    Constructor,
}

impl AccessorKind {
    /// Decode the marker's kind argument
    pub fn from_marker_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(AccessorKind::Field),
            1 => Some(AccessorKind::StaticField),
            2 => Some(AccessorKind::Method),
            3 => Some(AccessorKind::StaticMethod),
            4 => Some(AccessorKind::Constructor),
            _ => None,
        }
    }
}

/// What one stub's markers declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDeclaration {
    /// Requested accessor kind
    pub kind: AccessorKind,
    /// Explicit target member name; absent for constructors
    pub member_name: Option<String>,
}

/// Reasons a `latchkey.Accessor` marker cannot be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    /// The kind argument is missing or not an integer
    MissingKind,
    /// The kind argument has no corresponding accessor kind
    InvalidKind(i64),
}

/// Find the accessor marker on a method, if any
pub(crate) fn accessor_marker(method: &MethodDef) -> Option<&Attribute> {
    find_attribute(&method.attributes, ACCESSOR_MARKER)
}

/// Read a stub declaration from an accessor marker
pub(crate) fn read_declaration(marker: &Attribute) -> Result<StubDeclaration, MarkerError> {
    let raw = marker.int_arg(0).ok_or(MarkerError::MissingKind)?;
    let kind = AccessorKind::from_marker_value(raw).ok_or(MarkerError::InvalidKind(raw))?;
    let member_name = marker.str_arg(1).map(str::to_string);
    Ok(StubDeclaration { kind, member_name })
}

/// The type-name override on a parameter, if any
pub(crate) fn param_override(param: &ParamDef) -> Option<&str> {
    find_attribute(&param.attributes, TARGET_TYPE_MARKER).and_then(|a| a.str_arg(0))
}

/// The type-name override on the return value, if any
pub(crate) fn return_override(method: &MethodDef) -> Option<&str> {
    find_attribute(&method.return_attributes, TARGET_TYPE_MARKER).and_then(|a| a.str_arg(0))
}

/// Whether the return value carries a type-name override marker
pub(crate) fn has_return_override(method: &MethodDef) -> bool {
    find_attribute(&method.return_attributes, TARGET_TYPE_MARKER).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_bytecode::{Constant, MethodBuilder, TypeRef};

    #[test]
    fn test_read_declaration_with_name() {
        let marker = Attribute::new(
            ACCESSOR_MARKER,
            vec![Constant::Int(0), Constant::Str("_value".to_string())],
        );
        let decl = read_declaration(&marker).unwrap();
        assert_eq!(decl.kind, AccessorKind::Field);
        assert_eq!(decl.member_name.as_deref(), Some("_value"));
    }

    #[test]
    fn test_read_declaration_constructor_has_no_name() {
        let marker = Attribute::new(ACCESSOR_MARKER, vec![Constant::Int(4)]);
        let decl = read_declaration(&marker).unwrap();
        assert_eq!(decl.kind, AccessorKind::Constructor);
        assert!(decl.member_name.is_none());
    }

    #[test]
    fn test_invalid_kind_value() {
        let marker = Attribute::new(ACCESSOR_MARKER, vec![Constant::Int(17)]);
        assert_eq!(read_declaration(&marker), Err(MarkerError::InvalidKind(17)));
    }

    #[test]
    fn test_missing_kind_value() {
        let marker = Attribute::new(ACCESSOR_MARKER, vec![]);
        assert_eq!(read_declaration(&marker), Err(MarkerError::MissingKind));
    }

    #[test]
    fn test_accessor_marker_lookup() {
        let method = MethodBuilder::new("get_value", TypeRef::Int)
            .static_()
            .attribute(Attribute::new(ACCESSOR_MARKER, vec![Constant::Int(0)]))
            .build();
        assert!(accessor_marker(&method).is_some());

        let plain = MethodBuilder::new("run", TypeRef::Void).build();
        assert!(accessor_marker(&plain).is_none());
    }
}
