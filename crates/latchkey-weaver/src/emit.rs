//! Instruction emission
//!
//! Each accessor shape maps to a fixed instruction sequence. Conversions
//! are inserted only at the `object` boundary: a value flowing out of an
//! `object`-typed slot is unboxed or downcast to the concrete type, and a
//! value type flowing into an `object`-typed slot is boxed. Placeholders
//! are never converted; the loader binds them at run time.

use latchkey_bytecode::{FieldRef, Instr, MethodRef, TypeRef};

/// The three field-accessor shapes, decided by the stub's return type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldShape {
    /// Non-void, non-by-ref return: read the field
    Getter,
    /// Void return: write the field from the value parameter
    Setter,
    /// By-ref return: expose the field's storage slot
    Reference,
}

pub(crate) fn field_shape(return_type: &TypeRef) -> FieldShape {
    match return_type {
        TypeRef::Void => FieldShape::Setter,
        TypeRef::ByRef(_) => FieldShape::Reference,
        _ => FieldShape::Getter,
    }
}

/// Downcast or unbox when a value leaves an `object`-typed slot
pub(crate) fn emit_cast_if_needed(body: &mut Vec<Instr>, source: &TypeRef, target: &TypeRef) {
    if source == target || source.is_generic_param() || target.is_generic_param() {
        return;
    }
    if *source == TypeRef::Object {
        if target.is_value_type() {
            body.push(Instr::Unbox(target.clone()));
        } else {
            body.push(Instr::CastClass(target.clone()));
        }
    }
}

/// Box when a value type flows into an `object`-typed slot
pub(crate) fn emit_box_if_needed(body: &mut Vec<Instr>, source: &TypeRef, target: &TypeRef) {
    if source == target {
        return;
    }
    if *target == TypeRef::Object && source.is_value_type() {
        body.push(Instr::Box(source.clone()));
    }
}

/// Field getter body
///
/// `actual_return` is the override-resolved return type, `declared_return`
/// the type the stub's signature spells.
pub(crate) fn field_getter(
    field: FieldRef,
    is_static: bool,
    actual_return: &TypeRef,
    declared_return: &TypeRef,
) -> Vec<Instr> {
    let mut body = Vec::new();
    if is_static {
        body.push(Instr::LoadStatic(field));
    } else {
        body.push(Instr::LoadArg(0));
        body.push(Instr::LoadField(field));
    }
    emit_box_if_needed(&mut body, actual_return, declared_return);
    body.push(Instr::Return);
    body
}

/// Field setter body
///
/// The value is argument 1 in both forms; for static fields argument 0 is
/// the ignored target-type marker.
pub(crate) fn field_setter(
    field: FieldRef,
    is_static: bool,
    declared_value: &TypeRef,
    actual_value: &TypeRef,
) -> Vec<Instr> {
    let mut body = Vec::new();
    if is_static {
        body.push(Instr::LoadArg(1));
        emit_cast_if_needed(&mut body, declared_value, actual_value);
        body.push(Instr::StoreStatic(field));
    } else {
        body.push(Instr::LoadArg(0));
        body.push(Instr::LoadArg(1));
        emit_cast_if_needed(&mut body, declared_value, actual_value);
        body.push(Instr::StoreField(field));
    }
    body.push(Instr::Return);
    body
}

/// Field reference body; callers have already validated the exact match
pub(crate) fn field_reference(field: FieldRef, is_static: bool) -> Vec<Instr> {
    let mut body = Vec::new();
    if is_static {
        body.push(Instr::LoadStaticRef(field));
    } else {
        body.push(Instr::LoadArg(0));
        body.push(Instr::LoadFieldRef(field));
    }
    body.push(Instr::Return);
    body
}

/// Method call body
///
/// Argument 0 is the receiver (instance) or ignored marker (static);
/// remaining arguments forward to the target. `declared_args` are the
/// stub's forwarded parameter types, `actual_args` the override-resolved
/// target-side types, both excluding the leading slot.
pub(crate) fn method_call(
    target_method: MethodRef,
    target: &TypeRef,
    declared_receiver: &TypeRef,
    declared_args: &[TypeRef],
    actual_args: &[TypeRef],
    actual_return: &TypeRef,
    declared_return: &TypeRef,
) -> Vec<Instr> {
    let mut body = Vec::new();
    let is_static = target_method.is_static;

    if !is_static {
        body.push(Instr::LoadArg(0));
        emit_cast_if_needed(&mut body, declared_receiver, target);
    }

    for (i, (declared, actual)) in declared_args.iter().zip(actual_args).enumerate() {
        body.push(Instr::LoadArg((i + 1) as u16));
        emit_cast_if_needed(&mut body, declared, actual);
    }

    if is_static {
        body.push(Instr::Call(target_method));
    } else {
        body.push(Instr::CallVirtual(target_method));
    }

    emit_box_if_needed(&mut body, actual_return, declared_return);
    body.push(Instr::Return);
    body
}

/// Constructor call body; every stub parameter forwards to the target
pub(crate) fn constructor_call(
    constructor: MethodRef,
    declared_args: &[TypeRef],
    actual_args: &[TypeRef],
) -> Vec<Instr> {
    let mut body = Vec::new();
    for (i, (declared, actual)) in declared_args.iter().zip(actual_args).enumerate() {
        body.push(Instr::LoadArg(i as u16));
        emit_cast_if_needed(&mut body, declared, actual);
    }
    body.push(Instr::NewObject(constructor));
    body.push(Instr::Return);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_bytecode::GenericParamKind;

    fn sample_field() -> FieldRef {
        FieldRef {
            declaring: TypeRef::Named("lib.FieldTarget".to_string()),
            name: "_value".to_string(),
            ty: TypeRef::Int,
        }
    }

    #[test]
    fn test_field_shape_from_return_type() {
        assert_eq!(field_shape(&TypeRef::Void), FieldShape::Setter);
        assert_eq!(
            field_shape(&TypeRef::ByRef(Box::new(TypeRef::Int))),
            FieldShape::Reference
        );
        assert_eq!(field_shape(&TypeRef::Int), FieldShape::Getter);
    }

    #[test]
    fn test_instance_getter_sequence() {
        let body = field_getter(sample_field(), false, &TypeRef::Int, &TypeRef::Int);
        assert_eq!(
            body,
            vec![
                Instr::LoadArg(0),
                Instr::LoadField(sample_field()),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_getter_boxes_into_object_return() {
        let body = field_getter(sample_field(), true, &TypeRef::Int, &TypeRef::Object);
        assert_eq!(
            body,
            vec![
                Instr::LoadStatic(sample_field()),
                Instr::Box(TypeRef::Int),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_static_setter_skips_marker_argument() {
        let body = field_setter(sample_field(), true, &TypeRef::Object, &TypeRef::Int);
        assert_eq!(
            body,
            vec![
                Instr::LoadArg(1),
                Instr::Unbox(TypeRef::Int),
                Instr::StoreStatic(sample_field()),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_cast_skips_generic_params() {
        let mut body = Vec::new();
        let placeholder = TypeRef::GenericParam {
            kind: GenericParamKind::Type,
            position: 0,
        };
        emit_cast_if_needed(&mut body, &TypeRef::Object, &placeholder);
        emit_cast_if_needed(&mut body, &placeholder, &TypeRef::Int);
        assert!(body.is_empty());
    }

    #[test]
    fn test_cast_downcasts_references() {
        let mut body = Vec::new();
        let widget = TypeRef::Named("lib.Widget".to_string());
        emit_cast_if_needed(&mut body, &TypeRef::Object, &widget);
        assert_eq!(body, vec![Instr::CastClass(widget)]);
    }

    #[test]
    fn test_instance_call_casts_object_receiver() {
        let target = TypeRef::Named("lib.MethodTarget".to_string());
        let mref = MethodRef {
            declaring: target.clone(),
            name: "add".to_string(),
            is_static: false,
            params: vec![TypeRef::Int],
            return_type: TypeRef::Int,
        };
        let body = method_call(
            mref.clone(),
            &target,
            &TypeRef::Object,
            &[TypeRef::Int],
            &[TypeRef::Int],
            &TypeRef::Int,
            &TypeRef::Int,
        );
        assert_eq!(
            body,
            vec![
                Instr::LoadArg(0),
                Instr::CastClass(target),
                Instr::LoadArg(1),
                Instr::CallVirtual(mref),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_constructor_forwards_all_arguments() {
        let ctor = MethodRef {
            declaring: TypeRef::Named("lib.CtorTarget".to_string()),
            name: "constructor".to_string(),
            is_static: false,
            params: vec![TypeRef::Int, TypeRef::Str],
            return_type: TypeRef::Void,
        };
        let body = constructor_call(
            ctor.clone(),
            &[TypeRef::Int, TypeRef::Str],
            &[TypeRef::Int, TypeRef::Str],
        );
        assert_eq!(
            body,
            vec![
                Instr::LoadArg(0),
                Instr::LoadArg(1),
                Instr::NewObject(ctor),
                Instr::Return,
            ]
        );
    }
}
