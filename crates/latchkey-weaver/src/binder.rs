//! Member reference binding
//!
//! A resolved member is turned into a reference bound to the target type
//! as the stub named it, instantiation included. Members found on a base
//! type are still bound through the named target, and member types are
//! carried verbatim, placeholders and all; the loader binds placeholders
//! to the instantiation at run time.

use latchkey_bytecode::{FieldDef, FieldRef, MethodDef, MethodRef, TypeRef};

pub(crate) fn bind_field(target: &TypeRef, field: &FieldDef) -> FieldRef {
    FieldRef {
        declaring: target.clone(),
        name: field.name.clone(),
        ty: field.ty.clone(),
    }
}

pub(crate) fn bind_method(target: &TypeRef, method: &MethodDef) -> MethodRef {
    MethodRef {
        declaring: target.clone(),
        name: method.name.clone(),
        is_static: method.is_static,
        params: method.params.iter().map(|p| p.ty.clone()).collect(),
        return_type: method.return_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_bytecode::{FieldDef, GenericParamKind, MethodBuilder, Visibility};

    #[test]
    fn test_field_bound_to_instantiation() {
        let target = TypeRef::GenericInst {
            definition: "lib.Box".to_string(),
            args: vec![TypeRef::Int],
        };
        let field = FieldDef {
            name: "_item".to_string(),
            ty: TypeRef::GenericParam {
                kind: GenericParamKind::Type,
                position: 0,
            },
            is_static: false,
            visibility: Visibility::Private,
            init: None,
        };

        let bound = bind_field(&target, &field);
        assert_eq!(bound.declaring, target);
        assert!(bound.ty.is_generic_param());
    }

    #[test]
    fn test_method_signature_carried_verbatim() {
        let target = TypeRef::Named("lib.MethodTarget".to_string());
        let method = MethodBuilder::new("add", TypeRef::Int)
            .visibility(Visibility::Private)
            .param("amount", TypeRef::Int)
            .build();

        let bound = bind_method(&target, &method);
        assert_eq!(bound.declaring, target);
        assert_eq!(bound.params, vec![TypeRef::Int]);
        assert_eq!(bound.return_type, TypeRef::Int);
        assert!(!bound.is_static);
    }
}
