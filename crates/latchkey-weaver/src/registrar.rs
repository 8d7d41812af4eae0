//! Access-waiver registration
//!
//! Every foreign module whose members a woven body touches gets one
//! module-level `std.AccessWaiver` marker, so the loader can waive access
//! checks for exactly those modules. The waiver marker type itself is
//! synthesized into the module when neither it nor a referenced module
//! already defines it.

use crate::diag::Diagnostics;
use crate::error::{WeaveError, WeaveResult};
use crate::markers::{ACCESS_WAIVER_MARKER, ANNOTATION_BASE};
use crate::resolve::{ModuleSet, Resolver};
use latchkey_bytecode::module::CONSTRUCTOR_NAME;
use latchkey_bytecode::{
    Attribute, Constant, FieldRef, Instr, MethodBuilder, MethodRef, Module, ParamDef, TypeBuilder,
    TypeRef, Visibility,
};

/// Record one waiver per foreign module in `foreign` (sorted, deduped)
pub(crate) fn register_waivers(
    module: &mut Module,
    set: &ModuleSet,
    foreign: &[String],
    diags: &mut Diagnostics,
) -> WeaveResult<()> {
    if foreign.is_empty() {
        return Ok(());
    }

    let synthesized = ensure_waiver_type(module, set)?;
    if let Some(ty) = synthesized {
        diags.debug(format!("synthesized waiver type '{}'", ty.name));
        module.types.push(ty);
    }

    for name in foreign {
        if has_waiver_for(module, name) {
            continue;
        }
        module.attributes.push(Attribute::new(
            ACCESS_WAIVER_MARKER,
            vec![Constant::Str(name.clone())],
        ));
        diags.info(format!("registered access waiver for module '{name}'"));
    }
    Ok(())
}

fn has_waiver_for(module: &Module, target: &str) -> bool {
    module
        .attributes
        .iter()
        .any(|a| a.type_name == ACCESS_WAIVER_MARKER && a.str_arg(0) == Some(target))
}

/// Build the waiver type definition when no visible one exists
fn ensure_waiver_type(
    module: &Module,
    set: &ModuleSet,
) -> WeaveResult<Option<latchkey_bytecode::TypeDef>> {
    let resolver = Resolver::new(module, set);
    if resolver.find_type(ACCESS_WAIVER_MARKER).is_some() {
        return Ok(None);
    }

    let annotation = resolver
        .find_type(ANNOTATION_BASE)
        .ok_or_else(|| WeaveError::MissingMarkerType(ANNOTATION_BASE.to_string()))?;
    let has_default_ctor = annotation
        .def
        .methods
        .iter()
        .any(|m| m.is_constructor() && m.params.is_empty());
    if !has_default_ctor {
        return Err(WeaveError::MissingMarkerConstructor(
            ANNOTATION_BASE.to_string(),
        ));
    }

    let name_field = FieldRef {
        declaring: TypeRef::Named(ACCESS_WAIVER_MARKER.to_string()),
        name: "_module_name".to_string(),
        ty: TypeRef::Str,
    };
    let base_ctor = MethodRef {
        declaring: TypeRef::Named(ANNOTATION_BASE.to_string()),
        name: CONSTRUCTOR_NAME.to_string(),
        is_static: false,
        params: Vec::new(),
        return_type: TypeRef::Void,
    };

    let ty = TypeBuilder::new(ACCESS_WAIVER_MARKER)
        .visibility(Visibility::Internal)
        .sealed()
        .base(TypeRef::Named(ANNOTATION_BASE.to_string()))
        .field("_module_name", TypeRef::Str, Visibility::Private)
        .method(
            MethodBuilder::new("module_name", TypeRef::Str)
                .body(vec![
                    Instr::LoadArg(0),
                    Instr::LoadField(name_field.clone()),
                    Instr::Return,
                ])
                .build(),
        )
        .method(
            MethodBuilder::new(CONSTRUCTOR_NAME, TypeRef::Void)
                .param_def(ParamDef::new("module_name", TypeRef::Str))
                .body(vec![
                    Instr::LoadArg(0),
                    Instr::Call(base_ctor),
                    Instr::LoadArg(0),
                    Instr::LoadArg(1),
                    Instr::StoreField(name_field),
                    Instr::Return,
                ])
                .build(),
        )
        .build();

    Ok(Some(ty))
}

/// The waivers currently recorded on a module, in attribute order
#[cfg(test)]
fn recorded_waivers(module: &Module) -> Vec<&str> {
    module
        .attributes
        .iter()
        .filter(|a| a.type_name == ACCESS_WAIVER_MARKER)
        .filter_map(|a| a.str_arg(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_bytecode::ModuleBuilder;

    fn std_module() -> Module {
        let mut builder = ModuleBuilder::new("std");
        builder.add_type(
            TypeBuilder::new(ANNOTATION_BASE)
                .method(
                    MethodBuilder::new(CONSTRUCTOR_NAME, TypeRef::Void)
                        .body(vec![Instr::Return])
                        .build(),
                )
                .build(),
        );
        builder.build()
    }

    fn app_module() -> Module {
        let mut builder = ModuleBuilder::new("app");
        builder.reference("std");
        builder.reference("lib");
        builder.build()
    }

    #[test]
    fn test_registers_one_waiver_per_module() {
        let mut app = app_module();
        let mut set = ModuleSet::new();
        set.add(std_module());
        let mut diags = Diagnostics::new();

        register_waivers(
            &mut app,
            &set,
            &["lib".to_string(), "util".to_string()],
            &mut diags,
        )
        .unwrap();

        assert_eq!(recorded_waivers(&app), vec!["lib", "util"]);
        assert!(app.find_type(ACCESS_WAIVER_MARKER).is_some());
    }

    #[test]
    fn test_existing_waiver_not_duplicated() {
        let mut app = app_module();
        app.attributes.push(Attribute::new(
            ACCESS_WAIVER_MARKER,
            vec![Constant::Str("lib".to_string())],
        ));
        let mut set = ModuleSet::new();
        set.add(std_module());
        let mut diags = Diagnostics::new();

        register_waivers(&mut app, &set, &["lib".to_string()], &mut diags).unwrap();
        assert_eq!(recorded_waivers(&app), vec!["lib"]);
    }

    #[test]
    fn test_waiver_type_from_reference_is_reused() {
        let mut app = app_module();
        let mut set = ModuleSet::new();
        let mut std = std_module();
        std.types.push(TypeBuilder::new(ACCESS_WAIVER_MARKER).build());
        set.add(std);
        let mut diags = Diagnostics::new();

        register_waivers(&mut app, &set, &["lib".to_string()], &mut diags).unwrap();
        assert!(app.find_type(ACCESS_WAIVER_MARKER).is_none());
        assert_eq!(recorded_waivers(&app), vec!["lib"]);
    }

    #[test]
    fn test_no_foreign_access_registers_nothing() {
        let mut app = app_module();
        let set = ModuleSet::new();
        let mut diags = Diagnostics::new();

        register_waivers(&mut app, &set, &[], &mut diags).unwrap();
        assert!(recorded_waivers(&app).is_empty());
        assert!(app.find_type(ACCESS_WAIVER_MARKER).is_none());
    }

    #[test]
    fn test_missing_annotation_base_is_fatal() {
        let mut app = app_module();
        let set = ModuleSet::new();
        let mut diags = Diagnostics::new();

        let result = register_waivers(&mut app, &set, &["lib".to_string()], &mut diags);
        assert!(matches!(result, Err(WeaveError::MissingMarkerType(_))));
    }
}
