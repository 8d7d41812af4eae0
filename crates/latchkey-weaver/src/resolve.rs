//! Type and member resolution
//!
//! Resolution always searches the module under transformation first and
//! then its referenced modules in reference order, so the first match by
//! full name wins. Member lookup walks base chains with a visited guard
//! against cycles, and compares signatures with a generic-aware match
//! that treats the target's placeholders as holes the accessor fills.

use crate::type_name::TypeName;
use latchkey_bytecode::{FieldDef, GenericParamKind, MethodDef, Module, TypeDef, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};

/// The referenced modules visible during a weave
#[derive(Debug, Default)]
pub struct ModuleSet {
    modules: FxHashMap<String, Module>,
}

impl ModuleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a referenced module, replacing any previous one of the same name
    pub fn add(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Look up a module by name
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }
}

/// A type definition together with the module that defines it
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedType<'a> {
    pub def: &'a TypeDef,
    pub module: &'a str,
}

/// Generic surroundings of the stub being woven
#[derive(Debug, Clone, Copy)]
pub(crate) struct GenericContext<'a> {
    /// Generic parameter count of the stub's enclosing type
    pub type_param_count: usize,
    /// Generic parameter count of the stub method itself
    pub method_param_count: usize,
    /// The target type as the stub names it, instantiation included
    pub target: &'a TypeRef,
}

/// Name-based lookup across the current module and its references
pub(crate) struct Resolver<'a> {
    current: &'a Module,
    set: &'a ModuleSet,
}

impl<'a> Resolver<'a> {
    pub fn new(current: &'a Module, set: &'a ModuleSet) -> Self {
        Self { current, set }
    }

    /// Find a type definition by full name
    pub fn find_type(&self, full_name: &str) -> Option<ResolvedType<'a>> {
        if let Some(def) = self.current.find_type(full_name) {
            return Some(ResolvedType {
                def,
                module: &self.current.name,
            });
        }
        for reference in &self.current.references {
            if let Some(module) = self.set.get(reference) {
                if let Some(def) = module.find_type(full_name) {
                    return Some(ResolvedType {
                        def,
                        module: &module.name,
                    });
                }
            }
        }
        None
    }

    /// Turn a parsed type name into a reference, resolving named parts
    ///
    /// Builtin names map directly. Named types must resolve to a
    /// definition whose arity matches the argument list. The defining
    /// module of the outermost named type is returned alongside, `None`
    /// for builtins.
    pub fn resolve_name(&self, parsed: &TypeName) -> Result<(TypeRef, Option<String>), String> {
        if parsed.args.is_empty() && parsed.arity.is_none() {
            if let Some(builtin) = builtin_type(&parsed.name) {
                return Ok((builtin, None));
            }
        }

        let resolved = self
            .find_type(&parsed.name)
            .ok_or_else(|| format!("type '{}' was not found", parsed.name))?;

        let declared_arity = resolved.def.generic_params.len();
        if let Some(arity) = parsed.arity {
            if arity as usize != declared_arity {
                return Err(format!(
                    "type '{}' declares {} generic parameter(s), name says {}",
                    parsed.name, declared_arity, arity
                ));
            }
        }
        if parsed.args.len() != declared_arity && !parsed.args.is_empty() {
            return Err(format!(
                "type '{}' declares {} generic parameter(s), {} argument(s) given",
                parsed.name,
                declared_arity,
                parsed.args.len()
            ));
        }

        let module = Some(resolved.module.to_string());
        if parsed.args.is_empty() {
            return Ok((TypeRef::Named(parsed.name.clone()), module));
        }

        let mut args = Vec::with_capacity(parsed.args.len());
        for arg in &parsed.args {
            let (ty, _) = self.resolve_name(arg)?;
            args.push(ty);
        }
        Ok((
            TypeRef::GenericInst {
                definition: parsed.name.clone(),
                args,
            },
            module,
        ))
    }

    /// Find a field by name on the target type or one of its bases
    pub fn find_field(
        &self,
        target: ResolvedType<'a>,
        name: &str,
        is_static: bool,
    ) -> Option<&'a FieldDef> {
        self.walk_chain(target, |def| {
            def.fields
                .iter()
                .find(|f| f.name == name && f.is_static == is_static)
        })
    }

    /// Find a method by name and signature on the target type or a base
    pub fn find_method(
        &self,
        target: ResolvedType<'a>,
        name: &str,
        is_static: bool,
        arg_types: &[TypeRef],
        ctx: &GenericContext<'_>,
    ) -> Option<&'a MethodDef> {
        self.walk_chain(target, |def| {
            def.methods.iter().find(|m| {
                m.name == name
                    && m.is_static == is_static
                    && !m.is_constructor()
                    && signature_matches(m, arg_types, ctx)
            })
        })
    }

    /// Find a constructor by signature, on the target type only
    pub fn find_constructor(
        &self,
        target: ResolvedType<'a>,
        arg_types: &[TypeRef],
        ctx: &GenericContext<'_>,
    ) -> Option<&'a MethodDef> {
        target
            .def
            .methods
            .iter()
            .find(|m| m.is_constructor() && signature_matches(m, arg_types, ctx))
    }

    /// Apply `pick` to the target type and each base, first hit wins
    fn walk_chain<T>(
        &self,
        target: ResolvedType<'a>,
        pick: impl Fn(&'a TypeDef) -> Option<&'a T>,
    ) -> Option<&'a T> {
        let mut visited = FxHashSet::default();
        let mut cursor = Some(target);
        while let Some(current) = cursor {
            if !visited.insert(current.def.name.clone()) {
                return None;
            }
            if let Some(found) = pick(current.def) {
                return Some(found);
            }
            cursor = current
                .def
                .base
                .as_ref()
                .and_then(|base| base.definition_name())
                .and_then(|name| self.find_type(name));
        }
        None
    }
}

fn signature_matches(method: &MethodDef, arg_types: &[TypeRef], ctx: &GenericContext<'_>) -> bool {
    method.params.len() == arg_types.len()
        && method
            .params
            .iter()
            .zip(arg_types)
            .all(|(param, arg)| types_match(&param.ty, arg, ctx))
}

/// Whether an accessor-side type satisfies a target-side type
///
/// Structural equality always matches. A target-side placeholder is
/// satisfied by the instantiation argument at its position when the
/// target type is instantiated; otherwise by the same placeholder when
/// the accessor's surroundings declare one at that position; otherwise
/// by anything, since the accessor is supplying the concrete type.
pub(crate) fn types_match(target_ty: &TypeRef, accessor_ty: &TypeRef, ctx: &GenericContext<'_>) -> bool {
    if target_ty == accessor_ty {
        return true;
    }

    match target_ty {
        TypeRef::GenericParam {
            kind: GenericParamKind::Type,
            position,
        } => {
            if let TypeRef::GenericInst { args, .. } = ctx.target {
                if let Some(bound) = args.get(*position as usize) {
                    return types_match(bound, accessor_ty, ctx);
                }
            }
            if (*position as usize) < ctx.type_param_count {
                return accessor_ty
                    == &TypeRef::GenericParam {
                        kind: GenericParamKind::Type,
                        position: *position,
                    };
            }
            true
        }
        TypeRef::GenericParam {
            kind: GenericParamKind::Method,
            position,
        } => {
            if (*position as usize) < ctx.method_param_count {
                return accessor_ty
                    == &TypeRef::GenericParam {
                        kind: GenericParamKind::Method,
                        position: *position,
                    };
            }
            true
        }
        TypeRef::GenericInst { definition, args } => match accessor_ty {
            TypeRef::GenericInst {
                definition: other_def,
                args: other_args,
            } => {
                definition == other_def
                    && args.len() == other_args.len()
                    && args
                        .iter()
                        .zip(other_args)
                        .all(|(a, b)| types_match(a, b, ctx))
            }
            _ => false,
        },
        TypeRef::ByRef(element) => match accessor_ty {
            TypeRef::ByRef(other) => types_match(element, other, ctx),
            _ => false,
        },
        _ => false,
    }
}

fn builtin_type(name: &str) -> Option<TypeRef> {
    match name {
        "void" => Some(TypeRef::Void),
        "bool" => Some(TypeRef::Bool),
        "int" => Some(TypeRef::Int),
        "float" => Some(TypeRef::Float),
        "str" => Some(TypeRef::Str),
        "object" => Some(TypeRef::Object),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_name::parse_type_name;
    use latchkey_bytecode::{ModuleBuilder, TypeBuilder, Visibility};

    fn generic_param(kind: GenericParamKind, position: u16) -> TypeRef {
        TypeRef::GenericParam { kind, position }
    }

    fn lib_module() -> Module {
        let mut builder = ModuleBuilder::new("lib");
        builder.add_type(
            TypeBuilder::new("lib.Box")
                .generic_param("T")
                .field("_item", generic_param(GenericParamKind::Type, 0), Visibility::Private)
                .build(),
        );
        builder.add_type(
            TypeBuilder::new("lib.Base")
                .field("_tag", TypeRef::Str, Visibility::Private)
                .build(),
        );
        builder.add_type(
            TypeBuilder::new("lib.Derived")
                .base(TypeRef::Named("lib.Base".to_string()))
                .build(),
        );
        builder.build()
    }

    fn app_module() -> Module {
        let mut builder = ModuleBuilder::new("app");
        builder.reference("lib");
        builder.add_type(TypeBuilder::new("app.Main").build());
        builder.build()
    }

    #[test]
    fn test_current_module_wins_over_references() {
        let mut app = app_module();
        app.types.push(TypeBuilder::new("lib.Base").build());
        let mut set = ModuleSet::new();
        set.add(lib_module());

        let resolver = Resolver::new(&app, &set);
        let found = resolver.find_type("lib.Base").unwrap();
        assert_eq!(found.module, "app");
    }

    #[test]
    fn test_resolve_builtin_and_named() {
        let app = app_module();
        let mut set = ModuleSet::new();
        set.add(lib_module());
        let resolver = Resolver::new(&app, &set);

        let (ty, module) = resolver.resolve_name(&parse_type_name("int").unwrap()).unwrap();
        assert_eq!(ty, TypeRef::Int);
        assert!(module.is_none());

        let (ty, module) = resolver
            .resolve_name(&parse_type_name("lib.Base").unwrap())
            .unwrap();
        assert_eq!(ty, TypeRef::Named("lib.Base".to_string()));
        assert_eq!(module.as_deref(), Some("lib"));
    }

    #[test]
    fn test_resolve_generic_instantiation() {
        let app = app_module();
        let mut set = ModuleSet::new();
        set.add(lib_module());
        let resolver = Resolver::new(&app, &set);

        let (ty, module) = resolver
            .resolve_name(&parse_type_name("lib.Box[int]").unwrap())
            .unwrap();
        assert_eq!(
            ty,
            TypeRef::GenericInst {
                definition: "lib.Box".to_string(),
                args: vec![TypeRef::Int],
            }
        );
        assert_eq!(module.as_deref(), Some("lib"));
    }

    #[test]
    fn test_resolve_arity_mismatch() {
        let app = app_module();
        let mut set = ModuleSet::new();
        set.add(lib_module());
        let resolver = Resolver::new(&app, &set);

        assert!(resolver
            .resolve_name(&parse_type_name("lib.Box[int,str]").unwrap())
            .is_err());
        assert!(resolver
            .resolve_name(&parse_type_name("lib.Box`2[int,str]").unwrap())
            .is_err());
    }

    #[test]
    fn test_resolve_unknown_type() {
        let app = app_module();
        let set = ModuleSet::new();
        let resolver = Resolver::new(&app, &set);
        assert!(resolver
            .resolve_name(&parse_type_name("lib.Missing").unwrap())
            .is_err());
    }

    #[test]
    fn test_field_found_through_base_chain() {
        let app = app_module();
        let mut set = ModuleSet::new();
        set.add(lib_module());
        let resolver = Resolver::new(&app, &set);

        let derived = resolver.find_type("lib.Derived").unwrap();
        let field = resolver.find_field(derived, "_tag", false).unwrap();
        assert_eq!(field.ty, TypeRef::Str);
    }

    #[test]
    fn test_base_chain_cycle_terminates() {
        let mut module = app_module();
        module.types.push(
            TypeBuilder::new("app.A")
                .base(TypeRef::Named("app.B".to_string()))
                .build(),
        );
        module.types.push(
            TypeBuilder::new("app.B")
                .base(TypeRef::Named("app.A".to_string()))
                .build(),
        );
        let set = ModuleSet::new();
        let resolver = Resolver::new(&module, &set);

        let a = resolver.find_type("app.A").unwrap();
        assert!(resolver.find_field(a, "_missing", false).is_none());
    }

    #[test]
    fn test_types_match_instantiation_binds_placeholder() {
        let target = TypeRef::GenericInst {
            definition: "lib.Box".to_string(),
            args: vec![TypeRef::Int],
        };
        let ctx = GenericContext {
            type_param_count: 0,
            method_param_count: 0,
            target: &target,
        };
        let placeholder = generic_param(GenericParamKind::Type, 0);
        assert!(types_match(&placeholder, &TypeRef::Int, &ctx));
        assert!(!types_match(&placeholder, &TypeRef::Str, &ctx));
    }

    #[test]
    fn test_types_match_accessor_placeholder_by_position() {
        let target = TypeRef::Named("lib.Box".to_string());
        let ctx = GenericContext {
            type_param_count: 1,
            method_param_count: 0,
            target: &target,
        };
        let placeholder = generic_param(GenericParamKind::Type, 0);
        assert!(types_match(&placeholder, &placeholder, &ctx));
        assert!(!types_match(&placeholder, &TypeRef::Int, &ctx));
    }

    #[test]
    fn test_types_match_open_placeholder_accepts_anything() {
        let target = TypeRef::Named("lib.Box".to_string());
        let ctx = GenericContext {
            type_param_count: 0,
            method_param_count: 0,
            target: &target,
        };
        let placeholder = generic_param(GenericParamKind::Type, 0);
        assert!(types_match(&placeholder, &TypeRef::Int, &ctx));
        assert!(types_match(&placeholder, &TypeRef::Str, &ctx));
    }

    #[test]
    fn test_types_match_generic_inst_recurses() {
        let target_ty = TypeRef::GenericInst {
            definition: "util.List".to_string(),
            args: vec![generic_param(GenericParamKind::Type, 0)],
        };
        let bound = TypeRef::GenericInst {
            definition: "lib.Box".to_string(),
            args: vec![TypeRef::Int],
        };
        let ctx = GenericContext {
            type_param_count: 0,
            method_param_count: 0,
            target: &bound,
        };
        let accessor_ty = TypeRef::GenericInst {
            definition: "util.List".to_string(),
            args: vec![TypeRef::Int],
        };
        assert!(types_match(&target_ty, &accessor_ty, &ctx));

        let wrong = TypeRef::GenericInst {
            definition: "util.List".to_string(),
            args: vec![TypeRef::Str],
        };
        assert!(!types_match(&target_ty, &wrong, &ctx));
    }
}
