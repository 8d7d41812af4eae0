//! The weaving pass
//!
//! Runs in two phases over the module. Planning walks every marked stub
//! over immutable borrows and produces a replacement body per stub, or a
//! diagnostic when the stub cannot be woven. Application then rewrites
//! only the planned stubs: the body is swapped in, processing markers are
//! stripped, and the synthesized marker is added. A stub that fails to
//! plan is left untouched, markers included, so the failure is visible at
//! run time as well as in the report. Access waivers are registered last,
//! one per foreign module whose members the woven bodies touch.

use crate::binder::{bind_field, bind_method};
use crate::diag::{Diagnostic, Diagnostics};
use crate::emit::{self, FieldShape};
use crate::error::{WeaveError, WeaveResult};
use crate::markers::{
    self, AccessorKind, MarkerError, ACCESSOR_MARKER, SYNTHESIZED_MARKER, TARGET_TYPE_MARKER,
};
use crate::registrar;
use crate::resolve::{GenericContext, ModuleSet, ResolvedType, Resolver};
use crate::scan::{self, StubSite};
use crate::type_name::parse_type_name;
use latchkey_bytecode::module::{find_attribute, remove_attribute, CONSTRUCTOR_NAME};
use latchkey_bytecode::{Attribute, Instr, MethodDef, Module, TypeRef};
use rustc_hash::FxHashSet;

/// Outcome of one weaving pass
#[derive(Debug)]
pub struct WeaveReport {
    /// Stubs rewritten
    pub woven: usize,
    /// Stubs that failed and were left as stubs
    pub failed: usize,
    /// Foreign modules a waiver was recorded for, sorted
    pub waivers: Vec<String>,
    /// Everything the pass reported, in order
    pub diagnostics: Vec<Diagnostic>,
}

/// One planned rewrite
struct StubPlan {
    site: StubSite,
    body: Vec<Instr>,
    /// Defining module of the accessed type, when not the module itself
    foreign: Option<String>,
}

/// The weaving pass over one module
pub struct Weaver<'a> {
    module: &'a mut Module,
    set: &'a ModuleSet,
}

impl<'a> Weaver<'a> {
    pub fn new(module: &'a mut Module, set: &'a ModuleSet) -> Self {
        Self { module, set }
    }

    /// Run the pass to completion
    pub fn execute(self) -> WeaveResult<WeaveReport> {
        let mut diags = Diagnostics::new();
        let sites = scan::collect_stubs(self.module);
        let mut plans = Vec::new();
        let mut failed = 0usize;

        if !sites.is_empty() {
            check_synthesized_marker(self.module, self.set)?;
        }

        {
            let resolver = Resolver::new(self.module, self.set);
            for site in sites {
                match plan_stub(self.module, &resolver, &site, &mut diags) {
                    Ok(plan) => plans.push(plan),
                    Err(message) => {
                        diags.error(message);
                        failed += 1;
                    }
                }
            }
        }

        let mut foreign = FxHashSet::default();
        for plan in &plans {
            if let Some(name) = &plan.foreign {
                foreign.insert(name.clone());
            }
        }
        let mut waivers: Vec<String> = foreign.into_iter().collect();
        waivers.sort();

        let woven = plans.len();
        for plan in plans {
            apply_plan(self.module, plan);
        }

        registrar::register_waivers(self.module, self.set, &waivers, &mut diags)?;

        Ok(WeaveReport {
            woven,
            failed,
            waivers,
            diagnostics: diags.into_entries(),
        })
    }
}

/// The synthesized marker type must be visible with a default constructor
fn check_synthesized_marker(module: &Module, set: &ModuleSet) -> WeaveResult<()> {
    let resolver = Resolver::new(module, set);
    let marker = resolver
        .find_type(SYNTHESIZED_MARKER)
        .ok_or_else(|| WeaveError::MissingMarkerType(SYNTHESIZED_MARKER.to_string()))?;
    let has_default_ctor = marker
        .def
        .methods
        .iter()
        .any(|m| m.is_constructor() && m.params.is_empty());
    if !has_default_ctor {
        return Err(WeaveError::MissingMarkerConstructor(
            SYNTHESIZED_MARKER.to_string(),
        ));
    }
    Ok(())
}

fn plan_stub<'m>(
    module: &'m Module,
    resolver: &Resolver<'m>,
    site: &StubSite,
    diags: &mut Diagnostics,
) -> Result<StubPlan, String> {
    let enclosing = scan::type_at(module, &site.path);
    let method = &enclosing.methods[site.method];
    let full_name = format!("{}.{}", enclosing.name, method.name);

    let marker = markers::accessor_marker(method).expect("site was collected from a marker");
    let declaration = markers::read_declaration(marker).map_err(|e| match e {
        MarkerError::MissingKind => format!("accessor {full_name} is missing its kind argument"),
        MarkerError::InvalidKind(value) => {
            format!("accessor {full_name} has unknown kind {value}")
        }
    })?;

    if !method.is_static {
        return Err(format!("accessor {full_name} must be static"));
    }
    if !method.is_stub() {
        diags.warning(format!("accessor {full_name} has a body, replacing it"));
    }

    diags.debug(format!(
        "processing accessor {full_name} ({:?})",
        declaration.kind
    ));

    let type_param_count = enclosing.generic_params.len();
    let member_name = declaration.member_name.as_deref();
    let (body, accessed) = match declaration.kind {
        AccessorKind::Field => {
            plan_field(resolver, method, &full_name, member_name, false, diags)?
        }
        AccessorKind::StaticField => {
            plan_field(resolver, method, &full_name, member_name, true, diags)?
        }
        AccessorKind::Method => {
            plan_method(resolver, type_param_count, method, &full_name, member_name, false, diags)?
        }
        AccessorKind::StaticMethod => {
            plan_method(resolver, type_param_count, method, &full_name, member_name, true, diags)?
        }
        AccessorKind::Constructor => {
            plan_constructor(resolver, type_param_count, method, &full_name, diags)?
        }
    };

    let foreign = accessed.filter(|name| *name != module.name);
    Ok(StubPlan {
        site: site.clone(),
        body,
        foreign,
    })
}

fn plan_field(
    resolver: &Resolver<'_>,
    method: &MethodDef,
    full_name: &str,
    member_name: Option<&str>,
    is_static: bool,
    diags: &mut Diagnostics,
) -> Result<(Vec<Instr>, Option<String>), String> {
    let field_name = member_name
        .ok_or_else(|| format!("field accessor {full_name} must specify a field name"))?;
    if method.params.is_empty() {
        return Err(format!(
            "field accessor {full_name} must have at least one parameter"
        ));
    }

    let target = resolve_slot(
        resolver,
        &method.params[0].ty,
        markers::param_override(&method.params[0]),
        diags,
    );
    let (resolved, accessed) = resolve_target(resolver, &target, full_name)?;

    let field = resolver
        .find_field(resolved, field_name, is_static)
        .ok_or_else(|| {
            format!(
                "could not find {}field '{field_name}' in type {}",
                if is_static { "static " } else { "" },
                resolved.def.name
            )
        })?;
    let field_ref = bind_field(&target, field);

    let body = match emit::field_shape(&method.return_type) {
        FieldShape::Getter => {
            let actual_return = resolve_slot(
                resolver,
                &method.return_type,
                markers::return_override(method),
                diags,
            );
            emit::field_getter(field_ref, is_static, &actual_return, &method.return_type)
        }
        FieldShape::Setter => {
            if method.params.len() < 2 {
                return Err(format!(
                    "field setter {full_name} must take the target and a value"
                ));
            }
            let value_param = &method.params[method.params.len() - 1];
            let actual_value = resolve_slot(
                resolver,
                &value_param.ty,
                markers::param_override(value_param),
                diags,
            );
            emit::field_setter(field_ref, is_static, &method.params[1].ty, &actual_value)
        }
        FieldShape::Reference => {
            if markers::has_return_override(method) {
                return Err(format!(
                    "field reference accessor {full_name} cannot override its return type"
                ));
            }
            let element = match &method.return_type {
                TypeRef::ByRef(element) => element.as_ref(),
                _ => unreachable!("reference shape implies a by-ref return"),
            };
            if *element != field.ty {
                return Err(format!(
                    "field reference accessor {full_name} return type 'ref {element}' \
                     must exactly match field type '{}'",
                    field.ty
                ));
            }
            emit::field_reference(field_ref, is_static)
        }
    };

    Ok((body, accessed))
}

fn plan_method(
    resolver: &Resolver<'_>,
    type_param_count: usize,
    method: &MethodDef,
    full_name: &str,
    member_name: Option<&str>,
    is_static: bool,
    diags: &mut Diagnostics,
) -> Result<(Vec<Instr>, Option<String>), String> {
    let target_name = member_name
        .ok_or_else(|| format!("method accessor {full_name} must specify a method name"))?;
    if target_name == CONSTRUCTOR_NAME {
        return Err(format!(
            "method accessor {full_name} cannot target a constructor, use a constructor accessor"
        ));
    }
    if method.params.is_empty() {
        return Err(format!(
            "method accessor {full_name} must have at least one parameter"
        ));
    }

    let target = resolve_slot(
        resolver,
        &method.params[0].ty,
        markers::param_override(&method.params[0]),
        diags,
    );
    let (resolved, accessed) = resolve_target(resolver, &target, full_name)?;

    // Forwarded arguments: everything past the receiver/marker slot
    let declared_args: Vec<TypeRef> = method.params[1..].iter().map(|p| p.ty.clone()).collect();
    let actual_args: Vec<TypeRef> = method.params[1..]
        .iter()
        .map(|p| resolve_slot(resolver, &p.ty, markers::param_override(p), diags))
        .collect();

    let ctx = GenericContext {
        type_param_count,
        method_param_count: method.generic_params.len(),
        target: &target,
    };
    let target_method = resolver
        .find_method(resolved, target_name, is_static, &actual_args, &ctx)
        .ok_or_else(|| {
            format!(
                "could not find method '{target_name}' in type {}",
                resolved.def.name
            )
        })?;
    let method_ref = bind_method(&target, target_method);

    let actual_return = resolve_slot(
        resolver,
        &method.return_type,
        markers::return_override(method),
        diags,
    );
    let body = emit::method_call(
        method_ref,
        &target,
        &method.params[0].ty,
        &declared_args,
        &actual_args,
        &actual_return,
        &method.return_type,
    );
    Ok((body, accessed))
}

fn plan_constructor(
    resolver: &Resolver<'_>,
    type_param_count: usize,
    method: &MethodDef,
    full_name: &str,
    diags: &mut Diagnostics,
) -> Result<(Vec<Instr>, Option<String>), String> {
    // The target type comes from the return type
    let target = resolve_slot(
        resolver,
        &method.return_type,
        markers::return_override(method),
        diags,
    );
    let (resolved, accessed) = resolve_target(resolver, &target, full_name)?;

    let declared_args: Vec<TypeRef> = method.params.iter().map(|p| p.ty.clone()).collect();
    let actual_args: Vec<TypeRef> = method
        .params
        .iter()
        .map(|p| resolve_slot(resolver, &p.ty, markers::param_override(p), diags))
        .collect();

    let ctx = GenericContext {
        type_param_count,
        method_param_count: method.generic_params.len(),
        target: &target,
    };
    let constructor = resolver
        .find_constructor(resolved, &actual_args, &ctx)
        .ok_or_else(|| {
            format!(
                "could not find a matching constructor in type {}",
                resolved.def.name
            )
        })?;
    let ctor_ref = bind_method(&target, constructor);

    let body = emit::constructor_call(ctor_ref, &declared_args, &actual_args);
    Ok((body, accessed))
}

/// The effective type of one signature slot
///
/// An override that fails to parse or resolve is a warning and the
/// declared type stands.
fn resolve_slot(
    resolver: &Resolver<'_>,
    declared: &TypeRef,
    override_name: Option<&str>,
    diags: &mut Diagnostics,
) -> TypeRef {
    let Some(text) = override_name else {
        return declared.clone();
    };
    let parsed = match parse_type_name(text) {
        Ok(parsed) => parsed,
        Err(error) => {
            diags.warning(format!("could not parse type name '{text}': {error}"));
            return declared.clone();
        }
    };
    match resolver.resolve_name(&parsed) {
        Ok((ty, _)) => ty,
        Err(error) => {
            diags.warning(format!("could not resolve type name '{text}': {error}"));
            declared.clone()
        }
    }
}

/// Resolve the target type's definition and note its defining module
fn resolve_target<'m>(
    resolver: &Resolver<'m>,
    target: &TypeRef,
    full_name: &str,
) -> Result<(ResolvedType<'m>, Option<String>), String> {
    let name = target.definition_name().ok_or_else(|| {
        format!("accessor {full_name} target type '{target}' is not a named type")
    })?;
    let resolved = resolver
        .find_type(name)
        .ok_or_else(|| format!("could not resolve target type {name}"))?;
    Ok((resolved, Some(resolved.module.to_string())))
}

/// Swap in the planned body and rewrite the stub's markers
fn apply_plan(module: &mut Module, plan: StubPlan) {
    let method = scan::method_at_mut(module, &plan.site);
    method.body = plan.body;

    remove_attribute(&mut method.attributes, ACCESSOR_MARKER);
    remove_attribute(&mut method.attributes, TARGET_TYPE_MARKER);
    for param in &mut method.params {
        remove_attribute(&mut param.attributes, TARGET_TYPE_MARKER);
    }
    remove_attribute(&mut method.return_attributes, TARGET_TYPE_MARKER);

    if find_attribute(&method.attributes, SYNTHESIZED_MARKER).is_none() {
        method
            .attributes
            .push(Attribute::new(SYNTHESIZED_MARKER, vec![]));
    }
}
