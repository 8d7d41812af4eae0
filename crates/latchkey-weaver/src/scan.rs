//! Stub discovery
//!
//! One depth-first walk over the module's type tree collects the index
//! paths of every marked method, so planning can run over immutable
//! borrows and application can come back to each site by index.

use crate::markers;
use latchkey_bytecode::{MethodDef, Module, TypeDef};

/// Index path to one marked method
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StubSite {
    /// Indices from `module.types` down through `nested` lists
    pub path: Vec<usize>,
    /// Index into the owning type's method list
    pub method: usize,
}

/// Collect every method carrying an accessor marker, in declaration order
pub(crate) fn collect_stubs(module: &Module) -> Vec<StubSite> {
    let mut sites = Vec::new();
    for (index, ty) in module.types.iter().enumerate() {
        collect_in_type(ty, &mut vec![index], &mut sites);
    }
    sites
}

fn collect_in_type(ty: &TypeDef, path: &mut Vec<usize>, sites: &mut Vec<StubSite>) {
    // Nested types first, then the type's own methods
    for (index, nested) in ty.nested.iter().enumerate() {
        path.push(index);
        collect_in_type(nested, path, sites);
        path.pop();
    }
    for (index, method) in ty.methods.iter().enumerate() {
        if markers::accessor_marker(method).is_some() {
            sites.push(StubSite {
                path: path.clone(),
                method: index,
            });
        }
    }
}

/// The type definition a site's path points at
pub(crate) fn type_at<'a>(module: &'a Module, path: &[usize]) -> &'a TypeDef {
    let mut ty = &module.types[path[0]];
    for &index in &path[1..] {
        ty = &ty.nested[index];
    }
    ty
}

/// The method a site points at
pub(crate) fn method_at<'a>(module: &'a Module, site: &StubSite) -> &'a MethodDef {
    &type_at(module, &site.path).methods[site.method]
}

/// Mutable access to the method a site points at
pub(crate) fn method_at_mut<'a>(module: &'a mut Module, site: &StubSite) -> &'a mut MethodDef {
    let mut ty = &mut module.types[site.path[0]];
    for &index in &site.path[1..] {
        ty = &mut ty.nested[index];
    }
    &mut ty.methods[site.method]
}
