//! Builders for constructing module metadata
//!
//! Hosts and tests assemble modules through these helpers instead of
//! writing struct literals by hand.

use crate::instr::Instr;
use crate::module::{Attribute, FieldDef, MethodDef, Module, ParamDef, TypeDef};
use crate::types::{Constant, TypeRef, Visibility};

/// Helper for building modules
pub struct ModuleBuilder {
    name: String,
    references: Vec<String>,
    types: Vec<TypeDef>,
    attributes: Vec<Attribute>,
}

impl ModuleBuilder {
    /// Create a builder for a module named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            references: Vec::new(),
            types: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Add a module reference
    pub fn reference(&mut self, name: impl Into<String>) -> &mut Self {
        self.references.push(name.into());
        self
    }

    /// Add a type definition
    pub fn add_type(&mut self, ty: TypeDef) -> &mut Self {
        self.types.push(ty);
        self
    }

    /// Add a module-level attribute
    pub fn attribute(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// Build the final module
    pub fn build(&mut self) -> Module {
        Module {
            name: std::mem::take(&mut self.name),
            references: std::mem::take(&mut self.references),
            types: std::mem::take(&mut self.types),
            attributes: std::mem::take(&mut self.attributes),
        }
    }
}

/// Helper for building type definitions
pub struct TypeBuilder {
    ty: TypeDef,
}

impl TypeBuilder {
    /// Create a builder for a public, non-sealed type
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            ty: TypeDef {
                name: full_name.into(),
                visibility: Visibility::Public,
                sealed: false,
                base: None,
                generic_params: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                nested: Vec::new(),
                attributes: Vec::new(),
            },
        }
    }

    /// Set the type visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.ty.visibility = visibility;
        self
    }

    /// Mark the type sealed
    pub fn sealed(mut self) -> Self {
        self.ty.sealed = true;
        self
    }

    /// Set the base type
    pub fn base(mut self, base: TypeRef) -> Self {
        self.ty.base = Some(base);
        self
    }

    /// Append a generic parameter
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.ty.generic_params.push(name.into());
        self
    }

    /// Append an instance field with no initializer
    pub fn field(mut self, name: impl Into<String>, ty: TypeRef, visibility: Visibility) -> Self {
        self.ty.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: false,
            visibility,
            init: None,
        });
        self
    }

    /// Append an instance field with an initializer
    pub fn field_init(
        mut self,
        name: impl Into<String>,
        ty: TypeRef,
        visibility: Visibility,
        init: Constant,
    ) -> Self {
        self.ty.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: false,
            visibility,
            init: Some(init),
        });
        self
    }

    /// Append a static field
    pub fn static_field(
        mut self,
        name: impl Into<String>,
        ty: TypeRef,
        visibility: Visibility,
        init: Option<Constant>,
    ) -> Self {
        self.ty.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: true,
            visibility,
            init,
        });
        self
    }

    /// Append a method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.ty.methods.push(method);
        self
    }

    /// Append a nested type
    pub fn nested(mut self, nested: TypeDef) -> Self {
        self.ty.nested.push(nested);
        self
    }

    /// Append a type-level attribute
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.ty.attributes.push(attribute);
        self
    }

    /// Build the final type definition
    pub fn build(self) -> TypeDef {
        self.ty
    }
}

/// Helper for building method definitions
pub struct MethodBuilder {
    method: MethodDef,
}

impl MethodBuilder {
    /// Create a builder for a public instance method
    pub fn new(name: impl Into<String>, return_type: TypeRef) -> Self {
        Self {
            method: MethodDef {
                name: name.into(),
                visibility: Visibility::Public,
                is_static: false,
                is_virtual: false,
                generic_params: Vec::new(),
                params: Vec::new(),
                return_type,
                return_attributes: Vec::new(),
                body: Vec::new(),
                attributes: Vec::new(),
            },
        }
    }

    /// Set the method visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.method.visibility = visibility;
        self
    }

    /// Mark the method static
    pub fn static_(mut self) -> Self {
        self.method.is_static = true;
        self
    }

    /// Mark the method virtual
    pub fn virtual_(mut self) -> Self {
        self.method.is_virtual = true;
        self
    }

    /// Append a generic parameter
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.method.generic_params.push(name.into());
        self
    }

    /// Append a parameter with no markers
    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.method.params.push(ParamDef::new(name, ty));
        self
    }

    /// Append a fully specified parameter
    pub fn param_def(mut self, param: ParamDef) -> Self {
        self.method.params.push(param);
        self
    }

    /// Append a method-level attribute
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.method.attributes.push(attribute);
        self
    }

    /// Append a return-value attribute
    pub fn return_attribute(mut self, attribute: Attribute) -> Self {
        self.method.return_attributes.push(attribute);
        self
    }

    /// Set the instruction body
    pub fn body(mut self, body: Vec<Instr>) -> Self {
        self.method.body = body;
        self
    }

    /// Build the final method definition
    pub fn build(self) -> MethodDef {
        self.method
    }
}
