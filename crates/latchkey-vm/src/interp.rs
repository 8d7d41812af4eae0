//! The interpreter
//!
//! A straightforward tree-walking stack machine over [`Instr`] bodies.
//! Method bodies are cloned out of the loaded modules before execution so
//! static stores can be mutated freely while code runs.

use crate::error::RunError;
use crate::value::{ObjHandle, ObjectData, RefSlot, Value};
use latchkey_bytecode::module::CONSTRUCTOR_NAME;
use latchkey_bytecode::{Constant, FieldRef, Instr, MethodDef, MethodRef, Module, TypeDef, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

/// The virtual machine: a set of loaded modules plus static field stores
pub struct Vm {
    modules: Vec<Module>,
    statics: FxHashMap<String, FxHashMap<String, Value>>,
}

impl Vm {
    /// Create an empty VM
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            statics: FxHashMap::default(),
        }
    }

    /// Load a module, initializing static field stores from initializers
    pub fn load(&mut self, module: Module) {
        fn register(statics: &mut FxHashMap<String, FxHashMap<String, Value>>, ty: &TypeDef) {
            let mut store = FxHashMap::default();
            for field in ty.fields.iter().filter(|f| f.is_static) {
                let value = match &field.init {
                    Some(constant) => constant_value(constant),
                    None => Value::default_for(&field.ty),
                };
                store.insert(field.name.clone(), value);
            }
            if !store.is_empty() {
                statics.insert(ty.name.clone(), store);
            }
            for nested in &ty.nested {
                register(statics, nested);
            }
        }

        for ty in &module.types {
            register(&mut self.statics, ty);
        }
        self.modules.push(module);
    }

    /// Read a static field directly (test convenience)
    pub fn get_static(&self, type_name: &str, field: &str) -> Option<Value> {
        self.statics.get(type_name)?.get(field).cloned()
    }

    /// Invoke a method by declaring type and name
    ///
    /// For instance methods the receiver is `args[0]`.
    pub fn call(&mut self, type_name: &str, method: &str, args: Vec<Value>) -> Result<Value, RunError> {
        let ty = self.type_def(type_name)?;
        let def = ty
            .methods
            .iter()
            .find(|m| m.name == method)
            .cloned()
            .ok_or_else(|| RunError::MethodNotFound {
                type_name: type_name.to_string(),
                method: method.to_string(),
            })?;

        let expected = def.params.len() + usize::from(!def.is_static);
        if args.len() != expected {
            return Err(RunError::ArgCount {
                expected,
                actual: args.len(),
            });
        }
        self.exec(type_name, &def, args)
    }

    /// Allocate an instance of `class` and run its constructor
    pub fn instantiate(&mut self, class: &TypeRef, args: Vec<Value>) -> Result<Value, RunError> {
        let name = class
            .definition_name()
            .ok_or_else(|| RunError::TypeNotFound(class.to_string()))?
            .to_string();
        let (decl, ctor) = self
            .find_in_chain(&name, |m| {
                m.is_constructor() && m.params.len() == args.len()
            })
            .ok_or_else(|| RunError::MethodNotFound {
                type_name: name.clone(),
                method: CONSTRUCTOR_NAME.to_string(),
            })?;

        let handle = self.allocate(class)?;
        let mut ctor_args = vec![Value::Obj(handle.clone())];
        ctor_args.extend(args);
        self.exec(&decl, &ctor, ctor_args)?;
        Ok(Value::Obj(handle))
    }

    /// Read through a by-reference handle
    pub fn read_ref(&self, reference: &Value) -> Result<Value, RunError> {
        match reference {
            Value::Ref(RefSlot::Field { object, field }) => object
                .borrow()
                .fields
                .get(field)
                .cloned()
                .ok_or_else(|| RunError::FieldNotFound {
                    type_name: object.borrow().class.to_string(),
                    field: field.clone(),
                }),
            Value::Ref(RefSlot::Static { type_name, field }) => self
                .get_static(type_name, field)
                .ok_or_else(|| RunError::FieldNotFound {
                    type_name: type_name.clone(),
                    field: field.clone(),
                }),
            _ => Err(RunError::NotAReference),
        }
    }

    /// Write through a by-reference handle
    pub fn write_ref(&mut self, reference: &Value, value: Value) -> Result<(), RunError> {
        match reference {
            Value::Ref(RefSlot::Field { object, field }) => {
                object.borrow_mut().fields.insert(field.clone(), value);
                Ok(())
            }
            Value::Ref(RefSlot::Static { type_name, field }) => {
                let store = self
                    .statics
                    .get_mut(type_name)
                    .ok_or_else(|| RunError::TypeNotFound(type_name.clone()))?;
                store.insert(field.clone(), value);
                Ok(())
            }
            _ => Err(RunError::NotAReference),
        }
    }

    fn type_def(&self, name: &str) -> Result<&TypeDef, RunError> {
        self.modules
            .iter()
            .find_map(|m| m.find_type(name))
            .ok_or_else(|| RunError::TypeNotFound(name.to_string()))
    }

    /// Walk a type's base chain looking for the first method matching `pred`
    fn find_in_chain(
        &self,
        start: &str,
        pred: impl Fn(&MethodDef) -> bool,
    ) -> Option<(String, MethodDef)> {
        let mut visited = FxHashSet::default();
        let mut current = start.to_string();
        loop {
            if !visited.insert(current.clone()) {
                return None;
            }
            let ty = self.type_def(&current).ok()?;
            if let Some(found) = ty.methods.iter().find(|m| pred(m)) {
                return Some((current, found.clone()));
            }
            match ty.base.as_ref().and_then(|b| b.definition_name()) {
                Some(base) => current = base.to_string(),
                None => return None,
            }
        }
    }

    /// Allocate an object of `class`, seeding instance fields down the chain
    fn allocate(&self, class: &TypeRef) -> Result<ObjHandle, RunError> {
        let mut fields = FxHashMap::default();
        let mut visited = FxHashSet::default();
        let mut current = class
            .definition_name()
            .ok_or_else(|| RunError::TypeNotFound(class.to_string()))?
            .to_string();
        loop {
            if !visited.insert(current.clone()) {
                break;
            }
            let ty = self.type_def(&current)?;
            for field in ty.fields.iter().filter(|f| !f.is_static) {
                let value = match &field.init {
                    Some(constant) => constant_value(constant),
                    None => Value::default_for(&field.ty),
                };
                fields.entry(field.name.clone()).or_insert(value);
            }
            match ty.base.as_ref().and_then(|b| b.definition_name()) {
                Some(base) => current = base.to_string(),
                None => break,
            }
        }
        Ok(Rc::new(RefCell::new(ObjectData {
            class: class.clone(),
            fields,
        })))
    }

    fn exec(
        &mut self,
        declaring: &str,
        method: &MethodDef,
        args: Vec<Value>,
    ) -> Result<Value, RunError> {
        if method.is_stub() {
            return Err(RunError::StubNotWoven {
                type_name: declaring.to_string(),
                method: method.name.clone(),
            });
        }

        let frame = format!("{declaring}::{}", method.name);
        let mut stack: Vec<Value> = Vec::new();
        let pop = |stack: &mut Vec<Value>, frame: &str| {
            stack
                .pop()
                .ok_or_else(|| RunError::StackUnderflow(frame.to_string()))
        };

        for instr in &method.body {
            match instr {
                Instr::LoadArg(index) => {
                    let value = args.get(*index as usize).cloned().ok_or_else(|| {
                        RunError::ArgCount {
                            expected: *index as usize + 1,
                            actual: args.len(),
                        }
                    })?;
                    stack.push(value);
                }
                Instr::LoadConst(constant) => stack.push(constant_value(constant)),
                Instr::LoadField(field) => {
                    let object = pop(&mut stack, &frame)?;
                    stack.push(self.field_load(&object, field)?);
                }
                Instr::StoreField(field) => {
                    let value = pop(&mut stack, &frame)?;
                    let object = pop(&mut stack, &frame)?;
                    let handle = as_object(&object)?;
                    handle.borrow_mut().fields.insert(field.name.clone(), value);
                }
                Instr::LoadFieldRef(field) => {
                    let object = pop(&mut stack, &frame)?;
                    let handle = as_object(&object)?;
                    stack.push(Value::Ref(RefSlot::Field {
                        object: handle.clone(),
                        field: field.name.clone(),
                    }));
                }
                Instr::LoadStatic(field) => stack.push(self.static_load(field)?),
                Instr::StoreStatic(field) => {
                    let value = pop(&mut stack, &frame)?;
                    self.static_store(field, value)?;
                }
                Instr::LoadStaticRef(field) => {
                    let type_name = static_type_name(field)?;
                    stack.push(Value::Ref(RefSlot::Static {
                        type_name,
                        field: field.name.clone(),
                    }));
                }
                Instr::Call(target) => {
                    let value = self.run_call(target, &mut stack, &frame)?;
                    push_result(&mut stack, value, &target.return_type);
                }
                Instr::CallVirtual(target) => {
                    let value = self.run_call_virtual(target, &mut stack, &frame)?;
                    push_result(&mut stack, value, &target.return_type);
                }
                Instr::NewObject(ctor) => {
                    let argc = ctor.params.len();
                    let call_args = pop_args(&mut stack, argc, &frame)?;
                    let instance = self.instantiate(&ctor.declaring, call_args)?;
                    stack.push(instance);
                }
                Instr::Box(_) => {
                    // Representation widening is a no-op in this VM
                }
                Instr::Unbox(ty) => {
                    let value = pop(&mut stack, &frame)?;
                    check_unbox(&value, ty)?;
                    stack.push(value);
                }
                Instr::CastClass(ty) => {
                    let value = pop(&mut stack, &frame)?;
                    self.check_cast(&value, ty)?;
                    stack.push(value);
                }
                Instr::IAdd => {
                    let b = pop_int(&mut stack, &frame)?;
                    let a = pop_int(&mut stack, &frame)?;
                    stack.push(Value::Int(a + b));
                }
                Instr::ISub => {
                    let b = pop_int(&mut stack, &frame)?;
                    let a = pop_int(&mut stack, &frame)?;
                    stack.push(Value::Int(a - b));
                }
                Instr::IMul => {
                    let b = pop_int(&mut stack, &frame)?;
                    let a = pop_int(&mut stack, &frame)?;
                    stack.push(Value::Int(a * b));
                }
                Instr::StrConcat => {
                    let b = pop_str(&mut stack, &frame)?;
                    let a = pop_str(&mut stack, &frame)?;
                    stack.push(Value::Str(a + &b));
                }
                Instr::Pop => {
                    pop(&mut stack, &frame)?;
                }
                Instr::Return => {
                    return if method.return_type == TypeRef::Void {
                        Ok(Value::Null)
                    } else {
                        pop(&mut stack, &frame)
                    };
                }
            }
        }

        // A well-formed body always ends in Return
        Err(RunError::StackUnderflow(frame))
    }

    fn run_call(
        &mut self,
        target: &MethodRef,
        stack: &mut Vec<Value>,
        frame: &str,
    ) -> Result<Value, RunError> {
        let argc = target.params.len() + usize::from(!target.is_static);
        let call_args = pop_args(stack, argc, frame)?;

        let start = target
            .declaring
            .definition_name()
            .ok_or_else(|| RunError::TypeNotFound(target.declaring.to_string()))?;
        let (decl, def) = self
            .find_in_chain(start, |m| {
                m.name == target.name
                    && m.is_static == target.is_static
                    && m.params.len() == target.params.len()
            })
            .ok_or_else(|| RunError::MethodNotFound {
                type_name: start.to_string(),
                method: target.name.clone(),
            })?;
        self.exec(&decl, &def, call_args)
    }

    fn run_call_virtual(
        &mut self,
        target: &MethodRef,
        stack: &mut Vec<Value>,
        frame: &str,
    ) -> Result<Value, RunError> {
        let argc = target.params.len() + 1;
        let call_args = pop_args(stack, argc, frame)?;

        // Dispatch on the receiver's runtime class, not the declared type
        let receiver = as_object(&call_args[0])?;
        let runtime_class = receiver.borrow().class.clone();
        let start = runtime_class
            .definition_name()
            .ok_or_else(|| RunError::TypeNotFound(runtime_class.to_string()))?
            .to_string();
        let (decl, def) = self
            .find_in_chain(&start, |m| {
                m.name == target.name
                    && !m.is_static
                    && m.params.len() == target.params.len()
            })
            .ok_or_else(|| RunError::MethodNotFound {
                type_name: start.clone(),
                method: target.name.clone(),
            })?;
        self.exec(&decl, &def, call_args)
    }

    fn field_load(&self, object: &Value, field: &FieldRef) -> Result<Value, RunError> {
        let handle = as_object(object)?;
        let data = handle.borrow();
        data.fields
            .get(&field.name)
            .cloned()
            .ok_or_else(|| RunError::FieldNotFound {
                type_name: data.class.to_string(),
                field: field.name.clone(),
            })
    }

    fn static_load(&self, field: &FieldRef) -> Result<Value, RunError> {
        let type_name = static_type_name(field)?;
        self.get_static(&type_name, &field.name)
            .ok_or_else(|| RunError::FieldNotFound {
                type_name,
                field: field.name.clone(),
            })
    }

    fn static_store(&mut self, field: &FieldRef, value: Value) -> Result<(), RunError> {
        let type_name = static_type_name(field)?;
        let store = self
            .statics
            .entry(type_name)
            .or_default();
        store.insert(field.name.clone(), value);
        Ok(())
    }

    /// Runtime is-a check walking the class chain
    fn check_cast(&self, value: &Value, target: &TypeRef) -> Result<(), RunError> {
        match (value, target) {
            (Value::Null, _) => Ok(()),
            (_, TypeRef::Object) => Ok(()),
            // Casts to unresolved placeholders are checked at real load time
            (_, TypeRef::GenericParam { .. }) => Ok(()),
            (Value::Str(_), TypeRef::Str) => Ok(()),
            (Value::Obj(handle), _) => {
                let target_name = target
                    .definition_name()
                    .ok_or_else(|| RunError::InvalidCast {
                        value: value.kind().to_string(),
                        target: target.to_string(),
                    })?;
                let mut visited = FxHashSet::default();
                let mut current = handle
                    .borrow()
                    .class
                    .definition_name()
                    .map(str::to_string);
                while let Some(name) = current {
                    if name == target_name {
                        return Ok(());
                    }
                    if !visited.insert(name.clone()) {
                        break;
                    }
                    current = self
                        .type_def(&name)
                        .ok()
                        .and_then(|t| t.base.as_ref())
                        .and_then(|b| b.definition_name())
                        .map(str::to_string);
                }
                Err(RunError::InvalidCast {
                    value: handle.borrow().class.to_string(),
                    target: target.to_string(),
                })
            }
            _ => Err(RunError::InvalidCast {
                value: value.kind().to_string(),
                target: target.to_string(),
            }),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn constant_value(constant: &Constant) -> Value {
    match constant {
        Constant::Null => Value::Null,
        Constant::Int(value) => Value::Int(*value),
        Constant::Float(value) => Value::Float(*value),
        Constant::Bool(value) => Value::Bool(*value),
        Constant::Str(value) => Value::Str(value.clone()),
    }
}

fn as_object(value: &Value) -> Result<&ObjHandle, RunError> {
    match value {
        Value::Obj(handle) => Ok(handle),
        other => Err(RunError::TypeMismatch {
            expected: "object".to_string(),
            actual: other.kind().to_string(),
        }),
    }
}

fn static_type_name(field: &FieldRef) -> Result<String, RunError> {
    field
        .declaring
        .definition_name()
        .map(str::to_string)
        .ok_or_else(|| RunError::TypeNotFound(field.declaring.to_string()))
}

fn pop_args(stack: &mut Vec<Value>, count: usize, frame: &str) -> Result<Vec<Value>, RunError> {
    if stack.len() < count {
        return Err(RunError::StackUnderflow(frame.to_string()));
    }
    Ok(stack.split_off(stack.len() - count))
}

fn push_result(stack: &mut Vec<Value>, value: Value, return_type: &TypeRef) {
    if *return_type != TypeRef::Void {
        stack.push(value);
    }
}

fn pop_int(stack: &mut Vec<Value>, frame: &str) -> Result<i64, RunError> {
    match stack.pop() {
        Some(Value::Int(value)) => Ok(value),
        Some(other) => Err(RunError::TypeMismatch {
            expected: "int".to_string(),
            actual: other.kind().to_string(),
        }),
        None => Err(RunError::StackUnderflow(frame.to_string())),
    }
}

fn pop_str(stack: &mut Vec<Value>, frame: &str) -> Result<String, RunError> {
    match stack.pop() {
        Some(Value::Str(value)) => Ok(value),
        Some(other) => Err(RunError::TypeMismatch {
            expected: "str".to_string(),
            actual: other.kind().to_string(),
        }),
        None => Err(RunError::StackUnderflow(frame.to_string())),
    }
}

fn check_unbox(value: &Value, target: &TypeRef) -> Result<(), RunError> {
    let ok = match target {
        TypeRef::Int => matches!(value, Value::Int(_)),
        TypeRef::Float => matches!(value, Value::Float(_)),
        TypeRef::Bool => matches!(value, Value::Bool(_)),
        // Unbox of a non-value or placeholder type is left to real load time
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(RunError::InvalidCast {
            value: value.kind().to_string(),
            target: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_bytecode::{Constant, MethodBuilder, ModuleBuilder, TypeBuilder, Visibility};

    fn widget_field() -> FieldRef {
        FieldRef {
            declaring: TypeRef::Named("app.Widget".to_string()),
            name: "_value".to_string(),
            ty: TypeRef::Int,
        }
    }

    fn widget_module() -> Module {
        let mut builder = ModuleBuilder::new("app");
        builder.add_type(
            TypeBuilder::new("app.Widget")
                .field_init("_value", TypeRef::Int, Visibility::Private, Constant::Int(42))
                .method(
                    MethodBuilder::new(CONSTRUCTOR_NAME, TypeRef::Void)
                        .param("value", TypeRef::Int)
                        .body(vec![
                            Instr::LoadArg(0),
                            Instr::LoadArg(1),
                            Instr::StoreField(widget_field()),
                            Instr::Return,
                        ])
                        .build(),
                )
                .method(
                    MethodBuilder::new("value", TypeRef::Int)
                        .body(vec![
                            Instr::LoadArg(0),
                            Instr::LoadField(widget_field()),
                            Instr::Return,
                        ])
                        .build(),
                )
                .build(),
        );
        builder.build()
    }

    #[test]
    fn test_instantiate_and_call() {
        let mut vm = Vm::new();
        vm.load(widget_module());

        let widget = vm
            .instantiate(&TypeRef::Named("app.Widget".to_string()), vec![Value::Int(7)])
            .unwrap();
        let value = vm
            .call("app.Widget", "value", vec![widget.clone()])
            .unwrap();
        assert!(value.same_as(&Value::Int(7)));
    }

    #[test]
    fn test_field_initializer_applied_on_allocation() {
        let mut vm = Vm::new();
        vm.load(widget_module());

        // Bypass the constructor: allocate directly and read the field
        let handle = vm
            .allocate(&TypeRef::Named("app.Widget".to_string()))
            .unwrap();
        let value = vm
            .call("app.Widget", "value", vec![Value::Obj(handle)])
            .unwrap();
        assert!(value.same_as(&Value::Int(42)));
    }

    #[test]
    fn test_stub_traps() {
        let mut builder = ModuleBuilder::new("app");
        builder.add_type(
            TypeBuilder::new("app.Stubby")
                .method(MethodBuilder::new("broken", TypeRef::Int).static_().build())
                .build(),
        );
        let mut vm = Vm::new();
        vm.load(builder.build());

        assert!(matches!(
            vm.call("app.Stubby", "broken", vec![]),
            Err(RunError::StubNotWoven { .. })
        ));
    }

    #[test]
    fn test_ref_slot_round_trip() {
        let mut vm = Vm::new();
        vm.load(widget_module());

        let widget = vm
            .instantiate(&TypeRef::Named("app.Widget".to_string()), vec![Value::Int(1)])
            .unwrap();
        let handle = match &widget {
            Value::Obj(h) => h.clone(),
            _ => unreachable!(),
        };
        let slot = Value::Ref(RefSlot::Field {
            object: handle,
            field: "_value".to_string(),
        });

        vm.write_ref(&slot, Value::Int(99)).unwrap();
        assert!(vm.read_ref(&slot).unwrap().same_as(&Value::Int(99)));
        let observed = vm.call("app.Widget", "value", vec![widget]).unwrap();
        assert!(observed.same_as(&Value::Int(99)));
    }

    #[test]
    fn test_cast_failure() {
        let mut vm = Vm::new();
        vm.load(widget_module());
        let err = vm
            .check_cast(&Value::Int(3), &TypeRef::Named("app.Widget".to_string()))
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidCast { .. }));
    }

    #[test]
    fn test_static_defaults() {
        let mut builder = ModuleBuilder::new("app");
        builder.add_type(
            TypeBuilder::new("app.Counter")
                .static_field("_count", TypeRef::Int, Visibility::Private, None)
                .build(),
        );
        let mut vm = Vm::new();
        vm.load(builder.build());
        assert!(vm
            .get_static("app.Counter", "_count")
            .unwrap()
            .same_as(&Value::Int(0)));
    }
}
