//! Runtime values and object model

use latchkey_bytecode::TypeRef;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a heap object
pub type ObjHandle = Rc<RefCell<ObjectData>>;

/// A heap-allocated object instance
#[derive(Debug)]
pub struct ObjectData {
    /// Runtime class of the instance, including generic arguments
    pub class: TypeRef,
    /// Field values, keyed by field name
    pub fields: FxHashMap<String, Value>,
}

/// A live handle to a field's storage
#[derive(Debug, Clone)]
pub enum RefSlot {
    /// An instance field slot
    Field {
        /// Owning object
        object: ObjHandle,
        /// Field name
        field: String,
    },
    /// A static field slot
    Static {
        /// Full name of the declaring type
        type_name: String,
        /// Field name
        field: String,
    },
}

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// The null reference
    Null,
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Object reference
    Obj(ObjHandle),
    /// By-reference slot handle
    Ref(RefSlot),
}

impl Value {
    /// Short description for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Obj(_) => "object",
            Value::Ref(_) => "ref",
        }
    }

    /// The default value for a declared type
    pub fn default_for(ty: &TypeRef) -> Value {
        match ty {
            TypeRef::Int => Value::Int(0),
            TypeRef::Float => Value::Float(0.0),
            TypeRef::Bool => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// Structural equality for test assertions; objects compare by identity
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
