//! Type registry.
//!
//! Maps type names carried on the wire (view types, parameter types) to the
//! kind of value they accept. Populated once at startup from a closed set:
//! the built-in names below plus the view types the deployment exposes.
//! An unknown name is a data error (`UnresolvableType`), nothing more.

use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::marshal::Value;

/// What a resolved type name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Bytes,
    List,
    Map,
    /// Accepts any value.
    Object,
    /// A remote view (interface) type. Only valid in the view slot.
    View,
}

impl TypeKind {
    fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeKind::Boolean
                | TypeKind::Byte
                | TypeKind::Short
                | TypeKind::Int
                | TypeKind::Long
                | TypeKind::Float
                | TypeKind::Double
                | TypeKind::Char
        )
    }

    /// Whether a decoded argument is acceptable for a parameter of this kind.
    pub fn admits(&self, value: &Value) -> bool {
        if value.is_null() {
            return !self.is_primitive();
        }
        match (self, value) {
            (TypeKind::Object, _) => true,
            (TypeKind::Boolean, Value::Bool(_)) => true,
            (TypeKind::Byte, Value::Byte(_)) => true,
            (TypeKind::Short, Value::Short(_)) => true,
            (TypeKind::Int, Value::Int(_)) => true,
            (TypeKind::Long, Value::Long(_)) => true,
            (TypeKind::Float, Value::Float(_)) => true,
            (TypeKind::Double, Value::Double(_)) => true,
            (TypeKind::Char, Value::Char(_)) => true,
            (TypeKind::String, Value::String(_)) => true,
            (TypeKind::Bytes, Value::Bytes(_)) => true,
            (TypeKind::List, Value::List(_)) => true,
            (TypeKind::Map, Value::Map(_)) => true,
            // A view-typed parameter carries a reference to another component.
            (TypeKind::View, Value::Locator(_)) => true,
            _ => false,
        }
    }
}

const BUILTINS: &[(&str, TypeKind)] = &[
    ("boolean", TypeKind::Boolean),
    ("byte", TypeKind::Byte),
    ("short", TypeKind::Short),
    ("int", TypeKind::Int),
    ("long", TypeKind::Long),
    ("float", TypeKind::Float),
    ("double", TypeKind::Double),
    ("char", TypeKind::Char),
    ("java.lang.Boolean", TypeKind::Boolean),
    ("java.lang.Byte", TypeKind::Byte),
    ("java.lang.Short", TypeKind::Short),
    ("java.lang.Integer", TypeKind::Int),
    ("java.lang.Long", TypeKind::Long),
    ("java.lang.Float", TypeKind::Float),
    ("java.lang.Double", TypeKind::Double),
    ("java.lang.Character", TypeKind::Char),
    ("java.lang.String", TypeKind::String),
    ("java.lang.Object", TypeKind::Object),
    ("java.io.Serializable", TypeKind::Object),
    ("[B", TypeKind::Bytes),
    ("java.util.List", TypeKind::List),
    ("java.util.Collection", TypeKind::List),
    ("java.util.Map", TypeKind::Map),
];

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeKind>,
}

impl TypeRegistry {
    /// Registry holding only the built-in value types.
    pub fn with_builtins() -> Self {
        let types = BUILTINS
            .iter()
            .map(|(name, kind)| (name.to_string(), *kind))
            .collect();
        Self { types }
    }

    /// Built-ins plus the given view types.
    pub fn with_views<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::with_builtins();
        for view in views {
            registry.register_view(view);
        }
        registry
    }

    pub fn register_view(&mut self, name: impl Into<String>) {
        self.types.insert(name.into(), TypeKind::View);
    }

    pub fn register(&mut self, name: impl Into<String>, kind: TypeKind) {
        self.types.insert(name.into(), kind);
    }

    pub fn resolve(&self, name: &str) -> Result<TypeKind, ProtocolError> {
        self.types
            .get(name)
            .copied()
            .ok_or_else(|| ProtocolError::UnresolvableType(name.to_string()))
    }

    /// Resolve a name that must denote a view type.
    pub fn resolve_view(&self, name: &str) -> Result<(), ProtocolError> {
        match self.resolve(name)? {
            TypeKind::View => Ok(()),
            _ => Err(ProtocolError::UnresolvableType(format!(
                "{} is not a view type",
                name
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
