//! Runtime values passed between scripts, executors, and placeholders.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tripwire_script::Literal;

/// A value produced or consumed by a script at runtime.
///
/// `Object` wraps an opaque host handle (an item stack, an entity, a
/// location); the engine never looks inside it, only executors and
/// placeholders supplied by the same host do.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Object(ObjectHandle),
}

impl Value {
    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
        }
    }

    /// Interpret this value as a condition: booleans as themselves, null as
    /// false. Anything else is a type error, reported by the caller.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Null => Some(false),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view for mixed-type arithmetic, when this is a number at all.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Self::Null,
            Literal::Bool(b) => Self::Bool(*b),
            Literal::Int(i) => Self::Int(*i),
            Literal::Double(d) => Self::Double(*d),
            Literal::Str(s) => Self::Str(s.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            // Numbers compare across Int/Double.
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Object(o) => write!(f, "<{}>", o.label),
        }
    }
}

/// An opaque, shareable handle to a host object.
#[derive(Clone)]
pub struct ObjectHandle {
    label: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    pub fn new(label: impl Into<String>, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }

    /// Debug label supplied by the host (e.g. `"ItemStack"`).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Borrow the underlying host object, if it is a `T`. Only host-side
    /// executors and placeholders should know the concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({})", self.label)
    }
}
