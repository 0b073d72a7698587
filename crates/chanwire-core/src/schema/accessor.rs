//! Field accessors.
//!
//! An accessor is bound to exactly one storage slot when the field is
//! declared and reused for every packet afterwards. It moves values in and
//! out as [`Value`] so marshallers never see the concrete storage type.

use std::any::type_name;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{ChanwireError, Result};
use crate::protocol::{Value, WireType};

/// In-memory storage type of a field.
pub trait FieldStorage: Sized + Send + Sync + 'static {
    /// Wire type used when the declaration carries no override.
    const DEFAULT_WIRE: WireType;

    fn to_value(&self) -> Value;

    fn from_value(v: Value) -> Option<Self>;

    /// Whether this storage may travel as `ty`.
    fn accepts(ty: WireType) -> bool;
}

macro_rules! int_storage {
    ($($t:ty => $wire:ident),* $(,)?) => {$(
        impl FieldStorage for $t {
            const DEFAULT_WIRE: WireType = WireType::$wire;

            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(v: Value) -> Option<Self> {
                match v {
                    Value::Int(i) => Some(i as $t),
                    _ => None,
                }
            }

            fn accepts(ty: WireType) -> bool {
                ty.is_integer()
            }
        }
    )*};
}

int_storage! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
}

impl FieldStorage for f32 {
    const DEFAULT_WIRE: WireType = WireType::F32;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Float(f) => Some(f as f32),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty.is_float()
    }
}

impl FieldStorage for f64 {
    const DEFAULT_WIRE: WireType = WireType::F64;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty.is_float()
    }
}

impl FieldStorage for bool {
    const DEFAULT_WIRE: WireType = WireType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty == WireType::Bool
    }
}

impl FieldStorage for String {
    const DEFAULT_WIRE: WireType = WireType::Str;

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty == WireType::Str
    }
}

impl FieldStorage for Vec<u8> {
    const DEFAULT_WIRE: WireType = WireType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(Bytes::copy_from_slice(self))
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Bytes(b) => Some(b.to_vec()),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty == WireType::Bytes
    }
}

impl FieldStorage for Bytes {
    const DEFAULT_WIRE: WireType = WireType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn accepts(ty: WireType) -> bool {
        ty == WireType::Bytes
    }
}

type Getter<M> = Arc<dyn Fn(&M) -> Value + Send + Sync>;
type Setter<M> = Arc<dyn Fn(&mut M, Value) -> Result<()> + Send + Sync>;

/// Gets/sets one named field on an owner of type `M`.
pub struct Accessor<M> {
    name: &'static str,
    get: Getter<M>,
    set: Option<Setter<M>>,
}

impl<M> Clone for Accessor<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            get: Arc::clone(&self.get),
            set: self.set.clone(),
        }
    }
}

impl<M: 'static> Accessor<M> {
    /// Bind through a pair of slot handles.
    pub fn new<T: FieldStorage>(
        name: &'static str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> Self {
        Self {
            name,
            get: Arc::new(move |owner: &M| get(owner).to_value()),
            set: Some(Arc::new(move |owner: &mut M, v: Value| {
                let v = T::from_value(v).ok_or_else(|| {
                    ChanwireError::Internal(format!(
                        "value does not fit {} storage of field {name}",
                        type_name::<T>()
                    ))
                })?;
                *get_mut(owner) = v;
                Ok(())
            })),
        }
    }

    /// Bind a slot that can be read but not written back.
    pub fn read_only<T: FieldStorage>(name: &'static str, get: fn(&M) -> &T) -> Self {
        Self {
            name,
            get: Arc::new(move |owner: &M| get(owner).to_value()),
            set: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    pub fn get(&self, owner: &M) -> Value {
        (self.get)(owner)
    }

    pub fn set(&self, owner: &mut M, value: Value) -> Result<()> {
        match &self.set {
            Some(set) => set(owner, value),
            None => Err(ChanwireError::Access {
                message: type_name::<M>(),
                field: self.name,
                reason: "field has no setter".into(),
            }),
        }
    }

    /// Re-root this accessor onto an owner that embeds `M`.
    pub(crate) fn project<O: 'static>(
        self,
        inner: fn(&O) -> &M,
        inner_mut: fn(&mut O) -> &mut M,
    ) -> Accessor<O> {
        let get = self.get;
        let set = self.set;
        Accessor {
            name: self.name,
            get: Arc::new(move |owner: &O| get(inner(owner))),
            set: set.map(|set| -> Setter<O> {
                Arc::new(move |owner: &mut O, v: Value| set(inner_mut(owner), v))
            }),
        }
    }
}
