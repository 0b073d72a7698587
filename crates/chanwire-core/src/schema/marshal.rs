//! Per-field marshallers.

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::protocol::{read_value, write_value, Value, WireType};

use super::accessor::Accessor;

/// One resolved field: an accessor plus the wire type it travels as.
pub struct WireField<M> {
    accessor: Accessor<M>,
    wire: WireType,
}

impl<M: 'static> WireField<M> {
    pub(crate) fn new(accessor: Accessor<M>, wire: WireType) -> Self {
        Self { accessor, wire }
    }

    pub fn name(&self) -> &'static str {
        self.accessor.name()
    }

    pub fn wire_type(&self) -> WireType {
        self.wire
    }

    pub fn is_bool(&self) -> bool {
        self.wire == WireType::Bool
    }

    /// Write the field's current value at its declared width.
    pub fn marshal(&self, owner: &M, out: &mut BytesMut) -> Result<()> {
        write_value(self.wire, &self.accessor.get(owner), out)
    }

    /// Read exactly one value of the declared width and store it.
    pub fn unmarshal(&self, owner: &mut M, buf: &mut Bytes) -> Result<()> {
        let v = read_value(self.wire, buf)?;
        self.accessor.set(owner, v)
    }

    /// Boolean fields bypass `marshal` and travel in the packed bitmap.
    pub(crate) fn get_bool(&self, owner: &M) -> bool {
        matches!(self.accessor.get(owner), Value::Bool(true))
    }

    pub(crate) fn set_bool(&self, owner: &mut M, v: bool) -> Result<()> {
        self.accessor.set(owner, Value::Bool(v))
    }

    pub(crate) fn project<O: 'static>(
        self,
        inner: fn(&O) -> &M,
        inner_mut: fn(&mut O) -> &mut M,
    ) -> WireField<O> {
        WireField {
            accessor: self.accessor.project(inner, inner_mut),
            wire: self.wire,
        }
    }
}
