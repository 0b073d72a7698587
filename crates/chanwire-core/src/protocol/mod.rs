//! Wire-level building blocks.
//!
//! - `wire`: wire-type tags, the storage-independent `Value`, and primitive
//!   readers/writers.
//! - `bits`: the packed boolean bitmap emitted right after the type id.
//!
//! All parsers are panic-free: short or invalid input is reported as
//! `ChanwireError::Malformed` instead of indexing raw buffers.

pub mod bits;
pub mod wire;

pub use bits::{bitmap_len, pack_bools, unpack_bools};
pub use wire::{read_value, write_value, Value, WireType};
