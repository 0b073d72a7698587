//! Top-level facade crate for chanwire.
//!
//! Re-exports the protocol core and the host library so users can depend on a single crate.

pub mod core {
    pub use chanwire_core::*;
}

pub mod host {
    pub use chanwire_host::*;
}
