//! Change tracking over plain data graphs.
//!
//! # Responsibility
//! - Hold record data in a shared, reference-identity graph (`value`).
//! - Report every tracked mutation as a dotted path to a sink (`proxy`).
//!
//! # Invariants
//! - Single-threaded: handles are `Rc` based and not `Send`.

pub mod proxy;
pub mod value;
