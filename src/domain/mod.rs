//! Cart domain: aggregates, value objects, the ports the engine talks
//! through, and the reconciliation and pricing services built on them.
pub mod aggregates;
pub mod events;
pub mod ports;
pub mod services;
pub mod value_objects;
