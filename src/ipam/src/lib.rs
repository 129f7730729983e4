//! Subnet allocation for tenant cluster networks.
//!
//! Subnets are carved out of a shared pool with a first fit search. The
//! reserved set is read from an external store on every allocation, so the
//! allocator itself holds nothing but a lock.

pub mod allocator;
pub mod cidr;
pub mod error;
pub mod free;

pub use allocator::{Callbacks, FnCallbacks, SubnetAllocator};
pub use error::Error;
