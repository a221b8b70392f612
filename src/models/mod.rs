//! Request and response records for the gateway.
//!
//! Everything here is transient: the object store is the system of record,
//! and these types only carry validated identifiers in and store answers out.

pub mod bucket;
pub mod object;
pub mod outcome;
pub mod presigned;
