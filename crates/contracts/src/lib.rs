//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-crate data structures.
//! All business crates can only depend on this crate, reverse dependencies
//! are prohibited.
//!
//! ## Delivery Model
//! - A `Batch` is the record set handed to one flush task for delivery
//! - One flush = one attempt to deliver a batch to one destination
//! - Flush outcomes are `Ok`, `Retry` or `Error`; retry/backoff policy lives
//!   in the scheduler, not here

mod batch;
mod config;
mod error;
mod outcome;
mod value;

pub use batch::*;
pub use config::*;
pub use error::*;
pub use outcome::*;
pub use value::*;
