//! Record types flowing through the syncer
//!
//! # Components
//!
//! - `RecordRef` / `Batch`: references discovered on one listing page
//! - `InscriptionRecord`: the strongly typed fields parsed from a detail page
//! - `Outcome`: what a worker hands back to the aggregator for one reference

mod inscription;
mod outcome;

pub use inscription::{Batch, InscriptionRecord, RecordRef, UNSTABLE_NUMBER};
pub use outcome::Outcome;
