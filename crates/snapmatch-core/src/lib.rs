//! Core domain model for snapmatch.
//!
//! This crate defines the event/photo/face-embedding data model, the SQLite
//! schema, and the store interfaces the face-matching pipeline is written
//! against.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use store::{CommitOutcome, FaceStore, PhotoStore};
