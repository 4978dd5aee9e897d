//! Canopy Protocol - JSON wire types for the naming service.
//!
//! This crate defines:
//! - The client-facing service API bodies (paths, locks, storage lookup)
//! - The storage-facing registration API bodies
//! - The storage command API the naming core issues to replicas
//! - The exception envelope shared by every error response
//!
//! All bodies are flat JSON objects; the naming service and the storage
//! servers may be implemented in different languages as long as they agree
//! on these shapes.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod command;
pub mod exception;
pub mod registration;
pub mod service;

pub use command::{StorageCopyRequest, StoragePathRequest, COPY_URI, CREATE_URI, DELETE_URI};
pub use exception::{ExceptionKind, ExceptionResponse};
pub use registration::{RegisterRequest, RegisterResponse};
pub use service::{
    ListResponse, LockRequest, PathRequest, StorageInfo, SuccessResponse,
};
