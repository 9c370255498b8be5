//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the connection state, the desired subscription set
//! and the last-value price cache. Nothing here performs I/O.

/// Connection state and the shared price cache.
pub mod streaming;

/// Symbol normalization and the desired subscription set.
pub mod subscription;
