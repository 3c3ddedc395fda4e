// crates/aerogate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Aerogate SQLite Store Library
// Description: Durable store backend over SQLite with trigger-enforced invariants.
// Purpose: Expose the SQLite implementation of every Aerogate store trait.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! This crate implements the Aerogate store traits over `SQLite` with WAL
//! journaling. The three binding invariants (evidence binding for FACT, node
//! immutability, action governance) are enforced inside the database with
//! triggers, backed by typed Rust pre-checks that carry precise row ids.
//! Evidence payload bytes are content-addressed files under the configured
//! store root.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SCHEMA_VERSION;
pub use store::SqliteControlStores;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
