//! Purpose: Shared core library crate used by the `rscpq` CLI and tests.
//! Exports: `core` (registry, message model, request decoding, errors) and `api`.
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: Decoding is pure; no module here performs I/O.
pub mod api;
pub mod core;
