//! idbstore WASM bridge
//!
//! Exposes IndexedDB object stores to JavaScript through wasm-bindgen. The
//! bindings in [`browser`] only do work on `wasm32`; [`request`] holds the
//! JSON option shapes and is plain Rust.

pub mod browser;
pub mod request;

pub use browser::IdbStore;
