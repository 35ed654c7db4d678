//! # Till State
//!
//! In-memory state the till keeps between operations.
//!
//! - [`CartState`] - The working cart
//!
//! Shift state is not cached here: every shift mutation reads the latest
//! persisted record inside its own database transaction.

pub mod cart;

pub use cart::CartState;
