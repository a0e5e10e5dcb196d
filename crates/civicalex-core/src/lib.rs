//! Core types and trait definitions for CivicaLex.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! It holds the domain records (users, cases, petitions, documents, sessions),
//! the validation rules applied to user input, and the [`store::LegalStore`]
//! abstraction that storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

#[macro_use]
mod label;

pub mod case;
pub mod document;
pub mod error;
pub mod petition;
pub mod session;
pub mod store;
pub mod user;
pub mod validate;

pub use error::{Error, Result};
pub use validate::{FieldError, ValidationErrors};
