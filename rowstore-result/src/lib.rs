//! Error types and result definitions for the rowstore crates.
//!
//! A single error enum ([`Error`]) and result alias ([`Result<T>`]) are shared by
//! the table store, the row iterators and the join result container, so errors
//! propagate across crate boundaries with `?`.
//!
//! # Error Categories
//!
//! - **Structural I/O failures** ([`Error::Io`], [`Error::Corrupt`]): truncated
//!   files, bad control bytes. Row readers recover from these per row.
//! - **Format errors** ([`Error::UnsupportedVersion`]): stores written by an
//!   encoding family this crate cannot read.
//! - **User input errors** ([`Error::InvalidArgumentError`]): wrong column
//!   counts, out-of-range offsets, bad options.
//! - **Cancellation** ([`Error::Canceled`]): cooperative abort requested by the
//!   execution context. Never recovered.
//! - **Exhaustion** ([`Error::EndOfTable`]): reading past the declared row count.
//! - **Internal errors** ([`Error::Internal`]): bugs or broken invariants.
#![forbid(unsafe_code)]

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
