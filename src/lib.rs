#![forbid(unsafe_code)]

//! Copies every video of a Bilibili collection (season or series) into one of
//! the account's favorites lists.

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod login;
pub mod pipeline;
pub mod reference;
pub mod resolver;
pub mod session;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use error::{TransferError, TransferResult};
