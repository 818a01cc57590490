//! A single-node proof-of-work ledger
//!
//! - [`blockchain`] - keys, signed transactions, blocks, mining and chain validation
//! - [`api`] - REST endpoints over a shared chain
//! - [`config`] - configuration loading

#![forbid(unsafe_code)]

pub mod api;
pub mod blockchain;
pub mod config;
