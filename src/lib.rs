//! Lifecycle tracking for remote copy/move transfers.
//!
//! A transfer is started on a remote agent, then followed through its push
//! event stream (archive, upload, extract) until it completes, is canceled
//! or fails. The [`transfer::Registry`] owns all records, mirrors them into
//! durable storage and drives one global activity indicator.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod i18n;
pub mod indicator;
pub mod remote;
pub mod store;
pub mod streaming;
pub mod transfer;

pub use error::{Result, TransferError};
