//! `permfind` - Find files whose permission bits match an exact rwx pattern.
//!
//! [`crawler::Crawler`] walks a tree and yields matching paths;
//! [`pipeline::Pipeline`] runs the walker through an external `sort` and
//! counts the results.

#![cfg(unix)]
#![deny(
    warnings,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]

pub mod config;
pub mod crawler;
pub mod error;
#[cfg(feature = "cli")]
pub mod logging;
pub mod permission;
pub mod pipeline;
pub mod types;
