//! # hotspot-server
//!
//! HTTP daemon for the hotspot access point controller.
//!
//! This library provides the API handlers, the command-backed privileged
//! channel, the automation service supervisor and logging setup.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod channel;
pub mod logging;
pub mod state;
pub mod supervisor;
