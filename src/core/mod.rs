//! Core rule editing functionality
//!
//! This module contains the types and logic of a firewall rule editing session.
//! It provides:
//!
//! - [`firewall`]: Rule payloads as exchanged with the firewall API
//! - [`editor`]: The revision state machine and its save projection
//! - [`api_error`]: Mapping of API validation errors back onto rule slots
//! - [`diff`]: Line diff between fetched rules and a save payload
//! - [`error`]: Error types for editor operations

pub mod api_error;
pub mod diff;
pub mod editor;
pub mod error;
pub mod firewall;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
