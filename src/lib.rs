//! Inspect and create signed IPNS records.
//!
//! The core is [`machine::Machine`], an event-driven state machine that
//! validates names, fetches and verifies published records, and builds and
//! signs new ones. [`api::spawn`] runs a machine as a single tokio task for a
//! presentation layer to drive.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate tracing;

pub mod api;
pub mod config;
pub mod datetime_utils;
pub mod errors;
pub mod fetcher;
pub mod key_types;
pub mod machine;
pub mod name;
pub mod record;

pub use crate::api::{spawn, MachineHandle, Snapshot};
pub use crate::config::MachineConfig;
pub use crate::fetcher::{FetchError, Fetcher, MemoryFetcher};
pub use crate::key_types::{Ed25519KeyManager, KeyManager, Keypair};
pub use crate::machine::{Event, FormField, Machine, Mode};
pub use crate::name::{ParsedName, ValidationError};
