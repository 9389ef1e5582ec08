//! Business logic services.
//!
//! # Services
//!
//! - `address` - Address lookup gateway (autocomplete proxy, cached detail lookup)
//! - `connect` - Connect-session start and callback completion workflow

pub mod address;
pub mod connect;

pub use address::{AddressGateway, ResolveOutcome};
pub use connect::{
    AddressLocationResolver, CallbackReceipt, ConnectWorkflow, LocationResolver, StartSession,
};
