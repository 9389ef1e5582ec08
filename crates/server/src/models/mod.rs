//! Domain models for the server.
//!
//! These types represent validated domain objects separate from database
//! row types.

pub mod address;
pub mod connect;
pub mod session;
pub mod site;

pub use address::Address;
pub use connect::{ConnectSession, NewConnectSession};
pub use session::{CurrentUser, keys as session_keys};
pub use site::{NewSite, Site};
