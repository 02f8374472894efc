//! Wire types shared between the session server and any client.
//!
//! This crate is intentionally logic-free: it only describes the shape of
//! messages that cross the `Connection` boundary (client -> server and
//! server -> client), plus the closed sets of error/close codes and the
//! HTTP lobby request/response bodies. The session server is the only
//! place these types get interpreted.

mod codes;
mod http;
mod messages;

pub use codes::*;
pub use http::*;
pub use messages::*;
