//! Leaf types shared across the crate: errors, abort signals, connections, and
//! socket address specifiers.

mod error;
pub use error::*;

mod abort;
pub use abort::*;

mod connection;
pub use connection::*;

mod socketspec;
pub use socketspec::*;
