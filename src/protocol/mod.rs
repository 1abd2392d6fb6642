//! Wire protocol for the Toby bot platform
//!
//! Topic layout, the message envelope and the JSON bodies of server commands.

pub mod commands;
pub mod hashtags;
pub mod messages;
pub mod topics;

pub use commands::*;
pub use hashtags::{find_hashtags, remove_hashtags};
pub use messages::*;
pub use topics::*;
