//! michat rendezvous relay.
//!
//! The relay:
//! 1. Binds every sender address to a session token
//! 2. Opens encrypted introduction requests with the service key
//! 3. Publishes the requester's key into the target's mailbox slot
//! 4. Tells both sides about the requester's observed address
//!
//! Peers then talk to each other directly; the relay never carries chat
//! traffic.

#![forbid(unsafe_code)]

pub mod directory;
pub mod relay;
pub mod server;

pub use directory::{DirectoryStats, SessionDirectory};
pub use relay::{Introduction, NoticeKind, Outbound, PacketError, Relay};
pub use server::{RelayServer, SocketOptions};
