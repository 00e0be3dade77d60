//! `urft`: a unidirectional reliable file-transfer protocol layered on an
//! unreliable datagram substrate. A sender delivers one file to a receiver
//! addressed by host and port; the receiver writes the file under its
//! original basename and the two peers each print an MD5 over the bytes so
//! operators can confirm the transfer was lossless.
//!
//! The protocol core lives in [`codec`], [`sender`], [`receiver`], and
//! [`session`]; [`transport`] and [`fileio`] are the socket and filesystem
//! collaborators the core is driven through.

pub mod codec;
pub mod config;
pub mod error;
pub mod fileio;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod session;
pub mod transport;

pub use config::TransferConfig;
pub use error::UrftError;
pub use report::TransferSummary;
pub use session::{ReceiverSession, SenderSession};
