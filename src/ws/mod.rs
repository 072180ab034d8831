//! C1 (frame codec) and C2 (message channel): everything below the
//! request/response dispatcher in [`crate::session`].

pub mod channel;
pub mod frame;
pub mod handshake;

pub use channel::{ChannelEvent, MessageChannel};
