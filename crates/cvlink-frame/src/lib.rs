//! Magic-checked, length-prefixed message framing.
//!
//! Every message on a cvlink connection is framed with:
//! - A 4-byte little-endian magic number (`0x9E2B83C1`) for stream synchronization
//! - A 4-byte little-endian payload length
//!
//! A receiver either reconstructs exactly the bytes the sender wrapped or
//! reports why it could not. No partial or merged messages reach callers.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
pub use codec::{decode_frame, encode_frame, wrap, FrameConfig, HEADER_SIZE, MAGIC, UNBOUNDED_PAYLOAD};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
