//! `tokio_util` codec over the cvlink wire format.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, UNBOUNDED_PAYLOAD};
use crate::error::{FrameError, Result};

/// Frames and unframes cvlink messages for `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_payload_size: usize,
}

impl MessageCodec {
    /// Codec without a payload bound.
    pub fn new() -> Self {
        Self::with_max_payload(UNBOUNDED_PAYLOAD)
    }

    /// Codec that rejects payloads above `max_payload_size` in both directions.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&[u8]>::encode(self, item.as_ref(), dst)
    }
}

impl Encoder<&[u8]> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{Framed, FramedRead};

    use super::*;
    use crate::codec::wrap;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut client = Framed::new(left, MessageCodec::new());
        let mut server = Framed::new(right, MessageCodec::new());

        client
            .send(Bytes::from_static(b"vbp Obj1 GetStatus"))
            .await
            .unwrap();
        let request = server.next().await.unwrap().unwrap();
        assert_eq!(request.as_ref(), b"vbp Obj1 GetStatus");

        server
            .send(Bytes::from_static(b"{\"ReturnValue\":\"Ready\"}"))
            .await
            .unwrap();
        let response = client.next().await.unwrap().unwrap();
        assert_eq!(response.as_ref(), b"{\"ReturnValue\":\"Ready\"}");
    }

    #[tokio::test]
    async fn frames_written_by_blocking_wrap_decode() {
        let (mut left, right) = tokio::io::duplex(256);
        let mut reader = FramedRead::new(right, MessageCodec::new());

        left.write_all(&wrap(b"first").unwrap()).await.unwrap();
        left.write_all(&wrap(b"").unwrap()).await.unwrap();
        drop(left);

        assert_eq!(reader.next().await.unwrap().unwrap().as_ref(), b"first");
        assert!(reader.next().await.unwrap().unwrap().is_empty());
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_closed() {
        let (mut left, right) = tokio::io::duplex(256);
        let mut reader = FramedRead::new(right, MessageCodec::new());

        let wire = wrap(b"cut short").unwrap();
        left.write_all(&wire[..wire.len() - 3]).await.unwrap();
        drop(left);

        let err = reader.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn encoder_honours_bound() {
        let mut codec = MessageCodec::with_max_payload(2);
        let mut dst = BytesMut::new();
        let err = codec.encode(&b"abc"[..], &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(dst.is_empty());
    }
}
