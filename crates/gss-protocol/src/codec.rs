use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{BusMessage, MAX_FRAME_SIZE};

/// Codec for encoding/decoding bus messages.
///
/// Frame layout: `[4 bytes big-endian len][1 byte tag][bincode payload]`,
/// where `len` counts the tag byte plus the payload.
#[derive(Clone, Copy, Debug)]
pub struct BusCodec {
    max_frame_size: usize,
}

impl Default for BusCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl BusCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a message with framing.
    pub fn encode(&self, msg: &BusMessage) -> ProtocolResult<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        let too_large = || ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: self.max_frame_size,
        };
        if payload.len() > self.max_frame_size {
            return Err(too_large());
        }
        let len = u32::try_from(payload.len() + 1).map_err(|_| too_large())?;
        let mut buf = Vec::with_capacity(4 + 1 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(&self, data: &[u8]) -> ProtocolResult<(BusMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = self.frame_len([data[0], data[1], data[2], data[3]])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(&data[4..total])?;
        Ok((msg, total))
    }

    /// Read one frame from an async stream.
    ///
    /// Returns `Ok(None)` when the stream ends before a new frame starts.
    pub async fn read_message<R>(&self, reader: &mut R) -> ProtocolResult<Option<BusMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = self.frame_len(header)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Self::decode_body(&body).map(Some)
    }

    /// Write one framed message and flush it.
    pub async fn write_message<W>(&self, writer: &mut W, msg: &BusMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Validate a length header and return the body length (tag + payload).
    fn frame_len(&self, header: [u8; 4]) -> ProtocolResult<usize> {
        let len = u32::from_be_bytes(header) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len - 1,
                max: self.max_frame_size,
            });
        }
        Ok(len)
    }

    /// Decode `[tag][payload]`, checking the tag against the payload.
    fn decode_body(body: &[u8]) -> ProtocolResult<BusMessage> {
        let tag = body[0];
        if !BusMessage::is_known_tag(tag) {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        let msg: BusMessage = bincode::deserialize(&body[1..])
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::FramingError(format!(
                "tag {tag} does not match {} payload",
                msg.type_name()
            )));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{Fault, FaultCode};
    use crate::message::*;
    use gss_types::TypedValue;

    fn call(method: Method) -> BusMessage {
        BusMessage::Call {
            serial: 7,
            path: "/com/hack_computer/GameStateService".into(),
            interface: "com.hack_computer.GameStateService".into(),
            method,
        }
    }

    macro_rules! frame_test {
        ($name:ident, $msg:expr) => {
            #[test]
            fn $name() {
                let codec = BusCodec::default();
                let msg = $msg;
                let encoded = codec.encode(&msg).unwrap();
                let (decoded, consumed) = codec.decode(&encoded).unwrap();
                assert_eq!(consumed, encoded.len());
                assert_eq!(decoded, msg);
            }
        };
    }

    frame_test!(get_call_frame, call(Method::Get { key: "SAMPLE_001".into() }));

    frame_test!(set_call_frame, call(Method::Set {
        key: "SAMPLE_005".into(),
        value: WireValue::from(&TypedValue::IntSequence(vec![1, 2, 3])),
    }));

    frame_test!(subscribe_call_frame, call(Method::Subscribe {
        keys: Some(vec!["A".into()]),
    }));

    frame_test!(fault_reply_frame, BusMessage::Reply {
        serial: 9,
        body: ReplyBody::Fault(Fault::new(FaultCode::KeyNotFound, "SAMPLE_NOTFOUND")),
    });

    frame_test!(changed_signal_frame, BusMessage::Signal {
        path: "/p".into(),
        interface: "i".into(),
        signal: SignalBody::Changed {
            key: "SAMPLE_004".into(),
            value: WireValue::from(&TypedValue::String("STRING".into())),
            sequence: 4,
        },
    });

    #[test]
    fn decode_truncated() {
        let err = BusCodec::default().decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = BusCodec::default().decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_incomplete_frame() {
        let codec = BusCodec::default();
        let encoded = codec.encode(&call(Method::Ping)).unwrap();
        let err = codec.decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_unknown_tag() {
        let codec = BusCodec::default();
        let mut encoded = codec.encode(&call(Method::Ping)).unwrap();
        encoded[4] = 42;
        let err = codec.decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageType(42)));
    }

    #[test]
    fn decode_mismatched_tag() {
        let codec = BusCodec::default();
        let mut encoded = codec.encode(&call(Method::Ping)).unwrap();
        encoded[4] = BusMessage::REPLY_TAG;
        let err = codec.decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn oversized_frames_rejected() {
        let codec = BusCodec::new(8);
        let msg = call(Method::Get { key: "a-key-longer-than-the-limit".into() });
        assert!(matches!(
            codec.encode(&msg),
            Err(ProtocolError::FrameTooLarge { max: 8, .. })
        ));

        let header = (1024u32).to_be_bytes();
        let mut data = header.to_vec();
        data.extend_from_slice(&[1u8; 8]);
        assert!(matches!(
            codec.decode(&data),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn stream_roundtrip_and_clean_eof() {
        let codec = BusCodec::default();
        let (mut client, mut server) = tokio::io::duplex(1024);

        let first = call(Method::Get { key: "A".into() });
        let second = BusMessage::Reply { serial: 1, body: ReplyBody::Ack };
        codec.write_message(&mut client, &first).await.unwrap();
        codec.write_message(&mut client, &second).await.unwrap();
        drop(client);

        assert_eq!(codec.read_message(&mut server).await.unwrap(), Some(first));
        assert_eq!(codec.read_message(&mut server).await.unwrap(), Some(second));
        assert_eq!(codec.read_message(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stream_truncated_body_is_an_error() {
        use tokio::io::AsyncWriteExt;

        let codec = BusCodec::default();
        let (mut client, mut server) = tokio::io::duplex(1024);
        let frame = codec.encode(&call(Method::Ping)).unwrap();
        client.write_all(&frame[..frame.len() - 2]).await.unwrap();
        drop(client);

        let err = codec.read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
