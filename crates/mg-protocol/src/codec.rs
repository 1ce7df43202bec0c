//! Tokio codec for framed control messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::{ControlRequest, ControlResponse};
use crate::error::ProtocolError;
use crate::frame::{FrameHeader, FrameKind, MAX_PAYLOAD_SIZE};

/// A decoded control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Request(ControlRequest),
    Response(ControlResponse),
}

impl ControlFrame {
    fn kind(&self) -> FrameKind {
        match self {
            ControlFrame::Request(_) => FrameKind::Request,
            ControlFrame::Response(_) => FrameKind::Response,
        }
    }
}

impl From<ControlRequest> for ControlFrame {
    fn from(req: ControlRequest) -> Self {
        ControlFrame::Request(req)
    }
}

impl From<ControlResponse> for ControlFrame {
    fn from(resp: ControlResponse) -> Self {
        ControlFrame::Response(resp)
    }
}

/// Codec for encoding/decoding control frames
#[derive(Debug, Default)]
pub struct ControlCodec {
    /// Header decoded while waiting for the rest of its payload
    pending_header: Option<FrameHeader>,
}

impl ControlCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for ControlCodec {
    type Item = ControlFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < payload_len {
            self.pending_header = Some(header);
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();
        let frame = match header.kind {
            FrameKind::Request => ControlFrame::Request(bincode::deserialize(&payload)?),
            FrameKind::Response => ControlFrame::Response(bincode::deserialize(&payload)?),
        };

        Ok(Some(frame))
    }
}

impl Encoder<ControlFrame> for ControlCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: ControlFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = match &frame {
            ControlFrame::Request(req) => bincode::serialize(req)?,
            ControlFrame::Response(resp) => bincode::serialize(resp)?,
        };

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        FrameHeader::new(frame.kind(), payload.len() as u32).encode(dst);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlErrorKind, RunnerStatus};
    use crate::frame::HEADER_SIZE;

    #[test]
    fn test_codec_request() {
        let mut codec = ControlCodec::new();
        let frame = ControlFrame::from(ControlRequest::Authenticate {
            token: "deadbeef".to_string(),
        });

        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_error_response() {
        let mut codec = ControlCodec::new();
        let frame = ControlFrame::from(ControlResponse::error(
            ControlErrorKind::Engine,
            "utun allocation failed",
        ));

        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();

        match codec.decode(&mut buf).unwrap().unwrap() {
            ControlFrame::Response(ControlResponse::Error { kind, message }) => {
                assert_eq!(kind, ControlErrorKind::Engine);
                assert_eq!(message, "utun allocation failed");
            }
            other => panic!("Expected error response, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = ControlCodec::new();
        let frame = ControlFrame::from(ControlResponse::Status(RunnerStatus::Connected));

        let mut full_buf = BytesMut::new();
        codec.encode(frame.clone(), &mut full_buf).unwrap();

        let mut partial = full_buf.split_to(HEADER_SIZE + 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full_buf);
        assert_eq!(codec.decode(&mut partial).unwrap().unwrap(), frame);
    }

    #[test]
    fn test_codec_rejects_oversized_payload() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::new();
        FrameHeader::new(FrameKind::Request, (MAX_PAYLOAD_SIZE + 1) as u32).encode(&mut buf);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }
}
