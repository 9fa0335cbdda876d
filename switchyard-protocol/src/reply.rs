//! Replies written back to a peer.

use crate::frame::Frame;
use bytes::Bytes;

/// What the server sends in answer to one inbound message.
///
/// `Encoded` bytes came out of the codec. `Raw` is an error description that
/// deliberately bypasses the codec, so codec failures never depend on the
/// codec to report themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Encoded(Bytes),
    Raw(String),
}

impl Reply {
    /// Wraps the reply in a frame, flagging raw errors.
    pub fn into_frame(self) -> Frame {
        match self {
            Reply::Encoded(bytes) => Frame::new(bytes),
            Reply::Raw(message) => Frame::error(message),
        }
    }

    /// Interprets a frame received from a server.
    pub fn from_frame(frame: Frame) -> Self {
        if frame.is_error() {
            Reply::Raw(String::from_utf8_lossy(&frame.payload).into_owned())
        } else {
            Reply::Encoded(frame.payload)
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Reply::Raw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_reply_sets_error_flag() {
        let frame = Reply::Raw("unknown service 020000".to_string()).into_frame();
        assert!(frame.is_error());

        let reply = Reply::from_frame(frame);
        assert_eq!(reply, Reply::Raw("unknown service 020000".to_string()));
    }

    #[test]
    fn test_encoded_reply_passes_bytes_through() {
        let frame = Reply::Encoded(Bytes::from_static(b"\x01\x00\x00")).into_frame();
        assert!(!frame.is_error());
        assert!(!Reply::from_frame(frame).is_raw());
    }
}
