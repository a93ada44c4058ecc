//! Replies written back to buzzer devices.
//!
//! Clock replies carry no tag byte, so a reply can only be decoded knowing
//! which request it answers. Devices process one request at a time, which
//! makes that pairing unambiguous.

use bytes::{Buf, BufMut};

use crate::{
    ParticipantId, TAG_ANSWER, TAG_REGISTER,
    errors::{ProtocolError, Result},
    request::DeviceRequest,
};

/// Result code carried in an answer reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnswerCode {
    /// Answer recorded using the device's own timestamp
    Accepted = 0,
    /// Answer not recorded
    Rejected = 1,
    /// Answer recorded using the controller's receipt time
    AcceptedClockAdjusted = 2,
}

impl AnswerCode {
    /// Wire value of this code.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value. `None` for unknown codes.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Accepted),
            1 => Some(Self::Rejected),
            2 => Some(Self::AcceptedClockAdjusted),
            _ => None,
        }
    }

    /// Whether the answer was recorded.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// A reply to a device request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceReply {
    /// Milliseconds since the controller epoch, taken at request receipt
    Clock {
        /// Elapsed milliseconds
        elapsed_ms: u32,
    },

    /// Registration succeeded
    Registered {
        /// Newly assigned participant id
        id: ParticipantId,
    },

    /// Outcome of an answer
    Answer(AnswerCode),
}

impl DeviceReply {
    /// Encoded length of this reply in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Clock { .. } => 4,
            Self::Registered { .. } => 5,
            Self::Answer(_) => 2,
        }
    }

    /// Encode the reply into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        match *self {
            Self::Clock { elapsed_ms } => dst.put_u32(elapsed_ms),
            Self::Registered { id } => {
                dst.put_u8(TAG_REGISTER);
                dst.put_u32(id);
            },
            Self::Answer(code) => {
                dst.put_u8(TAG_ANSWER);
                dst.put_u8(code.to_u8());
            },
        }
    }

    /// Encode the reply into a freshly allocated buffer.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Decode the reply to `request` from the front of `src`.
    ///
    /// Used on the device side and by tests.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` if `src` is shorter than the reply layout
    /// - `ProtocolError::UnknownTag` if the tag or answer code is not the
    ///   expected one
    pub fn decode(request: &DeviceRequest, src: &[u8]) -> Result<Self> {
        let expected = match request {
            DeviceRequest::ClockQuery => 4,
            DeviceRequest::Register => 5,
            DeviceRequest::Answer { .. } => 2,
        };

        if src.len() < expected {
            return Err(ProtocolError::Truncated {
                tag: request.tag(),
                expected,
                actual: src.len(),
            });
        }

        let mut buf = src;
        match request {
            DeviceRequest::ClockQuery => Ok(Self::Clock { elapsed_ms: buf.get_u32() }),
            DeviceRequest::Register => match buf.get_u8() {
                TAG_REGISTER => Ok(Self::Registered { id: buf.get_u32() }),
                other => Err(ProtocolError::UnknownTag(other)),
            },
            DeviceRequest::Answer { .. } => match buf.get_u8() {
                TAG_ANSWER => {
                    let raw = buf.get_u8();
                    AnswerCode::from_u8(raw).map(Self::Answer).ok_or(ProtocolError::UnknownTag(raw))
                },
                other => Err(ProtocolError::UnknownTag(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reply_is_bare_u32() {
        assert_eq!(DeviceReply::Clock { elapsed_ms: 0x0001_e240 }.to_vec(), vec![0, 1, 0xe2, 0x40]);
    }

    #[test]
    fn registered_reply_layout() {
        assert_eq!(DeviceReply::Registered { id: 2 }.to_vec(), vec![0x01, 0, 0, 0, 2]);
    }

    #[test]
    fn answer_reply_layout() {
        assert_eq!(DeviceReply::Answer(AnswerCode::Accepted).to_vec(), vec![0x03, 0]);
        assert_eq!(DeviceReply::Answer(AnswerCode::Rejected).to_vec(), vec![0x03, 1]);
        assert_eq!(DeviceReply::Answer(AnswerCode::AcceptedClockAdjusted).to_vec(), vec![0x03, 2]);
    }

    #[test]
    fn decode_needs_matching_request() {
        let answer = DeviceRequest::Answer { id: 0, device_elapsed_ms: 0 };

        assert_eq!(
            DeviceReply::decode(&answer, &[0x03, 2]),
            Ok(DeviceReply::Answer(AnswerCode::AcceptedClockAdjusted))
        );
        assert_eq!(
            DeviceReply::decode(&DeviceRequest::Register, &[0x01, 0, 0, 1, 0]),
            Ok(DeviceReply::Registered { id: 256 })
        );
        assert_eq!(DeviceReply::decode(&answer, &[0x03, 9]), Err(ProtocolError::UnknownTag(9)));
        assert!(matches!(
            DeviceReply::decode(&DeviceRequest::ClockQuery, &[0, 0]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn answer_code_acceptance() {
        assert!(AnswerCode::Accepted.is_accepted());
        assert!(AnswerCode::AcceptedClockAdjusted.is_accepted());
        assert!(!AnswerCode::Rejected.is_accepted());
        assert_eq!(AnswerCode::from_u8(3), None);
    }
}
