//! Requests sent by buzzer devices.

use bytes::{Buf, BufMut};

use crate::{
    ParticipantId, TAG_ANSWER, TAG_CLOCK, TAG_REGISTER,
    errors::{ProtocolError, Result},
};

/// A decoded device request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRequest {
    /// Ask for the controller's elapsed time since its epoch
    ClockQuery,

    /// Ask for a participant id
    Register,

    /// Signal an answer
    Answer {
        /// Participant id assigned at registration
        id: ParticipantId,
        /// Device-side estimate of elapsed ms since the controller epoch
        device_elapsed_ms: u32,
    },
}

impl DeviceRequest {
    /// Encoded size of a clock query
    pub const CLOCK_QUERY_SIZE: usize = 1;

    /// Encoded size of a registration request
    pub const REGISTER_SIZE: usize = 1;

    /// Encoded size of an answer: tag + id + elapsed
    pub const ANSWER_SIZE: usize = 9;

    /// Leading tag byte for this request.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Self::ClockQuery => TAG_CLOCK,
            Self::Register => TAG_REGISTER,
            Self::Answer { .. } => TAG_ANSWER,
        }
    }

    /// Encoded length of this request in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::ClockQuery => Self::CLOCK_QUERY_SIZE,
            Self::Register => Self::REGISTER_SIZE,
            Self::Answer { .. } => Self::ANSWER_SIZE,
        }
    }

    /// Encode the request as a device would send it.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.tag());
        if let Self::Answer { id, device_elapsed_ms } = *self {
            dst.put_u32(id);
            dst.put_u32(device_elapsed_ms);
        }
    }

    /// Decode one request from the front of `src`.
    ///
    /// Returns the request and the number of bytes it occupied, so callers
    /// can walk several requests that arrived in one read.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Empty` if `src` is empty
    /// - `ProtocolError::UnknownTag` if the leading byte is not a request tag
    /// - `ProtocolError::Truncated` if an answer is shorter than 9 bytes
    pub fn decode(src: &[u8]) -> Result<(Self, usize)> {
        let Some(&tag) = src.first() else {
            return Err(ProtocolError::Empty);
        };

        match tag {
            TAG_CLOCK => Ok((Self::ClockQuery, Self::CLOCK_QUERY_SIZE)),
            TAG_REGISTER => Ok((Self::Register, Self::REGISTER_SIZE)),
            TAG_ANSWER => {
                if src.len() < Self::ANSWER_SIZE {
                    return Err(ProtocolError::Truncated {
                        tag,
                        expected: Self::ANSWER_SIZE,
                        actual: src.len(),
                    });
                }

                let mut body = &src[1..Self::ANSWER_SIZE];
                let id = body.get_u32();
                let device_elapsed_ms = body.get_u32();

                Ok((Self::Answer { id, device_elapsed_ms }, Self::ANSWER_SIZE))
            },
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}
