//! Buzzer device wire protocol.
//!
//! Buzzer devices hold one persistent stream connection to the controller and
//! exchange small fixed-layout binary frames over it. There is no length
//! prefix: the leading tag byte determines how long a request is.
//!
//! # Layout
//!
//! ```text
//! Clock query   [0x00]                         -> [elapsed_ms: u32]
//! Register      [0x01]                         -> [0x01][id: u32]   (or nothing)
//! Answer        [0x03][id: u32][elapsed: u32]  -> [0x03][code: u8]
//! ```
//!
//! All integers are big-endian and fixed width. Anything else is dropped by
//! the receiver without a reply.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frames;
pub mod reply;
pub mod request;

pub use errors::{ProtocolError, Result};
pub use frames::DeviceFrames;
pub use reply::{AnswerCode, DeviceReply};
pub use request::DeviceRequest;

/// Participant identifier as carried on the wire.
pub type ParticipantId = u32;

/// Leading tag of a clock query request.
pub const TAG_CLOCK: u8 = 0x00;

/// Leading tag of a registration request and its reply.
pub const TAG_REGISTER: u8 = 0x01;

/// Leading tag of an answer request and its reply.
pub const TAG_ANSWER: u8 = 0x03;
