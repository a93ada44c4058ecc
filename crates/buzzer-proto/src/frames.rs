//! Splitting a received chunk into device requests.
//!
//! Devices send one request per write and the controller treats one read as
//! the unit of framing: a chunk may still carry several back-to-back
//! requests, which are decoded in order. The first malformed request ends
//! the walk and the rest of the chunk is dropped, since without a length
//! prefix there is no way to resynchronise inside it.

use crate::{errors::Result, request::DeviceRequest};

/// Iterator over the requests contained in one received chunk.
///
/// Yields `Ok` for every well-formed request and at most one `Err`, after
/// which it is exhausted.
#[derive(Debug, Clone)]
pub struct DeviceFrames<'a> {
    remaining: &'a [u8],
}

impl<'a> DeviceFrames<'a> {
    /// Walk the requests in `chunk`.
    #[must_use]
    pub fn new(chunk: &'a [u8]) -> Self {
        Self { remaining: chunk }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }
}

impl Iterator for DeviceFrames<'_> {
    type Item = Result<DeviceRequest>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        match DeviceRequest::decode(self.remaining) {
            Ok((request, used)) => {
                self.remaining = &self.remaining[used..];
                Some(Ok(request))
            },
            Err(e) => {
                self.remaining = &[];
                Some(Err(e))
            },
        }
    }
}
