//! Fuzz target for device request framing
//!
//! Feeds arbitrary chunks through `DeviceFrames` to find:
//! - Parser panics on short or garbage input
//! - Consumed lengths that disagree with the encoded size
//! - Requests that do not re-encode to the bytes they came from
//!
//! The fuzzer should NEVER panic. Invalid input ends the walk with one error.

#![no_main]

use buzzer_proto::{DeviceFrames, DeviceRequest};
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut frames = DeviceFrames::new(data);
    let mut offset = 0;

    while let Some(result) = frames.next() {
        let Ok(request) = result else {
            assert!(frames.next().is_none(), "frames continued after an error");
            break;
        };

        let len = request.encoded_len();
        let mut encoded = BytesMut::with_capacity(len);
        request.encode(&mut encoded);
        assert_eq!(&encoded[..], &data[offset..offset + len]);

        let (decoded, consumed) = DeviceRequest::decode(&data[offset..]).expect("decoded once");
        assert_eq!(decoded, request);
        assert_eq!(consumed, len);

        offset += len;
        assert_eq!(frames.remaining(), &data[offset..]);
    }
});
