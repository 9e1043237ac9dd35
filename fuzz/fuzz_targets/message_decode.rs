//! Fuzz target for ClientMessage::decode
//!
//! Feeds arbitrary text to the client message decoder. Decoding must never
//! panic, and anything that decodes must encode back to a frame that decodes
//! to the same message.

#![no_main]

use jobfair_proto::ClientMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = ClientMessage::decode(text) {
        let encoded = message.encode().expect("decoded message must encode");
        let decoded = ClientMessage::decode(&encoded).expect("encoded message must decode");
        assert_eq!(decoded, message);
    }
});
