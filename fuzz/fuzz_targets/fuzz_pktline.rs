//! Fuzz target for pkt-line parsing.
//!
//! Tests that the pkt-line reader handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use loam_git::{PktLine, PktLineReader};

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(data);

    // Every packet consumes at least four bytes, so this terminates.
    while let Ok(Some(pkt)) = reader.read() {
        if let PktLine::Data(payload) = &pkt {
            assert_eq!(pkt.encode().len(), payload.len() + 4);
        }
    }

    let _ = PktLineReader::new(data).read_lines();
});
