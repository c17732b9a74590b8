//! Fuzz target for reference advertisements.
//!
//! Tests advertisement decoding, capability parsing and endpoint
//! normalization on arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use loam_git::{Capabilities, Endpoint, UploadPackInfo};

fuzz_target!(|data: &[u8]| {
    if let Ok(info) = UploadPackInfo::decode(data) {
        let _ = info.head();
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let caps = Capabilities::parse(text);
        let _ = caps.symbolic_reference("HEAD");

        if let Ok(endpoint) = Endpoint::new(text) {
            assert!(endpoint.as_str().ends_with(".git"));
        }
    }
});
