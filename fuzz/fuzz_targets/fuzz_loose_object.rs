//! Fuzz target for loose object decoding.
//!
//! Feeds arbitrary bytes to the object reader as if they were the contents
//! of a loose object file.

#![no_main]

use libfuzzer_sys::fuzz_target;
use loam_storage::ObjectReader;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let Ok(mut reader) = ObjectReader::new(data) else {
        return;
    };

    // The declared size is untrusted, so read in bounded chunks.
    let mut buf = [0u8; 4096];
    let mut total = 0u64;
    while let Ok(n) = reader.read(&mut buf) {
        if n == 0 {
            break;
        }
        total += n as u64;
        assert!(total <= reader.size());
    }
});
