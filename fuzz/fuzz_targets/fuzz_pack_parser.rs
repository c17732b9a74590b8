//! Fuzz target for pack file parsing.
//!
//! Tests that the pack parser handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use loam_storage::MemoryObjectStore;

fuzz_target!(|data: &[u8]| {
    // Create a fresh object store for each fuzz iteration
    let store = MemoryObjectStore::new();

    let mut parser = loam_git::PackParser::new(data);
    let _ = parser.parse(&store);
});
