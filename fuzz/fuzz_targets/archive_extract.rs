//! Fuzz target for decoding every folder of an arbitrary archive.
//!
//! Limits keep a single input from allocating large folder buffers.
//!
//! Run with: cargo +nightly fuzz run archive_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use sevenz_decode::read::MemorySink;
use sevenz_decode::{Archive, ExtractOptions, ResourceLimits, Selection};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let limits = ResourceLimits::default()
        .max_entries(1_000)
        .max_header_bytes(1 << 20)
        .max_folder_unpacked(16 << 20)
        .max_total_unpacked(64 << 20);
    let Ok(archive) = Archive::open_with_limits(Cursor::new(data), limits) else {
        return;
    };

    let mut sink = MemorySink::new();
    if let Ok(result) = archive.extract(&Selection::All, &mut sink, &ExtractOptions::default()) {
        assert_eq!(result.entries.len(), archive.len());
        assert!(sink.len() <= archive.len());
    }
});
