#![no_main]
use libfuzzer_sys::fuzz_target;
use ipregion::source::SourceReader;

fuzz_target!(|data: &[u8]| {
    // Malformed source text must surface as errors, never panics
    for segment in SourceReader::new(data).flatten() {
        let _ = segment.split(2);
    }
});
