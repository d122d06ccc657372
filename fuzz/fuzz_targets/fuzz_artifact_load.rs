#![no_main]
use libfuzzer_sys::fuzz_target;
use ipregion::Index;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected or searched without panicking
    if let Ok(index) = Index::from_bytes(data.to_vec()) {
        let _ = index.verify();
        for segment in index.segments() {
            let Ok(segment) = segment else { break };
            let _ = index.lookup_addr(&segment.start);
            let _ = index.lookup_addr(&segment.end);
        }
        let _ = index.lookup("1.2.3.4");
        let _ = index.lookup("2001:db8::1");
    }
});
