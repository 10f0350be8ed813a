#![no_main]

use libfuzzer_sys::fuzz_target;
use memload::record::parse_record;
use memload::router::shard_index;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // Rejections are fine; we only care about panics.
        if let Ok(record) = parse_record(line) {
            let id = record.normalized_id();
            assert!(shard_index(&id, 4) < 4);
            let _ = record.encode_value();
        }
    }
});
