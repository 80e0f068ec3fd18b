//! Fuzz target: `parse_escan`
//!
//! Drives arbitrary payloads into the escan result parser and asserts it
//! never panics and never yields more records than the envelope declares.
//!
//! cargo fuzz run fuzz_escan_parser

#![no_main]

use bcmf::frame::{BSS_INFO_FIXED_LEN, ESCAN_FIXED_LEN, parse_escan};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(result) = parse_escan(data) {
        if data.len() > ESCAN_FIXED_LEN {
            let declared = u16::from_le_bytes([data[10], data[11]]) as usize;
            assert!(result.records.len() <= declared, "walked past bss_count");
            assert!(
                result.records.len() * BSS_INFO_FIXED_LEN <= data.len() - ESCAN_FIXED_LEN,
                "records exceed payload"
            );
        } else {
            assert!(result.records.is_empty());
        }
        for r in &result.records {
            assert!(r.ssid.len() <= 32);
        }
    }
});
