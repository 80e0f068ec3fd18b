//! Fuzz target: `Device::handle_event` during a running scan
//!
//! Feeds arbitrary frames through the full dispatcher while an escan
//! attempt is in flight, then checks the scan invariants still hold.
//!
//! cargo fuzz run fuzz_event_dispatch

#![no_main]

use bcmf::Device;
use bcmf::config::DriverConfig;
use bcmf::scan::ScanState;
use bcmf::transport::NullTransport;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(dev) = Device::new(NullTransport, DriverConfig::default()) else {
        return;
    };
    if dev.start_scan().is_err() {
        return;
    }

    for chunk in data.split(|&b| b == 0xA5) {
        let _ = dev.handle_event(chunk);
    }

    let running = dev.scan_state() == ScanState::Running;
    assert_eq!(dev.has_pending_scan_request(), running);
    assert_eq!(dev.scan_gate_permits(), u32::from(!running));
});
