//! End-to-end flows through the simulated firmware and the event pump.

use std::sync::Arc;
use std::time::Duration;

use bcmf::adapters::sim::{SimFirmware, SimNetwork};
use bcmf::auth::SsidRequest;
use bcmf::config::DriverConfig;
use bcmf::events::{EventPump, EventQueue};
use bcmf::ioctl::status;
use bcmf::scan::ScanState;
use bcmf::{Device, Error};

struct Rig {
    fw: Arc<SimFirmware>,
    dev: Arc<Device<Arc<SimFirmware>>>,
    pump: Option<EventPump>,
}

impl Rig {
    fn new(cfg: DriverConfig) -> Self {
        let queue = Arc::new(EventQueue::new());
        let fw = Arc::new(SimFirmware::new(Arc::clone(&queue)));
        fw.add_network(SimNetwork::new("home", 6, -42));
        fw.add_network(SimNetwork::new("cafe", 11, -77));
        let dev = Arc::new(Device::new(Arc::clone(&fw), cfg).unwrap());
        let pump = EventPump::spawn(queue, dev.event_sink()).unwrap();
        Self { fw, dev, pump: Some(pump) }
    }

    fn stop(&mut self) -> usize {
        self.pump.take().map_or(0, EventPump::stop)
    }
}

fn fast() -> DriverConfig {
    DriverConfig {
        scan_timeout_ms: 100,
        auth_timeout_ms: 200,
        ..DriverConfig::default()
    }
}

#[test]
fn bringup_scan_and_join() {
    let mut rig = Rig::new(DriverConfig::default());
    let info = rig.dev.initialize().unwrap();
    assert!(info.version.starts_with("wl0:"));
    rig.dev.enable(true).unwrap();
    assert!(rig.fw.is_up());

    let found = rig.dev.scan(Duration::from_secs(2)).unwrap();
    let mut names: Vec<_> = found.iter().map(|b| b.ssid_str().to_owned()).collect();
    names.sort();
    assert_eq!(names, ["cafe", "home"]);
    assert!(!rig.dev.has_pending_scan_request());

    rig.dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"home" }).unwrap();

    let delivered = rig.stop();
    assert!(delivered >= 5, "3 escan frames plus join events, got {delivered}");
    let s = rig.dev.stats();
    assert_eq!(s.scans_completed, 1);
    assert_eq!(s.auth_attempts, 1);
    assert_eq!(s.auth_failures, 0);
}

#[test]
fn join_unknown_network_fails_with_status() {
    let rig = Rig::new(fast());
    let r = rig.dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"elsewhere" });
    assert_eq!(r, Err(Error::AssociationFailed(status::NO_NETWORKS)));
}

#[test]
fn silent_firmware_times_out_scan() {
    let rig = Rig::new(fast());
    rig.fw.set_scan_response(false);
    let r = rig.dev.scan(Duration::from_secs(2));
    assert!(matches!(r, Err(Error::InvalidState(_))));
    assert_eq!(rig.dev.scan_state(), ScanState::TimedOut);
    assert_eq!(rig.dev.stats().scans_timed_out, 1);

    rig.fw.set_scan_response(true);
    assert_eq!(rig.dev.scan(Duration::from_secs(2)).unwrap().len(), 2);
}

#[test]
fn silent_firmware_times_out_join() {
    let rig = Rig::new(fast());
    rig.fw.set_join_response(false);
    let r = rig.dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"home" });
    assert!(matches!(r, Err(Error::InvalidState(_))));
}

#[test]
fn repeated_scans_reset_results() {
    let rig = Rig::new(fast());
    for _ in 0..3 {
        assert_eq!(rig.dev.scan(Duration::from_secs(2)).unwrap().len(), 2);
    }
    assert_eq!(rig.dev.stats().scans_started, 3);
}
