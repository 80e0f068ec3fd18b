//! Scan workflow against the recording mock transport.
//!
//! The test thread plays both the caller and the event-delivery context;
//! the timer worker is the only other thread involved.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bcmf::config::DriverConfig;
use bcmf::ioctl::{EventType, Ioctl, status};
use bcmf::scan::ScanState;
use bcmf::{Device, Error};

use super::mock_transport::{Call, MockTransport, bss, escan_frame, event};

fn device(scan_timeout_ms: u32) -> Device<Arc<MockTransport>> {
    let cfg = DriverConfig { scan_timeout_ms, ..DriverConfig::default() };
    Device::new(Arc::new(MockTransport::new()), cfg).unwrap()
}

#[test]
fn zero_descriptor_success_completes_scan() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    assert_eq!(dev.transport().count("iovar:escan"), 1);
    assert_eq!(dev.is_scan_done(), Err(Error::Retry));

    dev.handle_event(&escan_frame(status::SUCCESS, &[]));

    assert_eq!(dev.is_scan_done(), Ok(()));
    assert!(!dev.has_pending_scan_request());
    assert_eq!(dev.scan_gate_permits(), 1, "gate must be free for the next start");
    dev.start_scan().expect("a new scan can start");
}

#[test]
fn passive_mode_command_precedes_escan() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    let keys = dev.transport().keys();
    let passive = format!("ioctl:{}", Ioctl::SetPassiveScan.code());
    assert_eq!(keys, [passive.as_str(), "iovar:escan"]);
    match dev.transport().find(&passive) {
        Some(Call::Ioctl { data, .. }) => assert_eq!(data, 0u32.to_le_bytes()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn escan_request_carries_sync_id_and_wildcards() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    let Some(Call::IovarUnsafe { data, .. }) = dev.transport().last() else {
        panic!("escan not issued through the zero-copy path");
    };
    assert_eq!(data.len(), 74);
    assert_eq!(&data[6..8], &0xabcdu16.to_le_bytes());
    assert!(data[44..50].iter().all(|&b| b == 0xff));
}

#[test]
fn partial_frames_accumulate_until_terminal() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    dev.handle_event(&escan_frame(status::PARTIAL, &[bss("home", 6, -40)]));
    dev.handle_event(&escan_frame(status::PARTIAL, &[bss("cafe", 11, -70), bss("lab", 1, -55)]));
    assert_eq!(dev.scan_state(), ScanState::Running);
    dev.handle_event(&escan_frame(status::SUCCESS, &[]));

    let names: Vec<String> = dev.scan_results().iter().map(|b| b.ssid_str().to_owned()).collect();
    assert_eq!(names, ["home", "cafe", "lab"]);
    assert_eq!(dev.last_scan_status(), Some(status::SUCCESS));
}

#[test]
fn second_start_while_running_is_busy() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    let before = dev.transport().keys().len();
    assert_eq!(dev.start_scan(), Err(Error::Busy));
    assert_eq!(dev.transport().keys().len(), before, "busy start must not send anything");
    assert_eq!(dev.scan_state(), ScanState::Running);
    assert!(dev.has_pending_scan_request());
}

#[test]
fn issue_failure_rolls_back_without_timer() {
    let dev = device(30);
    dev.transport().fail_iovar("escan");
    assert!(matches!(dev.start_scan(), Err(Error::Io(_))));
    assert_eq!(dev.scan_state(), ScanState::Disabled);
    assert!(!dev.has_pending_scan_request());
    assert_eq!(dev.scan_gate_permits(), 1);

    thread::sleep(Duration::from_millis(80));
    assert_eq!(dev.stats().scans_timed_out, 0, "no timer may be armed");

    dev.transport().clear_failures();
    dev.start_scan().unwrap();
}

#[test]
fn timeout_before_results_then_late_event_is_noop() {
    let dev = device(40);
    let attempt = dev.start_scan().unwrap();
    assert!(matches!(dev.wait_scan(attempt, Duration::from_secs(2)), Err(Error::InvalidState(_))));
    assert_eq!(dev.scan_state(), ScanState::TimedOut);
    assert!(!dev.has_pending_scan_request());
    assert_eq!(dev.scan_gate_permits(), 1);

    dev.handle_event(&escan_frame(status::SUCCESS, &[bss("late", 1, -30)]));
    assert_eq!(dev.scan_state(), ScanState::TimedOut);
    assert!(dev.scan_results().is_empty());

    let s = dev.stats();
    assert_eq!(s.scans_timed_out, 1);
    assert_eq!(s.scans_completed, 0);
    assert_eq!(s.stale_scan_events, 1);
}

#[test]
fn completion_cancels_timer() {
    let dev = device(40);
    dev.start_scan().unwrap();
    dev.handle_event(&escan_frame(status::SUCCESS, &[]));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(dev.scan_state(), ScanState::Done);
    assert_eq!(dev.stats().scans_timed_out, 0);
}

#[test]
fn malformed_record_length_leaves_attempt_running() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    let mut frame = escan_frame(status::SUCCESS, &[bss("x", 1, -1)]);
    // First BSS record's length field: header + envelope + 4.
    let off = 32 + 12 + 4;
    frame[off..off + 4].copy_from_slice(&4096u32.to_le_bytes());
    dev.handle_event(&frame);

    assert_eq!(dev.scan_state(), ScanState::Running);
    assert!(dev.has_pending_scan_request());
    assert_eq!(dev.stats().malformed_frames, 1);

    dev.handle_event(&escan_frame(status::SUCCESS, &[]));
    assert_eq!(dev.is_scan_done(), Ok(()));
}

#[test]
fn failure_status_is_terminal() {
    let dev = device(5000);
    dev.start_scan().unwrap();
    dev.handle_event(&escan_frame(status::ABORT, &[]));
    assert_eq!(dev.is_scan_done(), Ok(()));
    assert_eq!(dev.last_scan_status(), Some(status::ABORT));
}

#[test]
fn result_before_any_scan_is_ignored() {
    let dev = device(5000);
    dev.handle_event(&escan_frame(status::SUCCESS, &[bss("ghost", 1, -1)]));
    assert_eq!(dev.scan_state(), ScanState::Disabled);
    assert!(matches!(dev.is_scan_done(), Err(Error::InvalidState(_))));
    assert_eq!(dev.stats().stale_scan_events, 1);
}

#[test]
fn waiting_caller_wakes_on_result_from_other_thread() {
    let dev = Arc::new(device(5000));
    let attempt = dev.start_scan().unwrap();
    let d = Arc::clone(&dev);
    let events = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        d.handle_event(&event(EventType::Link, 0));
        d.handle_event(&escan_frame(status::SUCCESS, &[bss("home", 6, -40)]));
    });
    assert_eq!(dev.wait_scan(attempt, Duration::from_secs(2)), Ok(()));
    events.join().unwrap();
    assert_eq!(dev.scan_results().len(), 1);
}

#[test]
fn start_after_result_from_other_thread_reissues_escan() {
    let dev = Arc::new(device(5000));
    dev.start_scan().unwrap();
    let d = Arc::clone(&dev);
    let resolver = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        d.handle_event(&escan_frame(status::SUCCESS, &[]));
    });
    resolver.join().unwrap();
    dev.start_scan().unwrap();
    assert_eq!(dev.transport().count("iovar:escan"), 2);
}

#[test]
fn waiter_keeps_its_result_when_next_scan_starts_immediately() {
    let dev = Arc::new(device(5000));
    let first = dev.start_scan().unwrap();
    let d = Arc::clone(&dev);
    let waiter = thread::spawn(move || d.wait_scan(first, Duration::from_secs(2)));

    thread::sleep(Duration::from_millis(20));
    dev.handle_event(&escan_frame(status::SUCCESS, &[bss("home", 6, -40)]));
    let second = dev.start_scan().unwrap();

    assert_ne!(first, second);
    assert_eq!(waiter.join().unwrap(), Ok(()));
    assert_eq!(dev.scan_state(), ScanState::Running);
    assert_eq!(dev.transport().count("iovar:escan"), 2);
}
