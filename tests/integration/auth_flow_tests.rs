//! Association workflow: configuration translation and the SSID commit.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bcmf::auth::{AuthParamRequest, EncodeExtRequest, ModeRequest, SsidRequest};
use bcmf::config::DriverConfig;
use bcmf::ioctl::{AES_ENABLED, EventType, Ioctl, TKIP_ENABLED, WPA_AUTH_PSK, iw, status};
use bcmf::transport::IoError;
use bcmf::{Device, Error};

use super::mock_transport::{Call, MockTransport, event};

fn device(auth_timeout_ms: u32) -> Arc<Device<Arc<MockTransport>>> {
    let cfg = DriverConfig { auth_timeout_ms, ..DriverConfig::default() };
    Arc::new(Device::new(Arc::new(MockTransport::new()), cfg).unwrap())
}

fn ioctl_data(dev: &Device<Arc<MockTransport>>, op: Ioctl) -> Vec<u8> {
    match dev.transport().find(&format!("ioctl:{}", op.code())) {
        Some(Call::Ioctl { data, .. }) => data,
        other => panic!("ioctl {op:?} not sent: {other:?}"),
    }
}

/// Deliver `frames` from another thread after `delay`.
fn deliver_later(dev: &Arc<Device<Arc<MockTransport>>>, delay: Duration, frames: Vec<Vec<u8>>) -> thread::JoinHandle<()> {
    let d = Arc::clone(dev);
    thread::spawn(move || {
        thread::sleep(delay);
        for f in frames {
            d.handle_event(&f);
        }
    })
}

#[test]
fn wpa_version_translates_before_sending() {
    let dev = device(1000);
    dev.set_auth_param(&AuthParamRequest {
        ifname: "wlan0",
        flags: iw::AUTH_WPA_VERSION,
        value: iw::AUTH_WPA_VERSION_WPA,
    })
    .unwrap();
    assert_eq!(ioctl_data(&dev, Ioctl::SetWpaAuth), WPA_AUTH_PSK.to_le_bytes());
    assert_eq!(dev.transport().count("iovar:bsscfg:sup_wpa"), 1);
}

#[test]
fn flags_outside_index_mask_are_ignored() {
    let dev = device(1000);
    dev.set_auth_param(&AuthParamRequest {
        ifname: "wlan0",
        flags: 0x7000 | iw::AUTH_CIPHER_GROUP,
        value: iw::AUTH_CIPHER_TKIP,
    })
    .unwrap();
    assert_eq!(ioctl_data(&dev, Ioctl::SetWsec), TKIP_ENABLED.to_le_bytes());
    assert_eq!(ioctl_data(&dev, Ioctl::SetAuth), 0u32.to_le_bytes());
}

#[test]
fn invalid_wpa_version_sends_nothing() {
    let dev = device(1000);
    let r = dev.set_auth_param(&AuthParamRequest {
        ifname: "wlan0",
        flags: iw::AUTH_WPA_VERSION,
        value: 0x40,
    });
    assert!(matches!(r, Err(Error::InvalidArgument(_))));
    assert!(dev.transport().keys().is_empty());
}

#[test]
fn io_failure_leaves_prior_steps_committed() {
    let dev = device(1000);
    dev.transport().fail_ioctl(Ioctl::SetAuth.code());
    let r = dev.set_auth_param(&AuthParamRequest {
        ifname: "wlan0",
        flags: iw::AUTH_CIPHER_PAIRWISE,
        value: iw::AUTH_CIPHER_CCMP,
    });
    assert_eq!(r, Err(Error::Io(IoError::BusFault)));
    assert_eq!(ioctl_data(&dev, Ioctl::SetWsec), AES_ENABLED.to_le_bytes());
}

#[test]
fn mode_and_key_requests() {
    let dev = device(1000);
    dev.set_mode(&ModeRequest { ifname: "wlan0", mode: iw::MODE_INFRA }).unwrap();
    assert_eq!(ioctl_data(&dev, Ioctl::SetInfra), 1u32.to_le_bytes());

    dev.set_encryption_key(&EncodeExtRequest { ifname: "wlan0", alg: iw::ENCODE_ALG_TKIP, key: b"hunter22" })
        .unwrap();
    let pmk = ioctl_data(&dev, Ioctl::SetWsecPmk);
    assert_eq!(pmk.len(), 68);
    assert_eq!(&pmk[4..12], b"hunter22");

    let too_long = [b'k'; 65];
    let r = dev.set_encryption_key(&EncodeExtRequest { ifname: "wlan0", alg: iw::ENCODE_ALG_CCMP, key: &too_long });
    assert!(matches!(r, Err(Error::InvalidArgument(_))));
}

#[test]
fn set_ssid_success() {
    let dev = device(2000);
    let t = deliver_later(
        &dev,
        Duration::from_millis(20),
        vec![event(EventType::Auth, 0), event(EventType::Link, 0), event(EventType::SetSsid, status::SUCCESS)],
    );
    dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"home" }).unwrap();
    t.join().unwrap();

    let data = ioctl_data(&dev, Ioctl::SetSsid);
    assert_eq!(data.len(), 36);
    assert_eq!(&data[0..4], &4u32.to_le_bytes());
    assert_eq!(&data[4..8], b"home");
    assert_eq!(dev.stats().auth_failures, 0);
}

#[test]
fn set_ssid_failure_carries_status_and_waits_for_signal() {
    let dev = device(2000);
    let delay = Duration::from_millis(50);
    let t = deliver_later(&dev, delay, vec![event(EventType::SetSsid, status::NO_NETWORKS)]);
    let started = Instant::now();
    let r = dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"nowhere" });
    assert!(started.elapsed() >= delay, "returned before the signal");
    t.join().unwrap();
    assert_eq!(r, Err(Error::AssociationFailed(status::NO_NETWORKS)));
    assert_eq!(dev.auth_status(), status::NO_NETWORKS);
    assert_eq!(dev.stats().auth_failures, 1);
}

#[test]
fn set_ssid_timeout_is_invalid_state() {
    let dev = device(40);
    let r = dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"silent" });
    assert!(matches!(r, Err(Error::InvalidState(_))));
}

#[test]
fn stale_join_signal_does_not_leak_into_next_attempt() {
    let dev = device(40);
    // A late SET_SSID from an earlier attempt arrives with nobody waiting.
    dev.handle_event(&event(EventType::SetSsid, status::SUCCESS));
    let r = dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"home" });
    assert!(matches!(r, Err(Error::InvalidState(_))), "stale post must be discarded");
}

#[test]
fn ssid_transport_failure_is_io() {
    let dev = device(1000);
    dev.transport().fail_ioctl(Ioctl::SetSsid.code());
    let r = dev.set_ssid(&SsidRequest { ifname: "wlan0", ssid: b"home" });
    assert_eq!(r, Err(Error::Io(IoError::BusFault)));
}
