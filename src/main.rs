//! bcmf-sim: host simulation of a FullMAC adapter bring-up.
//!
//! ```text
//! ┌──────────────┐ ioctl/iovar ┌──────────────┐ frames ┌────────────┐
//! │ Device<Sim>  │────────────▶│ SimFirmware  │───────▶│ EventQueue │
//! │              │◀────────────│              │        └─────┬──────┘
//! └──────▲───────┘             └──────────────┘              │
//!        │                   handle_event               ┌────▼──────┐
//!        └──────────────────────────────────────────────│ EventPump │
//!                                                       └───────────┘
//! ```
//!
//! Usage: `bcmf-sim [config.json] [ssid]`

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{LevelFilter, info, warn};

use bcmf::adapters::log_sink::StderrLogger;
use bcmf::adapters::sim::{SimFirmware, SimNetwork};
use bcmf::auth::{AuthParamRequest, EncodeExtRequest, ModeRequest, SsidRequest};
use bcmf::config::DriverConfig;
use bcmf::events::{EventPump, EventQueue};
use bcmf::ioctl::iw;
use bcmf::Device;

const IFNAME: &str = "wlan0";

fn load_config(path: Option<&str>) -> Result<DriverConfig> {
    let Some(path) = path else {
        return Ok(DriverConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    DriverConfig::from_json(&text).with_context(|| format!("parsing {path}"))
}

fn main() -> Result<()> {
    // ── 1. Logging + config ───────────────────────────────────
    StderrLogger::install(LevelFilter::Info).context("installing logger")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(args.first().map(String::as_str))?;
    let target = args.get(1).map_or("home", String::as_str).to_owned();

    // ── 2. Simulated firmware + event path ────────────────────
    let queue = Arc::new(EventQueue::new());
    let firmware = Arc::new(SimFirmware::new(Arc::clone(&queue)));
    firmware.add_network(SimNetwork::new("home", 6, -42));
    firmware.add_network(SimNetwork::new("office-5g", 36, -61));
    firmware.add_network(SimNetwork::new("cafe", 11, -78));

    let device = Arc::new(Device::new(Arc::clone(&firmware), config)?);
    let pump = EventPump::spawn(Arc::clone(&queue), device.event_sink())
        .context("spawning event pump")?;

    // ── 3. Bring-up ───────────────────────────────────────────
    let fw = device.initialize()?;
    info!("bcmf-sim: firmware {}", fw.version);
    let mac = device.read_mac_address()?;
    info!("bcmf-sim: netif {:?}", device.netif());
    device.set_mac_address(mac)?;
    device.enable(true)?;

    // ── 4. Scan ───────────────────────────────────────────────
    let wait = device.config().scan_timeout() * 2;
    let networks = device.scan(wait)?;
    for bss in &networks {
        println!(
            "{:<32} ch {:>3}  {:>4} dBm  {:02x?}",
            bss.ssid_str(),
            bss.channel(),
            bss.rssi,
            bss.bssid
        );
    }

    // ── 5. Join ───────────────────────────────────────────────
    device.set_mode(&ModeRequest { ifname: IFNAME, mode: iw::MODE_INFRA })?;
    device.set_auth_param(&AuthParamRequest {
        ifname: IFNAME,
        flags: iw::AUTH_WPA_VERSION,
        value: iw::AUTH_WPA_VERSION_WPA2,
    })?;
    device.set_auth_param(&AuthParamRequest {
        ifname: IFNAME,
        flags: iw::AUTH_CIPHER_PAIRWISE,
        value: iw::AUTH_CIPHER_CCMP,
    })?;
    device.set_encryption_key(&EncodeExtRequest {
        ifname: IFNAME,
        alg: iw::ENCODE_ALG_CCMP,
        key: b"correct horse battery staple",
    })?;
    match device.set_ssid(&SsidRequest { ifname: IFNAME, ssid: target.as_bytes() }) {
        Ok(()) => info!("bcmf-sim: associated with {target}"),
        Err(e) => warn!("bcmf-sim: association with {target} failed: {e}"),
    }

    // ── 6. Teardown ───────────────────────────────────────────
    device.enable(false)?;
    let delivered = pump.stop();
    let stats = device.stats();
    info!("bcmf-sim: {delivered} event(s) delivered");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
