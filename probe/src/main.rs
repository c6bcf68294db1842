use std::env::var;
use std::thread::sleep;
use std::time::{Duration, Instant};
use dotenv::dotenv;
use log::{info, warn};
use sysinfo::System;
use time::OffsetDateTime;
use fetcher_link::{Command, LinkInput, LinkOutput, Signal};
use fetcher_link::serial::{available_ports, SerialDriver};

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    let ports = available_ports()?;
    if ports.is_empty() {
        warn!("No serial ports found.");
    }
    for port in &ports {
        info!(
            "Port {} ({})",
            port.name,
            port.description.as_deref().unwrap_or(UNKNOWN_STR)
        );
    }

    let Ok(port_name) = var("FETCHER_PROBE_PORT") else {
        info!("Set FETCHER_PROBE_PORT to talk to a device.");
        return Ok(());
    };
    let baud_rate: u32 = var("FETCHER_BAUD_RATE").map_or(Ok(115200), |b| b.parse())?;
    let seconds: u64 = var("FETCHER_PROBE_SECONDS").map_or(Ok(10), |s| s.parse())?;

    let mut link = SerialDriver::new(baud_rate).open_serial(&port_name)?;
    info!("{:?} opened.", link);

    link.send(&Command::Home)?;
    info!("Sent {}, listening for {} s...", Command::Home, seconds);

    let started = Instant::now();
    let mut lines = 0;
    let mut signals = 0;
    while started.elapsed() < Duration::from_secs(seconds) {
        let line = link.read_line();
        if line.is_empty() {
            sleep(Duration::from_millis(10));
            continue;
        }

        lines += 1;
        let at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        match Signal::from_line(&line) {
            Some(signal) => {
                signals += 1;
                info!("[{}] {} -> {:?}", at.time(), link.name(), signal);
                link.send(&Command::Home)?;
            }
            None => info!("[{}] {} -> {:?}", at.time(), link.name(), line),
        }
    }

    info!("Received {} line(s), {} signal(s).", lines, signals);

    Ok(())
}
