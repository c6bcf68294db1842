use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::time::Duration;
use log::{debug, info};
use serialport::{SerialPort, SerialPortType};
use crate::line::LineReader;
use crate::{Link, LinkDriver, LinkError, LinkInput, LinkOutput, LinkResult};

/// Describes a serial port found on the system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortInfo {
    pub name: String,
    /// Human-readable details, such as the USB manufacturer and product, if known.
    pub description: Option<String>,
}

/// Lists the serial ports available on the system.
pub fn available_ports() -> LinkResult<Vec<PortInfo>> {
    let ports = serialport::available_ports()
        .map_err(|e| LinkError::Enumerate(e.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let mut parts = vec![format!("USB {:04x}:{:04x}", usb.vid, usb.pid)];
                    parts.extend(usb.manufacturer);
                    parts.extend(usb.product);
                    Some(parts.join(" "))
                }
                SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
                SerialPortType::PciPort => Some("PCI".to_string()),
                SerialPortType::Unknown => None,
            };
            PortInfo {
                name: port.port_name,
                description,
            }
        })
        .collect())
}

/// Opens serial ports with a fixed baud rate and read timeout.
#[derive(Debug, Clone)]
pub struct SerialDriver {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl SerialDriver {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            timeout: Duration::from_millis(100),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens the port as a concrete [SerialLink].
    pub fn open_serial(&self, port: &str) -> LinkResult<SerialLink> {
        info!("Opening {} at {} baud", port, self.baud_rate);
        let handle = serialport::new(port, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| LinkError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(SerialLink {
            name: port.to_string(),
            baud_rate: self.baud_rate,
            lines: LineReader::new(handle),
        })
    }
}

impl LinkDriver for SerialDriver {
    fn ports(&self) -> LinkResult<Vec<String>> {
        Ok(available_ports()?.into_iter().map(|p| p.name).collect())
    }

    fn open(&self, port: &str) -> LinkResult<Box<dyn Link>> {
        Ok(Box::new(self.open_serial(port)?))
    }
}

/// A [Link] over an open serial port.
///
/// The port is closed when the link is dropped.
pub struct SerialLink {
    name: String,
    baud_rate: u32,
    lines: LineReader<Box<dyn SerialPort>>,
}

impl SerialLink {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for SerialLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerialLink({} @ {})", self.name, self.baud_rate)
    }
}

impl LinkInput for SerialLink {
    fn read_line(&mut self) -> String {
        self.lines.read_line()
    }
}

impl LinkOutput for SerialLink {
    fn write_line(&mut self, line: &str) -> LinkResult<()> {
        debug!("{} <- {:?}", self.name, line);
        let port = self.lines.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()?;
        Ok(())
    }
}
