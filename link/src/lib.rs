pub mod line;
pub mod memory;
pub mod serial;

use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LinkError {
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),
    #[error("failed to open {port}: {reason}")]
    Open {
        port: String,
        reason: String,
    },
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.kind())
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

/// A command sent to the device, one per line.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    /// Move to the given planar coordinate, in centimetres.
    Target { x: f64, y: f64 },
    /// Return to the rest position.
    Home,
}

impl Command {
    /// Gets the wire form of the command, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Target { x, y } => write!(f, "X:{:.2},Y:{:.2}", x, y),
            Command::Home => write!(f, "Home"),
        }
    }
}

/// A signal received from the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Signal {
    /// The device finished with the current target and asks for the next one.
    Next,
}

impl Signal {
    /// Recognizes a signal in a raw inbound line.
    ///
    /// The match is exact, trailing newline included. Anything else is not a signal.
    pub fn from_line(line: &str) -> Option<Signal> {
        match line {
            "NEXT\n" => Some(Signal::Next),
            _ => None,
        }
    }
}

pub trait LinkInput: Debug {
    /// Reads one line from the device, including its newline.
    ///
    /// Never fails: a timeout, a read error or undecodable data yields an empty string.
    fn read_line(&mut self) -> String;

    /// Reads one line and recognizes it as a [Signal], if it is one.
    fn read_signal(&mut self) -> Option<Signal> {
        Signal::from_line(&self.read_line())
    }
}

pub trait LinkOutput: Debug {
    /// Writes a raw line to the device. The line should already end with a newline.
    fn write_line(&mut self, line: &str) -> LinkResult<()>;

    /// Sends a [Command] to the device without waiting for any acknowledgement.
    fn send(&mut self, command: &Command) -> LinkResult<()> {
        self.write_line(&command.to_line())
    }
}

/// A bidirectional line-oriented connection to the device.
pub trait Link: LinkInput + LinkOutput {}

impl<T: LinkInput + LinkOutput + ?Sized> Link for T {}

pub trait LinkDriver: Debug {
    /// Gets the names of the ports this driver can currently open.
    fn ports(&self) -> LinkResult<Vec<String>>;

    /// Opens the port with the given name.
    fn open(&self, port: &str) -> LinkResult<Box<dyn Link>>;
}
