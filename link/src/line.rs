use std::fmt::{Debug, Formatter};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use log::{debug, warn};

/// Longest line kept while waiting for its newline. Longer runs are dropped.
pub const MAX_LINE: usize = 1024;

/// Assembles newline-terminated lines from a reader that may time out mid-line.
///
/// Bytes read before a timeout are kept, so a line split across several reads is still
/// returned whole once its newline arrives.
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Reads the next complete line, including its newline.
    ///
    /// Returns an empty string when no complete line is available yet, when the read fails,
    /// or when the line is not valid UTF-8. Gives up once more than [MAX_LINE] bytes arrived
    /// without a newline.
    pub fn read_line(&mut self) -> String {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    return String::new();
                }
                Err(e) => {
                    warn!("Failed to read from link: {}", e);
                    return String::new();
                }
            };
            if available.is_empty() {
                return String::new();
            }

            let (used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(newline) => (newline + 1, true),
                None => (available.len(), false),
            };
            self.pending.extend_from_slice(&available[..used]);
            self.reader.consume(used);

            if complete {
                break;
            }
            if self.pending.len() > MAX_LINE {
                debug!("Dropping {} bytes without a newline", self.pending.len());
                self.pending.clear();
                return String::new();
            }
        }

        let bytes = std::mem::take(&mut self.pending);
        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                debug!("Dropping undecodable line: {:?}", e.as_bytes());
                String::new()
            }
        }
    }
}

impl<R: Debug> Debug for LineReader<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}(+{} pending)", self.reader.get_ref(), self.pending.len())
    }
}
