use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use log::info;
use crate::{Link, LinkDriver, LinkError, LinkInput, LinkOutput, LinkResult};

#[derive(Default)]
struct MemoryState {
    written: Vec<String>,
    inbound: VecDeque<String>,
    fail_writes: bool,
}

/// An in-memory [Link] that records written lines and replays queued inbound lines.
///
/// Clones share the same state, so a test can keep one handle while the code under test
/// owns another.
#[derive(Clone, Default)]
pub struct MemoryLink {
    state: Rc<RefCell<MemoryState>>,
    echo: bool,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the link log every written line at info level.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Queues a line to be returned by a later read. The line should include its newline.
    pub fn push_inbound(&self, line: &str) {
        self.state.borrow_mut().inbound.push_back(line.to_string());
    }

    /// Gets all lines written so far.
    pub fn written(&self) -> Vec<String> {
        self.state.borrow().written.clone()
    }

    /// Removes and returns all lines written so far.
    pub fn take_written(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().written)
    }

    /// Makes every following write fail with a broken pipe.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl Debug for MemoryLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        write!(f, "MemoryLink({} written, {} inbound)", state.written.len(), state.inbound.len())
    }
}

impl LinkInput for MemoryLink {
    fn read_line(&mut self) -> String {
        self.state.borrow_mut().inbound.pop_front().unwrap_or_default()
    }
}

impl LinkOutput for MemoryLink {
    fn write_line(&mut self, line: &str) -> LinkResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(LinkError::Io(std::io::ErrorKind::BrokenPipe));
        }
        if self.echo {
            info!("Simulated device <- {}", line.trim_end());
        }
        state.written.push(line.to_string());
        Ok(())
    }
}

/// A [LinkDriver] handing out clones of one [MemoryLink] under a fixed set of port names.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    ports: Vec<String>,
    unavailable: Vec<String>,
    link: MemoryLink,
}

impl MemoryDriver {
    pub fn new(ports: &[&str], link: MemoryLink) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            unavailable: Vec::new(),
            link,
        }
    }

    /// Makes opening the given port fail, as if it were busy.
    pub fn with_unavailable(mut self, port: &str) -> Self {
        self.unavailable.push(port.to_string());
        self
    }
}

impl LinkDriver for MemoryDriver {
    fn ports(&self) -> LinkResult<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn open(&self, port: &str) -> LinkResult<Box<dyn Link>> {
        if !self.ports.iter().any(|p| p == port) {
            return Err(LinkError::Open {
                port: port.to_string(),
                reason: "no such port".to_string(),
            });
        }
        if self.unavailable.iter().any(|p| p == port) {
            return Err(LinkError::Open {
                port: port.to_string(),
                reason: "port is busy".to_string(),
            });
        }
        Ok(Box::new(self.link.clone()))
    }
}
