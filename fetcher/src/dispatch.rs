//! The queue of pending targets and the state machine sending them to the device.

use std::fmt::{Display, Formatter};
use log::{debug, info};
use fetcher_link::{Command, Link, LinkOutput, LinkResult, Signal};
use crate::parser::{parse_locations, LocationKey};
use crate::table::{LocationRecord, LocationTable};
use crate::utils::WithinExt;

/// A resolved location waiting to be sent to the device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Target {
    pub key: LocationKey,
    pub x: f64,
    pub y: f64,
}

impl Target {
    /// The canonical label shown to the user, e.g. `L01-R02-C03`.
    pub fn label(&self) -> String {
        self.key.to_string()
    }

    pub fn command(&self) -> Command {
        Command::Target { x: self.x, y: self.y }
    }
}

impl From<&LocationRecord> for Target {
    fn from(record: &LocationRecord) -> Self {
        Target {
            key: record.key,
            x: record.x,
            y: record.y,
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2}, {:.2})", self.key, self.x, self.y)
    }
}

/// What the device was last told to do.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DispatchState {
    /// The device was sent home, or nothing was sent yet.
    #[default]
    Homed,
    /// The device was sent the target at the cursor and has not advanced past it.
    Targeting,
}

/// Owns the target queue and decides what to send to the device.
///
/// Every dispatch goes through the given [LinkOutput]. Writes are fire-and-forget: the state
/// changes even if the write fails, and the error is returned for the caller to report.
#[derive(Debug, Default)]
pub struct Dispatcher {
    queue: Vec<Target>,
    cursor: usize,
    state: DispatchState,
    last_command: Option<Command>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &[Target] {
        &self.queue
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Gets the cursor, or `None` when the queue is empty.
    pub fn cursor(&self) -> Option<usize> {
        if self.queue.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    /// Gets the target at the cursor.
    pub fn current(&self) -> Option<&Target> {
        self.queue.get(self.cursor)
    }

    /// Gets the index of the target the device is heading to, if any.
    pub fn highlighted(&self) -> Option<usize> {
        match self.state {
            DispatchState::Targeting => self.cursor(),
            DispatchState::Homed => None,
        }
    }

    pub fn last_command(&self) -> Option<&Command> {
        self.last_command.as_ref()
    }

    /// Appends targets not queued yet, keeping their order. Returns how many were added.
    pub fn enqueue(&mut self, targets: impl IntoIterator<Item = Target>) -> usize {
        let before = self.queue.len();
        for target in targets {
            if !self.queue.contains(&target) {
                debug!("Queued {}", target);
                self.queue.push(target);
            }
        }
        self.queue.len() - before
    }

    /// Parses `text`, resolves every location code in the table and queues the results.
    ///
    /// Codes missing from the table are skipped. If the queue was empty, the new head is sent
    /// right away. Returns how many targets were added.
    pub fn search<L: LinkOutput + ?Sized>(
        &mut self,
        text: &str,
        table: &LocationTable,
        out: &mut L,
    ) -> LinkResult<usize> {
        let was_empty = self.queue.is_empty();
        let targets: Vec<Target> = parse_locations(text)
            .iter()
            .filter_map(|key| table.lookup(key))
            .map(Target::from)
            .collect();
        let added = self.enqueue(targets);

        if added > 0 {
            info!("Queued {} location(s), {} pending.", added, self.queue.len());
        }
        if was_empty && added > 0 {
            self.cursor = 0;
            self.send_current(out)?;
        }
        Ok(added)
    }

    /// Moves on to the next target.
    ///
    /// When homed, this resumes by re-sending the current target instead of consuming it.
    /// When targeting, the current target is done and is removed from the queue.
    pub fn advance<L: LinkOutput + ?Sized>(&mut self, out: &mut L) -> LinkResult<()> {
        if self.queue.is_empty() {
            self.cursor = 0;
            return self.send_home(out);
        }

        match self.state {
            DispatchState::Homed => {
                info!("Resuming at {}.", self.queue[self.cursor].key);
                self.send_current(out)
            }
            DispatchState::Targeting => {
                let done = self.queue.remove(self.cursor);
                info!("Done with {}, {} pending.", done.key, self.queue.len());
                if self.queue.is_empty() {
                    self.cursor = 0;
                    self.send_home(out)
                } else {
                    self.cursor = self.cursor.min(self.queue.len() - 1);
                    self.send_current(out)
                }
            }
        }
    }

    /// Sends the device home. The queue and cursor are kept.
    pub fn home<L: LinkOutput + ?Sized>(&mut self, out: &mut L) -> LinkResult<()> {
        info!("Homing.");
        self.send_home(out)
    }

    /// Moves the cursor to `index`. Returns `false` if there is no target there.
    pub fn select(&mut self, index: usize) -> bool {
        if !index.within(0..self.queue.len()) {
            return false;
        }
        self.cursor = index;
        true
    }

    /// Sends whatever the device should be doing now again, without changing the queue.
    pub fn resend<L: LinkOutput + ?Sized>(&mut self, out: &mut L) -> LinkResult<()> {
        match self.state {
            DispatchState::Targeting if !self.queue.is_empty() => self.send_current(out),
            _ => self.send_home(out),
        }
    }

    /// Runs one periodic step: checks the link for a `NEXT` signal, advancing if there is one,
    /// then re-sends the current state as a keep-alive.
    ///
    /// The re-send happens even if advancing failed to write. The first error is returned.
    pub fn tick<L: Link + ?Sized>(&mut self, link: &mut L) -> LinkResult<()> {
        let advanced = if link.read_signal() == Some(Signal::Next) {
            info!("Device asked for the next location.");
            self.advance(link)
        } else {
            Ok(())
        };
        let resent = self.resend(link);
        advanced.and(resent)
    }

    /// Empties the queue without sending anything.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.cursor = 0;
        self.state = DispatchState::Homed;
    }

    fn send_current<L: LinkOutput + ?Sized>(&mut self, out: &mut L) -> LinkResult<()> {
        self.state = DispatchState::Targeting;
        let command = self.queue[self.cursor].command();
        self.dispatch(command, out)
    }

    fn send_home<L: LinkOutput + ?Sized>(&mut self, out: &mut L) -> LinkResult<()> {
        self.state = DispatchState::Homed;
        self.dispatch(Command::Home, out)
    }

    fn dispatch<L: LinkOutput + ?Sized>(&mut self, command: Command, out: &mut L) -> LinkResult<()> {
        debug!("Sending to device: {}", command);
        self.last_command = Some(command);
        out.send(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetcher_link::memory::MemoryLink;
    use fetcher_link::{LinkError, LinkInput};
    use crate::table::RawTable;

    fn table() -> LocationTable {
        let csv = "L,R,C,X_CM,Y_CM\n\
                   1,1,1,10,20\n\
                   1,1,2,11,21\n\
                   1,1,3,12.5,22.25\n";
        LocationTable::from_raw(&RawTable::from_csv(csv.as_bytes()).unwrap()).unwrap()
    }

    fn labels(dispatcher: &Dispatcher) -> Vec<String> {
        dispatcher.queue().iter().map(Target::label).collect()
    }

    fn assert_cursor_valid(dispatcher: &Dispatcher) {
        if let Some(cursor) = dispatcher.cursor() {
            assert!(cursor < dispatcher.queue().len());
        }
    }

    #[test]
    fn search_on_empty_queue_sends_head() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        let added = dispatcher.search("L1R1C1 L1R1C2", &table, &mut link).unwrap();

        assert_eq!(added, 2);
        assert_eq!(labels(&dispatcher), vec!["L01-R01-C01", "L01-R01-C02"]);
        assert_eq!(dispatcher.state(), DispatchState::Targeting);
        assert_eq!(dispatcher.highlighted(), Some(0));
        assert_eq!(link.written(), vec!["X:10.00,Y:20.00\n"]);
    }

    #[test]
    fn search_on_busy_queue_only_appends() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1", &table, &mut link).unwrap();
        link.take_written();

        let added = dispatcher.search("L1R1C3", &table, &mut link).unwrap();

        assert_eq!(added, 1);
        assert_eq!(dispatcher.queue().len(), 2);
        assert!(link.written().is_empty());
    }

    #[test]
    fn search_deduplicates() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        dispatcher.search("L1R1C1", &table, &mut link).unwrap();
        let added = dispatcher.search("L01-R01-C01", &table, &mut link).unwrap();

        assert_eq!(added, 0);
        assert_eq!(dispatcher.queue().len(), 1);
    }

    #[test]
    fn search_skips_unknown_and_unparseable_codes() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        assert_eq!(dispatcher.search("L9R9C9", &table, &mut link).unwrap(), 0);
        assert_eq!(dispatcher.search("nothing here", &table, &mut link).unwrap(), 0);
        assert!(dispatcher.queue().is_empty());
        assert!(link.written().is_empty());
        assert_eq!(dispatcher.state(), DispatchState::Homed);
    }

    #[test]
    fn queued_targets_match_table_rows() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        dispatcher.search("L1R1C3 L1R1C1 L1R1C9", &table, &mut link).unwrap();

        for target in dispatcher.queue() {
            let record = table.lookup(&target.key).unwrap();
            assert_eq!(Target::from(record), *target);
        }
    }

    #[test]
    fn advance_on_empty_queue_sends_home() {
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        dispatcher.advance(&mut link).unwrap();
        dispatcher.advance(&mut link).unwrap();

        assert_eq!(link.written(), vec!["Home\n", "Home\n"]);
        assert_eq!(dispatcher.state(), DispatchState::Homed);
        assert_eq!(dispatcher.cursor(), None);
    }

    #[test]
    fn advance_while_targeting_removes_head() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2", &table, &mut link).unwrap();
        link.take_written();

        dispatcher.advance(&mut link).unwrap();
        assert_eq!(labels(&dispatcher), vec!["L01-R01-C02"]);
        assert_eq!(dispatcher.state(), DispatchState::Targeting);

        dispatcher.advance(&mut link).unwrap();
        assert!(dispatcher.queue().is_empty());
        assert_eq!(dispatcher.state(), DispatchState::Homed);

        assert_eq!(link.written(), vec!["X:11.00,Y:21.00\n", "Home\n"]);
    }

    #[test]
    fn advance_while_homed_resumes_without_removing() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2", &table, &mut link).unwrap();
        dispatcher.home(&mut link).unwrap();
        assert_eq!(dispatcher.highlighted(), None);
        link.take_written();

        dispatcher.advance(&mut link).unwrap();

        assert_eq!(dispatcher.queue().len(), 2);
        assert_eq!(dispatcher.state(), DispatchState::Targeting);
        assert_eq!(link.written(), vec!["X:10.00,Y:20.00\n"]);
    }

    #[test]
    fn removing_last_row_clamps_cursor() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2 L1R1C3", &table, &mut link).unwrap();
        assert!(dispatcher.select(2));
        link.take_written();

        dispatcher.advance(&mut link).unwrap();

        assert_eq!(dispatcher.cursor(), Some(1));
        assert_cursor_valid(&dispatcher);
        assert_eq!(link.written(), vec!["X:11.00,Y:21.00\n"]);
    }

    #[test]
    fn select_rejects_out_of_range() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        assert!(!dispatcher.select(0));

        dispatcher.search("L1R1C1", &table, &mut link).unwrap();
        assert!(!dispatcher.select(1));
        assert_eq!(dispatcher.cursor(), Some(0));
    }

    #[test]
    fn tick_without_signal_resends_current_state() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        dispatcher.tick(&mut link).unwrap();
        assert_eq!(link.take_written(), vec!["Home\n"]);

        dispatcher.search("L1R1C3", &table, &mut link).unwrap();
        link.take_written();
        dispatcher.tick(&mut link).unwrap();
        dispatcher.tick(&mut link).unwrap();

        assert_eq!(link.written(), vec!["X:12.50,Y:22.25\n", "X:12.50,Y:22.25\n"]);
        assert_eq!(dispatcher.queue().len(), 1);
    }

    #[test]
    fn tick_with_next_signal_advances() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2", &table, &mut link).unwrap();
        link.take_written();

        link.push_inbound("NEXT\n");
        dispatcher.tick(&mut link).unwrap();

        assert_eq!(labels(&dispatcher), vec!["L01-R01-C02"]);
        assert_eq!(link.written(), vec!["X:11.00,Y:21.00\n", "X:11.00,Y:21.00\n"]);
    }

    /// Fails the first `failures` writes, then behaves like the wrapped link.
    #[derive(Debug)]
    struct Flaky {
        inner: MemoryLink,
        failures: usize,
    }

    impl LinkInput for Flaky {
        fn read_line(&mut self) -> String {
            self.inner.read_line()
        }
    }

    impl LinkOutput for Flaky {
        fn write_line(&mut self, line: &str) -> LinkResult<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(LinkError::Io(std::io::ErrorKind::TimedOut));
            }
            self.inner.write_line(line)
        }
    }

    #[test]
    fn tick_resends_after_failed_advance() {
        let table = table();
        let inner = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2", &table, &mut inner.clone()).unwrap();
        inner.take_written();
        inner.push_inbound("NEXT\n");

        let mut link = Flaky { inner: inner.clone(), failures: 1 };
        let err = dispatcher.tick(&mut link).unwrap_err();

        assert_eq!(err, LinkError::Io(std::io::ErrorKind::TimedOut));
        assert_eq!(labels(&dispatcher), vec!["L01-R01-C02"]);
        assert_eq!(inner.written(), vec!["X:11.00,Y:21.00\n"]);
    }

    #[test]
    fn tick_ignores_other_lines() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1", &table, &mut link).unwrap();

        link.push_inbound("NEXT");
        link.push_inbound("ready\n");
        dispatcher.tick(&mut link).unwrap();
        dispatcher.tick(&mut link).unwrap();

        assert_eq!(dispatcher.queue().len(), 1);
    }

    #[test]
    fn failed_write_still_changes_state() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1", &table, &mut link).unwrap();
        link.set_fail_writes(true);

        let result = dispatcher.advance(&mut link);

        assert_eq!(result, Err(LinkError::Io(std::io::ErrorKind::BrokenPipe)));
        assert!(dispatcher.queue().is_empty());
        assert_eq!(dispatcher.state(), DispatchState::Homed);
        assert_eq!(dispatcher.last_command(), Some(&Command::Home));
    }

    #[test]
    fn cursor_stays_valid_through_mixed_operations() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();

        dispatcher.search("L1R1C1 L1R1C2 L1R1C3", &table, &mut link).unwrap();
        dispatcher.select(2);
        for _ in 0..5 {
            dispatcher.advance(&mut link).unwrap();
            assert_cursor_valid(&dispatcher);
            dispatcher.home(&mut link).unwrap();
            dispatcher.advance(&mut link).unwrap();
            assert_cursor_valid(&dispatcher);
        }
        assert!(dispatcher.queue().is_empty());
    }

    #[test]
    fn clear_resets_without_sending() {
        let table = table();
        let mut link = MemoryLink::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.search("L1R1C1 L1R1C2", &table, &mut link).unwrap();
        link.take_written();

        dispatcher.clear();

        assert!(dispatcher.queue().is_empty());
        assert_eq!(dispatcher.state(), DispatchState::Homed);
        assert!(link.written().is_empty());
    }
}
