//! Ordered command delivery
//!
//! [`CommandEmitter`] stamps each command with the next sequence number,
//! records it in the history and hands it to every listener synchronously, in
//! registration order. Once sealed (stop, fatal error, completion) the emitter
//! drops everything it is given.

use super::{Command, CommandKind};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A fresh request id, unique for the lifetime of the process.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Receives commands as they are emitted
pub trait CommandListener {
    fn on_command(&mut self, command: &Command);
}

impl<F: FnMut(&Command)> CommandListener for F {
    fn on_command(&mut self, command: &Command) {
        self(command)
    }
}

#[derive(Default)]
pub struct CommandEmitter {
    next_seq: u64,
    history: Vec<Command>,
    listeners: Vec<Box<dyn CommandListener>>,
    sealed: bool,
}

impl fmt::Debug for CommandEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEmitter")
            .field("next_seq", &self.next_seq)
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl CommandEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn CommandListener>) {
        self.listeners.push(listener);
    }

    /// Emit `kind`. Returns the sequence number, or `None` when sealed.
    pub fn emit(&mut self, kind: CommandKind) -> Option<u64> {
        if self.sealed {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let command = Command { seq, kind };
        for listener in &mut self.listeners {
            listener.on_command(&command);
        }
        self.history.push(command);
        Some(seq)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Start a fresh stream: history cleared, sequence restarted, unsealed.
    /// Listeners stay registered.
    pub fn reset(&mut self) {
        self.next_seq = 0;
        self.history.clear();
        self.sealed = false;
    }

    pub fn history(&self) -> &[Command] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_sequence_and_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut emitter = CommandEmitter::new();
        emitter.add_listener(Box::new(move |c: &Command| sink.borrow_mut().push(c.seq)));
        emitter.emit(CommandKind::ProgramStart);
        emitter.emit(CommandKind::Delay { ms: 10 });

        assert_eq!(*seen.borrow(), vec![0, 1]);
        assert_eq!(emitter.history().len(), 2);
    }

    #[test]
    fn test_sealed_emitter_drops_commands() {
        let mut emitter = CommandEmitter::new();
        emitter.emit(CommandKind::ProgramStart);
        emitter.seal();
        assert_eq!(emitter.emit(CommandKind::ProgramEnd), None);
        assert_eq!(emitter.history().len(), 1);

        emitter.reset();
        assert_eq!(emitter.emit(CommandKind::ProgramStart), Some(0));
    }

    #[test]
    fn test_request_ids_increase() {
        let a = next_request_id();
        let b = next_request_id();
        assert!(b > a);
    }
}
