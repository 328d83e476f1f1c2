//! Deferral of commands issued before the mount point exists

use std::collections::VecDeque;

/// FIFO gate in front of every public widget operation
///
/// Until the gate opens, admitted commands are queued with their arguments.
/// Opening drains the queue exactly once, in call order; from then on every
/// command passes straight through.
#[derive(Debug)]
pub struct LifecycleGate<C> {
    ready: bool,
    queue: VecDeque<C>,
}

impl<C> LifecycleGate<C> {
    /// A closed gate
    pub fn new() -> Self {
        Self {
            ready: false,
            queue: VecDeque::new(),
        }
    }

    /// A gate that is ready from the start
    pub fn opened() -> Self {
        Self {
            ready: true,
            queue: VecDeque::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Hand back `command` if it may run now, otherwise queue it
    pub fn admit(&mut self, command: C) -> Option<C> {
        if self.ready {
            Some(command)
        } else {
            self.queue.push_back(command);
            None
        }
    }

    /// Mark the gate ready and take the queued commands in call order
    pub fn open(&mut self) -> Vec<C> {
        self.ready = true;
        self.queue.drain(..).collect()
    }

    /// Drop every queued command
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<C> Default for LifecycleGate<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_gate_queues_in_order() {
        let mut gate = LifecycleGate::new();
        assert!(gate.admit("start").is_none());
        assert!(gate.admit("finish").is_none());
        assert_eq!(gate.pending(), 2);

        assert_eq!(gate.open(), vec!["start", "finish"]);
        assert!(gate.is_ready());
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_open_gate_passes_through() {
        let mut gate = LifecycleGate::opened();
        assert_eq!(gate.admit(7), Some(7));
        assert!(gate.open().is_empty());
    }

    #[test]
    fn test_queue_drains_once() {
        let mut gate = LifecycleGate::new();
        gate.admit(1);
        assert_eq!(gate.open(), vec![1]);
        assert!(gate.open().is_empty());
        assert_eq!(gate.admit(2), Some(2));
    }

    #[test]
    fn test_clear_drops_queued_commands() {
        let mut gate = LifecycleGate::new();
        gate.admit(1);
        gate.admit(2);
        gate.clear();
        assert!(gate.open().is_empty());
    }
}
