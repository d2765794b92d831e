//! Deferred manager commands.
//!
//! Callbacks run while the manager is mid-update and cannot borrow it, so they
//! send a [`Command`] instead. The manager drains the queue at the start of
//! the next `update`, which keeps a callback from re-entering the pass that
//! invoked it.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::request::{BgmRequest, SeRequest};

/// Default queue capacity.
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Work queued for the next tick.
#[derive(Debug, Clone)]
pub enum Command {
    /// Play a sound effect.
    PlaySe(SeRequest),
    /// Play background music.
    PlayBgm(BgmRequest),
    /// Stop every sound effect.
    StopAllSe,
    /// Stop both music slots.
    StopAllBgm,
    /// Fade the active music out over the given seconds.
    FadeOutBgm(f32),
    /// Pause every sound effect.
    PauseSe,
    /// Resume every sound effect.
    ResumeSe,
    /// Pause both music slots.
    PauseBgm,
    /// Resume both music slots.
    ResumeBgm,
}

/// Cloneable handle for queueing commands from callbacks or other threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Queues a command. Returns false if the queue is full or closed.
    pub fn send(&self, command: Command) -> bool {
        self.sender.try_send(command).is_ok()
    }

    /// Queues a sound effect.
    pub fn play_se(&self, request: SeRequest) -> bool {
        self.send(Command::PlaySe(request))
    }

    /// Queues background music.
    pub fn play_bgm(&self, request: BgmRequest) -> bool {
        self.send(Command::PlayBgm(request))
    }
}

/// Bounded command queue owned by the manager.
#[derive(Debug)]
pub struct CommandQueue {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    capacity: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

impl CommandQueue {
    /// Creates a queue holding at most `capacity` commands.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Queues a command; dropped if the queue is full.
    pub fn push(&self, command: Command) -> bool {
        self.sender.try_send(command).is_ok()
    }

    /// Takes every pending command.
    pub fn drain(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(self.receiver.len());
        while let Ok(command) = self.receiver.try_recv() {
            commands.push(command);
        }
        commands
    }

    /// Number of pending commands.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Maximum number of pending commands.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// New sender handle.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let queue = CommandQueue::new(8);
        let sender = queue.sender();
        assert!(sender.play_se(SeRequest::new("a")));
        assert!(sender.send(Command::StopAllBgm));
        assert_eq!(queue.pending_count(), 2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(&drained[0], Command::PlaySe(r) if r.name == "a"));
        assert!(matches!(drained[1], Command::StopAllBgm));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_full_queue_drops() {
        let queue = CommandQueue::new(1);
        assert!(queue.push(Command::PauseSe));
        assert!(!queue.push(Command::ResumeSe));
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn test_zero_capacity_becomes_one() {
        let queue = CommandQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.push(Command::PauseBgm));
    }
}
