use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::types::Command;

const BUS_CAPACITY: usize = 256;

/// Carries parsed console commands from the input thread to the controller
pub struct CommandBus {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl CommandBus {
    pub fn new() -> Self {
        let (tx, rx) = bounded(BUS_CAPACITY);
        Self { tx, rx }
    }

    /// Get a sender that can be cloned and moved to another thread
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    #[cfg(test)]
    pub fn try_recv(&self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Block until the next command arrives
    pub fn recv(&self) -> Option<Command> {
        self.rx.recv().ok()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender for dispatching commands
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Send a command (non-blocking, drops if buffer full).
    /// Returns false if the command was not queued.
    pub fn send(&self, cmd: Command) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                log::warn!("Command buffer full, dropping '{}'", cmd.description());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Send a command that must not be dropped, waiting for room on the bus
    pub fn send_blocking(&self, cmd: Command) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_receive_in_order() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        assert!(sender.send(Command::Play));
        assert!(sender.clone().send(Command::SetBpm(90)));
        assert_eq!(bus.try_recv(), Some(Command::Play));
        assert_eq!(bus.try_recv(), Some(Command::SetBpm(90)));
        assert_eq!(bus.try_recv(), None);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        for _ in 0..BUS_CAPACITY {
            assert!(sender.send(Command::Status));
        }
        assert!(!sender.send(Command::Quit));
    }

    #[test]
    fn test_blocking_send_waits_for_room() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        for _ in 0..BUS_CAPACITY {
            assert!(sender.send(Command::Status));
        }
        assert!(!sender.send(Command::Quit));

        let blocked = sender.clone();
        let handle = std::thread::spawn(move || blocked.send_blocking(Command::Quit));
        for _ in 0..BUS_CAPACITY {
            assert_eq!(bus.recv(), Some(Command::Status));
        }
        assert_eq!(bus.recv(), Some(Command::Quit));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_recv_from_other_thread() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        let handle = std::thread::spawn(move || sender.send(Command::Undo));
        assert_eq!(bus.recv(), Some(Command::Undo));
        assert!(handle.join().unwrap());
    }
}
