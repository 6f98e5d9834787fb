// crates/playback-core/src/command_queue.rs
//
// CommandQueue: FIFO of WorkerCommand, serviced by DecoderWorker between
// decode iterations. Mirrors the teacher's PlaybackCmd channel in worker.rs,
// generalized with an optional synchronous completion signal.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use playback_types::WorkerCommand;

/// One queued entry: the command plus an optional rendezvous sender the
/// worker fires after executing it, for `push_and_wait` callers.
pub struct QueuedCommand {
    pub cmd: WorkerCommand,
    done: Option<Sender<()>>,
}

impl QueuedCommand {
    /// Signal completion to a `push_and_wait` caller, if any is waiting.
    pub fn complete(self) {
        if let Some(done) = self.done {
            let _ = done.send(());
        }
    }
}

pub struct CommandQueue {
    tx: Sender<QueuedCommand>,
    rx: Receiver<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Fire-and-forget enqueue.
    pub fn push(&self, cmd: WorkerCommand) {
        let _ = self.tx.send(QueuedCommand { cmd, done: None });
    }

    /// Enqueue and block the caller until the worker has executed `cmd`.
    pub fn push_and_wait(&self, cmd: WorkerCommand) {
        let (done_tx, done_rx) = bounded(0);
        if self.tx.send(QueuedCommand { cmd, done: Some(done_tx) }).is_err() {
            return;
        }
        let _ = done_rx.recv();
    }

    /// Worker-side: drain every command currently queued, in order.
    pub fn drain(&self) -> Vec<QueuedCommand> {
        self.rx.try_iter().collect()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_wait_blocks_until_completed() {
        let queue = CommandQueue::new();
        queue.push(WorkerCommand::Seek { target_ms: 10.0 });

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        for entry in drained {
            entry.complete();
        }
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let queue = CommandQueue::new();
        queue.push(WorkerCommand::Seek { target_ms: 1.0 });
        queue.push(WorkerCommand::Reconfigure);
        queue.push(WorkerCommand::Seek { target_ms: 2.0 });

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        match drained[0].cmd {
            WorkerCommand::Seek { target_ms } => assert_eq!(target_ms, 1.0),
            _ => panic!("wrong order"),
        }
        match drained[2].cmd {
            WorkerCommand::Seek { target_ms } => assert_eq!(target_ms, 2.0),
            _ => panic!("wrong order"),
        }
    }
}
