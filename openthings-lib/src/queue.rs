//! Commands waiting for a sleepy device to check in.
//!
//! Battery-powered devices spend most of their time asleep and only listen
//! briefly after sending a report, so outbound commands queue here until the
//! device's next message arrives. At most one command is held per
//! (sensor, parameter) pair: asking twice just updates the pending payload.

use crate::message::Record;
use std::collections::VecDeque;
use tracing::debug;

/// One queued command for a device.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub sensor_id: u32,
    pub record: Record,
}

/// FIFO of pending commands with replace-on-same-key semantics.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<PendingCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        CommandQueue::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue a command. A pending command with the same sensor id and
    /// parameter is overwritten in place, keeping its queue position.
    pub fn push(&mut self, command: PendingCommand) {
        let key = command.record.parameter();
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|c| c.sensor_id == command.sensor_id && c.record.parameter() == key)
        {
            debug!(
                "replacing pending {key} for sensor {:#08x}",
                command.sensor_id
            );
            *existing = command;
        } else {
            self.pending.push_back(command);
        }
    }

    /// Remove and return the oldest pending command for `sensor_id`, if any.
    pub fn take_next(&mut self, sensor_id: u32) -> Option<PendingCommand> {
        let index = self
            .pending
            .iter()
            .position(|c| c.sensor_id == sensor_id)?;
        self.pending.remove(index)
    }
}
