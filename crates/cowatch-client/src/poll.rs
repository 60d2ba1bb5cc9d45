//! Runtime timers: the seek-poll task and reconnect delays.

use std::time::Duration;

use cowatch_core::Environment;
use tokio::{sync::mpsc, task::JoinHandle};

/// Timer firings delivered to the runtime's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Seek-poll tick from the poll task with this generation
    PollTick {
        /// Generation of the task that fired
        generation: u64,
    },
    /// A scheduled reconnect is due
    ReconnectDue {
        /// Generation of the timer that fired
        generation: u64,
    },
}

/// Periodic seek-poll task bound to one room view.
///
/// Cancelled on drop. Ticks already queued when the task is cancelled still
/// carry its generation, so the runtime can discard them.
#[derive(Debug)]
pub struct PollTask {
    generation: u64,
    task: JoinHandle<()>,
}

impl PollTask {
    /// Start ticking every `interval`.
    pub fn spawn<E: Environment>(
        env: E,
        interval: Duration,
        generation: u64,
        ticks: mpsc::Sender<TimerEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            loop {
                env.sleep(interval).await;
                if ticks.send(TimerEvent::PollTick { generation }).await.is_err() {
                    break;
                }
            }
        });
        Self { generation, task }
    }

    /// Generation carried by this task's ticks.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One-shot reconnect delay.
///
/// Cancelled on drop, like [`PollTask`].
#[derive(Debug)]
pub struct ReconnectTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    /// Deliver [`TimerEvent::ReconnectDue`] after `delay`.
    pub fn spawn<E: Environment>(
        env: E,
        delay: Duration,
        generation: u64,
        timers: mpsc::Sender<TimerEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            env.sleep(delay).await;
            let _ = timers.send(TimerEvent::ReconnectDue { generation }).await;
        });
        Self { generation, task }
    }

    /// Generation carried by this timer's event.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
