//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{
    Checkpoint, Continuation, Error, PowerSupervisor, Task,
    log::{debug, trace, warning},
};

/// Represents a Task
///
/// Always a valid index into the task table of the scheduler that made it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId(usize);

impl TaskId {
    /// Create a Task ID
    ///
    /// Selection policies use this. The scheduler wraps anything out of range
    /// back into its table.
    pub const fn new(index: usize) -> TaskId {
        TaskId(index)
    }

    /// The position of the task in the task table
    pub const fn index(self) -> usize {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "T{=usize:03}", self.0);
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "T{:03}", self.0)
    }
}

/// Picks which task to negotiate for next
pub trait SelectNext {
    /// Given the task that last ran, and how many tasks there are, pick the
    /// next one
    fn next(&mut self, last: TaskId, count: usize) -> TaskId;
}

/// Each task in turn, wrapping at the end of the table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundRobin;

impl SelectNext for RoundRobin {
    fn next(&mut self, last: TaskId, count: usize) -> TaskId {
        TaskId((last.0 + 1) % count)
    }
}

impl SelectNext for fn(TaskId, usize) -> TaskId {
    fn next(&mut self, last: TaskId, count: usize) -> TaskId {
        self(last, count)
    }
}

/// How a scheduler cycle ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cycle {
    /// This task ran to completion
    Ran(TaskId),
    /// There was not enough energy for this task, we checkpointed, and the
    /// power was not cut. The next cycle tries the same task again.
    Stalled(TaskId),
}

/// An energy-gated, run-to-completion, cooperative scheduler
///
/// Before each task runs we ask the power supervisor for enough energy to
/// finish it. If the supervisor says no, we checkpoint and ask to be turned
/// off. When the power comes back we resume inside that checkpoint, which
/// counts as permission, and the task runs.
pub struct Scheduler<'t, L: PowerSupervisor, S: SelectNext = RoundRobin> {
    /// Which task we are negotiating for, or running
    current_task: TaskId,
    /// The policy's last decision, which the next one is made from. Only
    /// updated once `current_task` has been, so a snapshot never catches
    /// it ahead.
    last_task: TaskId,
    /// A fixed list of all our tasks
    task_list: &'t [Task],
    /// Our link to the power supervisor
    link: L,
    /// Picks the next task
    policy: S,
}

impl<'t, L: PowerSupervisor> Scheduler<'t, L, RoundRobin> {
    /// Build a round-robin scheduler, starting with the first task in the
    /// table
    pub fn round_robin(task_list: &'t [Task], link: L) -> Result<Self, Error> {
        Scheduler::new(task_list, 0, link, RoundRobin)
    }
}

impl<'t, L: PowerSupervisor, S: SelectNext> Scheduler<'t, L, S> {
    /// Build the scheduler
    ///
    /// The table must not be empty, and `first` must be an index into it.
    pub fn new(task_list: &'t [Task], first: usize, link: L, policy: S) -> Result<Self, Error> {
        // Cannot schedule without at least one task
        if task_list.is_empty() {
            return Err(Error::NoTasks);
        }
        if first >= task_list.len() {
            return Err(Error::TaskIdOutOfRange {
                id: first,
                count: task_list.len(),
            });
        }
        Ok(Scheduler {
            current_task: TaskId(first),
            last_task: TaskId(first),
            task_list,
            link,
            policy,
        })
    }

    /// Get the ID of the task we are negotiating for next
    pub fn current_task_id(&self) -> TaskId {
        self.current_task
    }

    /// Get the ID the next selection will be made from
    pub fn last_task_id(&self) -> TaskId {
        self.last_task
    }

    /// Get the task table
    pub fn tasks(&self) -> &'t [Task] {
        self.task_list
    }

    /// Get the power supervisor link
    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    /// Run the scheduler forever
    ///
    /// Call this from `fn main()` once the hardware is set up and the
    /// checkpoint engine is built.
    pub fn run<C: Checkpoint>(&mut self, engine: &mut C) -> ! {
        loop {
            self.step(engine);
        }
    }

    /// Negotiate for the current task and, if we can, run it
    ///
    /// If there is no energy, we checkpoint and ask to be switched off. This
    /// may then appear to return a long time later, after a power cycle, with
    /// the task having run.
    pub fn step<C: Checkpoint>(&mut self, engine: &mut C) -> Cycle {
        let task_id = self.current_task;
        let task = &self.task_list[task_id.0];
        let level = task.energy_level();

        self.link.request(level);
        if !self.link.energy_available() {
            debug!("{} needs {}, checkpointing", task_id, level);
            match engine.checkpoint() {
                Continuation::Fresh => {
                    self.link.signal_done();
                    self.link.halt();
                    // if we get here, the power stayed on
                    warning!("{} still powered after halt", task_id);
                    self.link.release();
                    return Cycle::Stalled(task_id);
                }
                Continuation::Resumed => {
                    // the supervisor only powers us up with enough energy
                    trace!("{} admitted by resume", task_id);
                }
            }
        }

        self.link.release();
        trace!("> run {}", task_id);
        task.run();
        trace!("< run {}", task_id);

        let count = self.task_list.len();
        let next = self.policy.next(self.last_task, count);
        self.current_task = TaskId(next.0 % count);
        self.last_task = self.current_task;
        Cycle::Ran(task_id)
    }
}


// End of File
