//! Kernel port for targets without an RTOS.

use larm_core::KernelPort;

pub const UNKNOWN_TASK: &str = "UnknownTask";

/// Reports the same task name for every alert.
#[derive(Debug, Clone, Copy)]
pub struct GenericKernel {
    task: &'static str,
}

impl GenericKernel {
    pub fn new() -> Self {
        Self { task: UNKNOWN_TASK }
    }

    pub fn named(task: &'static str) -> Self {
        Self { task }
    }
}

impl Default for GenericKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelPort for GenericKernel {
    fn current_task_name(&self) -> &str {
        self.task
    }
}
