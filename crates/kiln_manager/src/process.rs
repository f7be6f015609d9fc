//! Contracts for tick-driven collaborators.

use kiln_future::PollStatus;

/// A background process advanced once per manager tick.
///
/// Returning [`PollStatus::Continue`] keeps the process registered;
/// [`PollStatus::Finish`] deregisters it. A panic during `poll` is caught,
/// logged, and treated as `Finish`: the process is dropped, not retried.
pub trait PollingProcess: Send {
    /// Advances the process one step.
    fn poll(&mut self) -> PollStatus;
}

// Closures are the common case for small processes.
impl<F> PollingProcess for F
where
    F: FnMut() -> PollStatus + Send,
{
    fn poll(&mut self) -> PollStatus {
        self()
    }
}

/// A platform hook surfacing completions of work dispatched to execution
/// contexts the manager does not own (OS I/O completion queues, GPU upload
/// fences). Pumped at the start of every tick, before any polling process.
pub trait ThreadPump: Send {
    /// Surfaces any pending completions.
    fn pump(&mut self);
}

impl<F> ThreadPump for F
where
    F: FnMut() + Send,
{
    fn pump(&mut self) {
        self()
    }
}
