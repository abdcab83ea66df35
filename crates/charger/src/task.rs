//! Cancellable periodic tasks.
//!
//! Each periodic job (thermal, end-of-charge, heartbeat, soft coulomb
//! counter) owns a [`TaskHandle`]. The host spawns [`run_periodic`] once per
//! handle on its executor; the device then drives the job through the
//! handle: reschedule with a new delay, or cancel and wait until any tick in
//! progress has finished. A cancelled task parks until the next reschedule.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

/// Zero delay: run on the next executor poll.
pub const NOW: Duration = Duration::from_ticks(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskCommand {
    Reschedule(Duration),
    Cancel,
}

/// Control side of one periodic task.
pub struct TaskHandle<M: RawMutex> {
    name: &'static str,
    command: Signal<M, TaskCommand>,
    idle: Signal<M, ()>,
    attached: AtomicBool,
    armed: AtomicBool,
    cancelling: AtomicBool,
}

impl<M: RawMutex> TaskHandle<M> {
    /// Handle for a task labelled `name` in log lines.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            command: Signal::new(),
            idle: Signal::new(),
            attached: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            cancelling: AtomicBool::new(false),
        }
    }

    /// Task label.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a runner has been spawned for this handle.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Whether a tick is pending.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Run the next tick after `delay`, replacing any pending delay.
    /// Ignored while a cancel is in flight.
    pub fn reschedule(&self, delay: Duration) {
        if self.cancelling.load(Ordering::Acquire) {
            trace!("{} reschedule dropped, cancelling", self.name);
            return;
        }
        trace!("{} rescheduled in {} ms", self.name, delay.as_millis());
        self.armed.store(true, Ordering::Release);
        self.command.signal(TaskCommand::Reschedule(delay));
    }

    /// Run the next tick as soon as possible.
    pub fn reschedule_now(&self) {
        self.reschedule(NOW);
    }

    /// Cancel the pending tick and wait until a tick in progress, if any,
    /// has returned. Returns at once when no runner is attached.
    pub async fn cancel_and_join(&self) {
        self.armed.store(false, Ordering::Release);
        if !self.is_attached() {
            return;
        }
        self.cancelling.store(true, Ordering::Release);
        self.idle.reset();
        self.command.signal(TaskCommand::Cancel);
        self.idle.wait().await;
        self.cancelling.store(false, Ordering::Release);
        debug!("{} cancelled", self.name);
    }
}

/// Drive `tick` on the schedule kept by `handle`.
///
/// `tick` returns the delay until its next run, or `None` to park until
/// someone reschedules. Never returns; spawn one per handle.
pub async fn run_periodic<M, F>(handle: &TaskHandle<M>, mut tick: F) -> !
where
    M: RawMutex,
    F: FnMut() -> Option<Duration>,
{
    handle.attached.store(true, Ordering::Release);
    loop {
        let mut delay = loop {
            match handle.command.wait().await {
                TaskCommand::Reschedule(delay) => break delay,
                TaskCommand::Cancel => handle.idle.signal(()),
            }
        };
        loop {
            match select(Timer::after(delay), handle.command.wait()).await {
                Either::First(()) => {
                    if let Some(next) = tick() {
                        delay = next;
                    } else {
                        handle.armed.store(false, Ordering::Release);
                        break;
                    }
                }
                Either::Second(TaskCommand::Reschedule(next)) => delay = next,
                Either::Second(TaskCommand::Cancel) => {
                    handle.idle.signal(());
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::with_timeout;

    type Handle = TaskHandle<CriticalSectionRawMutex>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test]
    async fn ticks_until_cancelled() {
        let handle = Handle::new("test");
        let count = Cell::new(0u32);
        let runner = run_periodic(&handle, || {
            count.set(count.get() + 1);
            Some(ms(10))
        });
        let control = async {
            handle.reschedule_now();
            Timer::after(ms(45)).await;
            handle.cancel_and_join().await;
            assert!(!handle.is_armed());
            let seen = count.get();
            assert!(seen >= 2, "seen {seen}");
            Timer::after(ms(50)).await;
            assert_eq!(count.get(), seen);
        };
        assert!(matches!(select(runner, control).await, Either::Second(())));
    }

    #[tokio::test]
    async fn reschedule_replaces_pending_delay() {
        let handle = Handle::new("test");
        let count = Cell::new(0u32);
        let runner = run_periodic(&handle, || {
            count.set(count.get() + 1);
            None
        });
        let control = async {
            handle.reschedule(Duration::from_secs(3600));
            Timer::after(ms(10)).await;
            assert_eq!(count.get(), 0);
            handle.reschedule_now();
            Timer::after(ms(10)).await;
            assert_eq!(count.get(), 1);
            assert!(!handle.is_armed());
        };
        select(runner, control).await;
    }

    #[tokio::test]
    async fn parked_task_wakes_on_reschedule() {
        let handle = Handle::new("test");
        let count = Cell::new(0u32);
        let runner = run_periodic(&handle, || {
            count.set(count.get() + 1);
            None
        });
        let control = async {
            handle.reschedule_now();
            Timer::after(ms(10)).await;
            handle.cancel_and_join().await;
            handle.reschedule_now();
            Timer::after(ms(10)).await;
            assert_eq!(count.get(), 2);
        };
        select(runner, control).await;
    }

    #[tokio::test]
    async fn reschedule_during_cancel_does_not_hang_join() {
        let handle = Handle::new("test");
        let count = Cell::new(0u32);
        let runner = run_periodic(&handle, || {
            count.set(count.get() + 1);
            None
        });
        let control = async {
            handle.reschedule(Duration::from_secs(3600));
            Timer::after(ms(10)).await;
            // The reschedule lands before the runner has seen the cancel.
            join(handle.cancel_and_join(), async { handle.reschedule_now() }).await;
            Timer::after(ms(10)).await;
            assert_eq!(count.get(), 0);
            handle.reschedule_now();
            Timer::after(ms(10)).await;
            assert_eq!(count.get(), 1);
        };
        let outcome = select(runner, with_timeout(Duration::from_secs(1), control)).await;
        assert!(matches!(outcome, Either::Second(Ok(()))));
    }

    #[tokio::test]
    async fn cancel_without_runner_returns() {
        let handle = Handle::new("test");
        handle.reschedule_now();
        handle.cancel_and_join().await;
        assert!(!handle.is_attached());
        assert!(!handle.is_armed());
    }
}
