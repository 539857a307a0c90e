use crossbeam_queue::SegQueue;
use std::fmt;

/// A disposer invocation bound to its context, ready to run on any lane.
/// 已绑定到其上下文的释放器调用，可以在任意执行通道上运行。
pub type DisposeTask = Box<dyn FnOnce() + Send + 'static>;

/// Capability that decides which execution lane runs a disposer.
///
/// Passed to `release()` at disposal time and never stored by the context.
/// Passing no runner means "run inline on the zero-crossing thread".
///
/// Any `Fn(DisposeTask) + Send + Sync` closure is a runner:
/// ```
/// use record_context::{DisposeTask, DisposerRunner};
///
/// let spawn = |task: DisposeTask| {
///     std::thread::spawn(task).join().unwrap();
/// };
/// spawn.run_disposer(Box::new(|| println!("disposed")));
/// ```
///
/// 决定由哪个执行通道运行释放器的能力。
/// 在释放时传给 `release()`，上下文不会保存它。
/// 不传入执行器表示"在零点穿越线程上内联运行"。
pub trait DisposerRunner: Send + Sync {
    fn run_disposer(&self, task: DisposeTask);
}

impl<F> DisposerRunner for F
where
    F: Fn(DisposeTask) + Send + Sync,
{
    #[inline]
    fn run_disposer(&self, task: DisposeTask) {
        self(task)
    }
}

/// Runs the disposer immediately on the calling thread.
/// 在调用线程上立即运行释放器。
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRunner;

impl DisposerRunner for InlineRunner {
    #[inline]
    fn run_disposer(&self, task: DisposeTask) {
        task()
    }
}

/// Queues disposers until the owning lane drains them.
///
/// Continuations may complete on arbitrary threads, but key-lane bookkeeping
/// usually belongs to one task thread. `MailboxRunner` lets the final release
/// happen anywhere while the disposer itself runs when that thread calls
/// [`drain`](MailboxRunner::drain). Enqueueing is lock-free.
///
/// 将释放器排队，直到所属通道将其取出执行。
///
/// 后续操作可能在任意线程上完成，但 key 通道的簿记通常属于一个任务线程。
/// `MailboxRunner` 允许最后一次释放发生在任意线程，
/// 而释放器本身在该线程调用 [`drain`](MailboxRunner::drain) 时运行。入队是无锁的。
#[derive(Default)]
pub struct MailboxRunner {
    pending: SegQueue<DisposeTask>,
}

impl MailboxRunner {
    #[inline]
    pub fn new() -> Self {
        Self {
            pending: SegQueue::new(),
        }
    }

    /// Number of disposers waiting to run.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every queued disposer on the calling thread.
    ///
    /// Returns how many ran. Disposers enqueued while draining run too.
    ///
    /// 在调用线程上运行所有排队的释放器，返回运行的数量。
    /// 在取出过程中新入队的释放器也会被运行。
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pending.pop() {
            task();
            ran += 1;
        }
        ran
    }
}

impl DisposerRunner for MailboxRunner {
    #[inline]
    fn run_disposer(&self, task: DisposeTask) {
        self.pending.push(task);
    }
}

impl fmt::Debug for MailboxRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxRunner")
            .field("pending", &self.pending.len())
            .finish()
    }
}
