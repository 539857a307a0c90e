use crate::error::RefCountError;
use crate::sync::{AtomicUsize, Ordering};
use tracing::error;

/// High bit marks the terminal "disposed" state. The low bits hold the count.
const DISPOSED: usize = 1 << (usize::BITS - 1);
const COUNT_MASK: usize = !DISPOSED;

/// Outcome of a successful [`RefCount::release`].
///
/// [`RefCount::release`] 成功时的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Other references remain. Carries the count after this release.
    /// 仍有其他引用。携带本次释放后的计数。
    Remaining(usize),
    /// This release performed the unique 1 -> 0 transition.
    /// 本次释放完成了唯一的 1 -> 0 转换。
    ReachedZero,
}

/// Non-blocking atomic reference counter with exactly-once zero-crossing.
///
/// The counter and the terminal "disposed" marker live in one `AtomicUsize`,
/// so the 1 -> 0 transition and the disposal claim are a single
/// compare-and-swap. Exactly one thread can win it.
///
/// `RefCount` does not run anything itself. Types that own one implement
/// [`ReferenceCounted`] and get `retain`/`release` with a zero hook for free.
///
/// **Example**:
/// ```
/// use record_context::{RefCount, Released};
///
/// let rc = RefCount::new(0);
/// rc.retain().unwrap();
/// rc.retain().unwrap();
/// assert_eq!(rc.release(), Ok(Released::Remaining(1)));
/// assert_eq!(rc.release(), Ok(Released::ReachedZero));
/// assert!(rc.is_disposed());
/// ```
///
/// 无阻塞的原子引用计数器，零点穿越恰好一次。
///
/// 计数与终止的"已释放"标记位于同一个 `AtomicUsize` 中，
/// 因此 1 -> 0 转换和释放权的获取是同一次 CAS，只有一个线程能够成功。
#[derive(Debug)]
pub struct RefCount {
    state: AtomicUsize,
}

impl RefCount {
    /// Create a counter with an explicit initial count.
    ///
    /// An initial count of zero leaves the object "unowned" until the
    /// creator performs its own first `retain()`.
    ///
    /// 以显式的初始计数创建计数器。
    /// 初始计数为零时，对象在创建者第一次 `retain()` 之前处于"无主"状态。
    #[inline]
    pub fn new(initial: usize) -> Self {
        assert!(
            initial & DISPOSED == 0,
            "BUG: initial reference count {initial} overflows the counter"
        );
        Self {
            state: AtomicUsize::new(initial),
        }
    }

    /// Atomically increment the count.
    ///
    /// Fails only if the counter already crossed zero; a disposed object
    /// is never revived.
    ///
    /// 原子地增加计数。仅当计数器已经穿越零点时失败，已释放的对象不会复活。
    #[inline]
    pub fn retain(&self) -> Result<(), RefCountError> {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            if current & DISPOSED != 0 {
                error!("retain on a disposed reference count");
                return Err(RefCountError::RetainAfterDispose);
            }
            assert!(
                current < COUNT_MASK,
                "BUG: reference count overflow. This indicates leaked retains."
            );
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically decrement the count.
    ///
    /// Returns [`Released::ReachedZero`] to exactly one caller per instance:
    /// the one whose decrement took the count from 1 to 0. That caller is
    /// the only thread permitted to dispose the object.
    ///
    /// Releasing at zero fails with [`RefCountError::ReleasedAtZero`] and
    /// leaves the counter untouched.
    ///
    /// 原子地减少计数。
    /// 每个实例只有一个调用者会得到 [`Released::ReachedZero`]：
    /// 即把计数从 1 减到 0 的那个调用者，它也是唯一被允许释放对象的线程。
    /// 在零时释放会返回 [`RefCountError::ReleasedAtZero`]，计数器保持不变。
    #[inline]
    pub fn release(&self) -> Result<Released, RefCountError> {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let count = current & COUNT_MASK;
            if count == 0 {
                error!(disposed = current & DISPOSED != 0, "release at zero reference count");
                return Err(RefCountError::ReleasedAtZero);
            }
            let next = if count == 1 { DISPOSED } else { current - 1 };
            // AcqRel: the zero-crossing thread must observe every write made
            // by threads that released before it.
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) if count == 1 => return Ok(Released::ReachedZero),
                Ok(_) => return Ok(Released::Remaining(count - 1)),
                Err(actual) => current = actual,
            }
        }
    }

    /// Best-effort snapshot of the count. Diagnostics only.
    /// 计数的尽力快照，仅用于诊断。
    #[inline]
    pub fn current(&self) -> usize {
        self.state.load(Ordering::Relaxed) & COUNT_MASK
    }

    /// Whether the zero-crossing already happened. Diagnostics only.
    /// 零点穿越是否已经发生，仅用于诊断。
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) & DISPOSED != 0
    }
}

/// Proof that the holder performed the unique 1 -> 0 transition.
///
/// Only the provided [`ReferenceCounted::release`] can construct one, so
/// nothing outside this crate can invoke the zero hook directly:
///
/// ```compile_fail
/// use record_context::{Epoch, RecordContext, ReferenceCounted, ZeroCrossing};
///
/// let ctx = RecordContext::new("rec", 1u64, |_ctx| {}, 0, Epoch::new(0), 0);
/// ctx.retain().unwrap();
/// ctx.set_key_occupied();
/// ctx.reference_count_reached_zero(ZeroCrossing { _sealed: () }, None);
/// ```
///
/// 证明持有者完成了唯一的 1 -> 0 转换。
/// 只有默认提供的 [`ReferenceCounted::release`] 能构造它，
/// 因此 crate 外部无法直接调用零点钩子。
#[derive(Debug)]
pub struct ZeroCrossing {
    _sealed: (),
}

/// An object whose lifetime is driven by an embedded [`RefCount`].
///
/// Implementors supply the counter and the zero hook. `retain`/`release`
/// are provided and guarantee the hook fires at most once, on the thread
/// performing the final release. `Runner` is the disposer-runner
/// capability passed through to the hook at release time; it is never
/// stored.
///
/// 生命周期由内嵌 [`RefCount`] 驱动的对象。
///
/// 实现者提供计数器和零点钩子。`retain`/`release` 是默认提供的，
/// 保证钩子至多触发一次，并且在执行最后一次释放的线程上触发。
/// `Runner` 是在释放时传递给钩子的执行器能力，不会被保存。
pub trait ReferenceCounted {
    type Runner: ?Sized;

    fn ref_count(&self) -> &RefCount;

    /// Called exactly once, by the thread whose release took the count to zero.
    ///
    /// Not callable from outside: the [`ZeroCrossing`] proof is only minted
    /// by [`release`](Self::release).
    ///
    /// 恰好调用一次，由把计数减到零的线程调用。
    /// 外部无法调用：[`ZeroCrossing`] 凭证只由 [`release`](Self::release) 生成。
    fn reference_count_reached_zero(&self, proof: ZeroCrossing, runner: Option<&Self::Runner>);

    #[inline]
    fn retain(&self) -> Result<(), RefCountError> {
        self.ref_count().retain()
    }

    #[inline]
    fn release(&self, runner: Option<&Self::Runner>) -> Result<(), RefCountError> {
        match self.ref_count().release()? {
            Released::ReachedZero => {
                self.reference_count_reached_zero(ZeroCrossing { _sealed: () }, runner);
                Ok(())
            }
            Released::Remaining(_) => Ok(()),
        }
    }

    #[inline]
    fn reference_count(&self) -> usize {
        self.ref_count().current()
    }
}
