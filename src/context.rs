use crate::epoch::Epoch;
use crate::error::{ContextError, RefCountError};
use crate::namespace::{Namespaces, StateHandle};
use crate::partition::assign_to_partition;
use crate::ref_count::{RefCount, ReferenceCounted, ZeroCrossing};
use crate::runner::DisposerRunner;
use crate::slot::{Opaque, OpaqueSlot, VariableSlots};
use crate::state::{ContextShared, DEFAULT_MAX_PARTITIONS, PRIORITY_MIN};
use crate::sync::{Arc, AtomicBool, Ordering};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;
use tracing::{debug, trace};

/// Callback run once at the end of a context's life, typically freeing its key lane.
/// 在上下文生命周期结束时运行一次的回调，通常用于释放其 key 通道。
pub type Disposer<R, K> = std::sync::Arc<dyn Fn(&RecordContext<R, K>) + Send + Sync>;

/// Diagnostic view of where a context is in its lifecycle.
///
/// Snapshot only: by the time the caller looks at it, another thread may
/// already have moved the context on.
///
/// 上下文所处生命周期阶段的诊断视图，仅为快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Count is zero and has never crossed zero (freshly created).
    /// 计数为零且从未穿越零点（刚创建）。
    Idle,
    /// At least one reference is held.
    /// 至少持有一个引用。
    Active,
    /// The unique 1 -> 0 transition happened. Terminal.
    /// 唯一的 1 -> 0 转换已经发生，终止状态。
    Disposed,
}

/// Builder for configuring a [`RecordContext`].
///
/// Modelled on the defaults the dispatcher wants most of the time:
/// - `priority`: [`PRIORITY_MIN`]
/// - `variable_count`: `0`
/// - `initial_ref_count`: `0` (the creator performs the first `retain()`)
/// - `partition_id`: derived from the key over [`DEFAULT_MAX_PARTITIONS`]
///
/// # Example
/// ```
/// use record_context::{Epoch, RecordContext};
///
/// let ctx = RecordContext::builder("payload", 7u64, Epoch::new(1), |_ctx| {})
///     .priority(5)
///     .variable_count(2)
///     .build();
/// assert_eq!(ctx.priority(), 5);
/// assert_eq!(ctx.variable_count(), 2);
/// ```
///
/// 用于配置 [`RecordContext`] 的构建器。
pub struct RecordContextBuilder<R, K> {
    record: R,
    key: K,
    epoch: std::sync::Arc<Epoch>,
    disposer: Disposer<R, K>,
    partition_id: Option<u32>,
    max_partitions: NonZeroU32,
    priority: i32,
    variables: Option<VariableSlots>,
    variable_count: usize,
    initial_ref_count: usize,
}

impl<R, K> RecordContextBuilder<R, K> {
    /// Set the partition id explicitly instead of deriving it from the key.
    /// 显式设置分区 id，而不是从 key 推导。
    #[inline]
    pub fn partition_id(mut self, partition_id: u32) -> Self {
        self.partition_id = Some(partition_id);
        self
    }

    /// Partition count used when the partition id is derived from the key.
    ///
    /// Ignored if [`partition_id`](Self::partition_id) is set.
    ///
    /// Default: `128`
    #[inline]
    pub fn max_partitions(mut self, max_partitions: NonZeroU32) -> Self {
        self.max_partitions = max_partitions;
        self
    }

    #[inline]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declare how many variable slots the context carries.
    ///
    /// Ignored if pre-built slots are supplied with [`variables`](Self::variables).
    ///
    /// 声明上下文携带多少个变量槽。
    #[inline]
    pub fn variable_count(mut self, count: usize) -> Self {
        self.variable_count = count;
        self
    }

    /// Build the context over pre-built (possibly shared) variable slots.
    /// 在预先构建的（可能共享的）变量槽上构建上下文。
    #[inline]
    pub fn variables(mut self, variables: VariableSlots) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Start with `count` references already held.
    ///
    /// Default: `0`
    #[inline]
    pub fn initial_ref_count(mut self, count: usize) -> Self {
        self.initial_ref_count = count;
        self
    }

    pub fn build(self) -> RecordContext<R, K>
    where
        K: Hash,
    {
        let partition_id = self
            .partition_id
            .unwrap_or_else(|| assign_to_partition(&self.key, self.max_partitions));
        let variables = self
            .variables
            .unwrap_or_else(|| VariableSlots::new(self.variable_count));

        RecordContext {
            shared: Arc::new(ContextShared {
                record: self.record,
                key: self.key,
                partition_id,
                epoch: self.epoch,
                priority: self.priority,
                ref_count: RefCount::new(self.initial_ref_count),
                key_occupied: AtomicBool::new(false),
                variables,
                namespaces: Namespaces::new(),
                extra: OpaqueSlot::new(),
                disposer: self.disposer,
            }),
        }
    }
}

/// The context shared by every asynchronous continuation of one record.
///
/// `RecordContext` is a cheap handle: cloning it shares the same context and
/// does **not** touch the logical reference count. The logical count is
/// driven only through [`ReferenceCounted::retain`] and
/// [`ReferenceCounted::release`]; the dispatcher retains once per scheduled
/// continuation and each continuation releases once when it completes.
///
/// **Disposal**: the release that takes the count from 1 to 0 clears the
/// key-occupied flag and, if the flag was set, runs the disposer, either
/// inline or through the [`DisposerRunner`] passed to `release`. If the
/// context never occupied its key, reaching zero disposes nothing.
///
/// **Typical Usage**:
/// ```
/// use record_context::{Epoch, RecordContext, ReferenceCounted};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let disposed = Arc::new(AtomicUsize::new(0));
/// let counter = disposed.clone();
/// let ctx = RecordContext::new("record", 42u64, move |_ctx| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }, 3, Epoch::new(0), 0);
///
/// ctx.retain().unwrap();
/// ctx.set_key_occupied();
/// ctx.retain().unwrap();
///
/// ctx.release(None).unwrap();
/// assert_eq!(disposed.load(Ordering::SeqCst), 0);
/// ctx.release(None).unwrap();
/// assert_eq!(disposed.load(Ordering::SeqCst), 1);
/// assert!(!ctx.is_key_occupied());
/// ```
///
/// **Equality**: two contexts are equal iff their record, key and epoch are
/// equal. Partition id, priority, occupancy and count are ignored.
///
/// 同一记录的所有异步后续操作共享的上下文。
///
/// `RecordContext` 是一个廉价句柄：克隆它共享同一个上下文，**不会**改变逻辑引用计数。
/// 逻辑计数只通过 [`ReferenceCounted::retain`] 和 [`ReferenceCounted::release`] 驱动。
///
/// **释放**：把计数从 1 减到 0 的那次释放会清除 key 占用标记；
/// 如果标记曾被设置，则内联或通过传给 `release` 的 [`DisposerRunner`] 运行释放器。
/// 如果上下文从未占用其 key，到达零时不会释放任何东西。
///
/// **相等性**：当且仅当 record、key 和 epoch 相等时两个上下文相等。
pub struct RecordContext<R, K> {
    shared: Arc<ContextShared<R, K>>,
}

impl<R, K> RecordContext<R, K> {
    /// Create a context with no references held and minimum priority.
    ///
    /// 创建一个不持有引用、优先级最低的上下文。
    pub fn new<F>(
        record: R,
        key: K,
        disposer: F,
        partition_id: u32,
        epoch: impl Into<std::sync::Arc<Epoch>>,
        variable_count: usize,
    ) -> Self
    where
        K: Hash,
        F: Fn(&RecordContext<R, K>) + Send + Sync + 'static,
    {
        Self::builder(record, key, epoch, disposer)
            .partition_id(partition_id)
            .variable_count(variable_count)
            .build()
    }

    /// Create a builder for configuring a record context.
    /// 创建一个用于配置记录上下文的构建器。
    #[inline]
    pub fn builder<F>(
        record: R,
        key: K,
        epoch: impl Into<std::sync::Arc<Epoch>>,
        disposer: F,
    ) -> RecordContextBuilder<R, K>
    where
        F: Fn(&RecordContext<R, K>) + Send + Sync + 'static,
    {
        RecordContextBuilder {
            record,
            key,
            epoch: epoch.into(),
            disposer: std::sync::Arc::new(disposer),
            partition_id: None,
            max_partitions: DEFAULT_MAX_PARTITIONS,
            priority: PRIORITY_MIN,
            variables: None,
            variable_count: 0,
            initial_ref_count: 0,
        }
    }

    #[inline]
    pub fn record(&self) -> &R {
        &self.shared.record
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.shared.key
    }

    #[inline]
    pub fn partition_id(&self) -> u32 {
        self.shared.partition_id
    }

    #[inline]
    pub fn epoch(&self) -> &std::sync::Arc<Epoch> {
        &self.shared.epoch
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.shared.priority
    }

    /// Whether this context currently holds its key's lane.
    /// 此上下文当前是否持有其 key 的通道。
    #[inline]
    pub fn is_key_occupied(&self) -> bool {
        self.shared.key_occupied.load(Ordering::Acquire)
    }

    /// Mark the key as occupied by this context.
    ///
    /// Called once by the key-lane owner after it wins mutual exclusion for
    /// the key, before any state access under this context.
    ///
    /// 标记 key 已被此上下文占用。
    /// 由 key 通道的持有者在赢得该 key 的互斥之后、
    /// 在此上下文下进行任何状态访问之前调用一次。
    #[inline]
    pub fn set_key_occupied(&self) {
        self.shared.key_occupied.store(true, Ordering::Release);
    }

    /// Namespace last bound to `state` in this context, if any.
    /// 此上下文中最后绑定到 `state` 的命名空间（如果有）。
    #[inline]
    pub fn get_namespace<N: Clone + Send + Sync + 'static>(
        &self,
        state: &StateHandle<N>,
    ) -> Option<N> {
        self.shared.namespaces.get(state)
    }

    #[inline]
    pub fn set_namespace<N: Send + Sync + 'static>(
        &self,
        state: &StateHandle<N>,
        namespace: N,
    ) {
        self.shared.namespaces.set(state, namespace);
    }

    /// Read variable slot `index` as `T`. See [`VariableSlots::get`].
    #[inline]
    pub fn get_variable<T: Any + Send + Sync>(
        &self,
        index: usize,
    ) -> Result<Option<std::sync::Arc<T>>, ContextError> {
        self.shared.variables.get(index)
    }

    #[inline]
    pub fn set_variable<T: Any + Send + Sync>(
        &self,
        index: usize,
        value: T,
    ) -> Result<(), ContextError> {
        self.shared.variables.set(index, value)
    }

    #[inline]
    pub fn clear_variable(&self, index: usize) -> Result<(), ContextError> {
        self.shared.variables.clear(index)
    }

    #[inline]
    pub fn variable_count(&self) -> usize {
        self.shared.variables.len()
    }

    /// The variable slots backing this context, for building a follow-up
    /// context over the same variables.
    ///
    /// 此上下文背后的变量槽，用于在相同变量上构建后续上下文。
    #[inline]
    pub fn variables(&self) -> VariableSlots {
        self.shared.variables.clone()
    }

    /// Cache backend-specific data on the context. Last writer wins.
    ///
    /// 在上下文上缓存状态后端专用的数据，最后写入者获胜。
    #[inline]
    pub fn set_extra<T: Any + Send + Sync>(&self, extra: T) {
        self.shared.extra.set(Some(std::sync::Arc::new(extra)));
    }

    /// Cached extra data, if set and of type `T`.
    #[inline]
    pub fn get_extra<T: Any + Send + Sync>(&self) -> Option<std::sync::Arc<T>> {
        self.shared.extra.get_as::<T>()
    }

    #[inline]
    pub fn extra(&self) -> Option<Opaque> {
        self.shared.extra.get()
    }

    #[inline]
    pub fn clear_extra(&self) {
        self.shared.extra.set(None);
    }

    /// Lifecycle snapshot. Diagnostics only; never branch on it.
    /// 生命周期快照，仅用于诊断，不要基于它做分支。
    pub fn lifecycle(&self) -> Lifecycle {
        let ref_count = &self.shared.ref_count;
        if ref_count.is_disposed() {
            Lifecycle::Disposed
        } else if ref_count.current() == 0 {
            Lifecycle::Idle
        } else {
            Lifecycle::Active
        }
    }

    #[cfg(test)]
    pub(crate) fn namespaces_allocated(&self) -> bool {
        self.shared.namespaces.is_allocated()
    }
}

impl<R, K> Clone for RecordContext<R, K> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R, K> ReferenceCounted for RecordContext<R, K>
where
    R: Send + Sync + 'static,
    K: Send + Sync + 'static,
{
    type Runner = dyn DisposerRunner;

    #[inline]
    fn ref_count(&self) -> &RefCount {
        &self.shared.ref_count
    }

    fn reference_count_reached_zero(
        &self,
        _proof: ZeroCrossing,
        runner: Option<&dyn DisposerRunner>,
    ) {
        let partition = self.partition_id();
        let epoch = self.epoch().id();
        trace!(partition, epoch, "record context reached zero references");

        // Clear before disposing: nobody may see "occupied" once disposal begins.
        if !self.shared.key_occupied.swap(false, Ordering::AcqRel) {
            debug!(
                partition,
                epoch, "record context released without occupying its key"
            );
            return;
        }

        let disposer = std::sync::Arc::clone(&self.shared.disposer);
        match runner {
            Some(runner) => {
                debug!(partition, epoch, "handing record context disposer to runner");
                let context = self.clone();
                runner.run_disposer(Box::new(move || disposer(&context)));
            }
            None => disposer(self),
        }
    }
}

impl<R, K> RecordContext<R, K>
where
    R: Send + Sync + 'static,
    K: Send + Sync + 'static,
{
    /// Release one reference and, at zero, run the disposer on the calling thread.
    ///
    /// Shorthand for `release(None)`.
    ///
    /// 释放一个引用；到达零时在调用线程上运行释放器。等价于 `release(None)`。
    #[inline]
    pub fn release_inline(&self) -> Result<(), RefCountError> {
        self.release(None)
    }
}

impl<R: PartialEq, K: PartialEq> PartialEq for RecordContext<R, K> {
    fn eq(&self, other: &Self) -> bool {
        self.shared.record == other.shared.record
            && self.shared.key == other.shared.key
            && self.shared.epoch == other.shared.epoch
    }
}

impl<R: Eq, K: Eq> Eq for RecordContext<R, K> {}

impl<R: Hash, K: Hash> Hash for RecordContext<R, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.record.hash(state);
        self.shared.key.hash(state);
        self.shared.epoch.hash(state);
    }
}

impl<R: fmt::Debug, K: fmt::Debug> fmt::Debug for RecordContext<R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordContext")
            .field("record", &self.shared.record)
            .field("key", &self.shared.key)
            .field("partition", &self.shared.partition_id)
            .field("occupied", &self.is_key_occupied())
            .field("ref", &self.shared.ref_count.current())
            .field("epoch", &self.shared.epoch.id())
            .field("priority", &self.shared.priority)
            .finish()
    }
}
