use crate::context::Disposer;
use crate::epoch::Epoch;
use crate::namespace::Namespaces;
use crate::ref_count::RefCount;
use crate::slot::{OpaqueSlot, VariableSlots};
use crate::sync::AtomicBool;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Priority of a context that asked for no boost.
/// 未请求提升的上下文的优先级。
pub const PRIORITY_MIN: i32 = 0;

/// Partition count used to derive a partition id when none is given.
/// 未指定分区 id 时用于推导分区 id 的分区数量。
pub const DEFAULT_MAX_PARTITIONS: NonZeroU32 = match NonZeroU32::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

/// Shared state behind every handle to one record context.
///
/// `ref_count` and `key_occupied` are atomics because continuations retain
/// and release while another thread holds the key. Everything else relies
/// on key-lane exclusion for write ordering.
///
/// 同一记录上下文所有句柄背后的共享状态。
/// `ref_count` 和 `key_occupied` 是原子的，因为在其他线程持有 key 时，
/// 后续操作仍会 retain 和 release。其余字段依赖 key 通道互斥来保证写入顺序。
pub(crate) struct ContextShared<R, K> {
    pub(crate) record: R,
    pub(crate) key: K,
    pub(crate) partition_id: u32,
    pub(crate) epoch: Arc<Epoch>,
    pub(crate) priority: i32,
    pub(crate) ref_count: RefCount,
    pub(crate) key_occupied: AtomicBool,
    pub(crate) variables: VariableSlots,
    pub(crate) namespaces: Namespaces,
    pub(crate) extra: OpaqueSlot,
    pub(crate) disposer: Disposer<R, K>,
}
