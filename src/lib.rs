//! Reference-counted record contexts for asynchronous keyed state access.
//!
//! A single record may schedule many asynchronous continuations that all
//! touch the same per-record data. [`RecordContext`] tracks how many of them
//! are still in flight, disposes exactly once when the last one finishes,
//! and carries the key-occupancy flag the key-lane owner uses to enforce
//! one logical owner per key. Nothing on the hot path blocks.
//!
//! - [`RefCount`] / [`ReferenceCounted`]: the non-blocking retain/release
//!   primitive with an exactly-once zero-crossing hook.
//! - [`RecordContext`]: payload, key, partition id, [`Epoch`], priority,
//!   variable slots, per-state namespaces and an extra cache slot.
//! - [`DisposerRunner`]: decides which execution lane runs the disposer
//!   ([`InlineRunner`], [`MailboxRunner`] or any closure).
//!
//! ```
//! use record_context::{Epoch, MailboxRunner, RecordContext, ReferenceCounted};
//!
//! let runner = MailboxRunner::new();
//! let ctx = RecordContext::builder(("order", 17), 17u64, Epoch::new(3), |ctx| {
//!     assert!(!ctx.is_key_occupied());
//! })
//! .variable_count(1)
//! .build();
//!
//! // Dispatcher: first acquisition, then win the key lane.
//! ctx.retain().unwrap();
//! ctx.set_key_occupied();
//!
//! // One continuation scheduled, then both references complete.
//! ctx.retain().unwrap();
//! ctx.release(Some(&runner)).unwrap();
//! ctx.release(Some(&runner)).unwrap();
//!
//! assert_eq!(runner.drain(), 1);
//! ```
//!
//! 用于异步 keyed 状态访问的引用计数记录上下文。
//! 一条记录可能调度许多访问同一份记录数据的异步后续操作。
//! [`RecordContext`] 跟踪仍在进行中的数量，在最后一个完成时恰好释放一次，
//! 并携带 key 通道持有者用来保证每个 key 只有一个逻辑所有者的占用标记。
//! 热路径上没有任何阻塞。

mod context;
mod epoch;
mod error;
mod namespace;
mod partition;
mod ref_count;
mod runner;
mod slot;
mod state;
mod sync;

pub use context::{Disposer, Lifecycle, RecordContext, RecordContextBuilder};
pub use epoch::Epoch;
pub use error::{ContextError, RefCountError};
pub use namespace::{StateHandle, StateId};
pub use partition::assign_to_partition;
pub use ref_count::{RefCount, ReferenceCounted, Released, ZeroCrossing};
pub use runner::{DisposeTask, DisposerRunner, InlineRunner, MailboxRunner};
pub use slot::{Opaque, OpaqueSlot, VariableSlots};
pub use state::{DEFAULT_MAX_PARTITIONS, PRIORITY_MIN};

#[cfg(test)]
mod tests;
