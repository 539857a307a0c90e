use std::fmt;

/// Checkpoint-generation handle attached to every record context.
///
/// The epoch manager owns the lifecycle of epochs; this crate only needs an
/// immutable identifier for display, equality and ordering. Contexts created
/// within one checkpoint interval share the same epoch.
///
/// 附加在每个记录上下文上的检查点纪元句柄。
/// 纪元的生命周期由纪元管理器负责；本 crate 只需要一个不可变的标识符，
/// 用于显示、相等比较和排序。同一检查点间隔内创建的上下文共享同一个纪元。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch {
    id: u64,
}

impl Epoch {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    #[inline]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
