use crate::error::ContextError;
use arc_swap::ArcSwapOption;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Type-erased shared value stored in a context slot.
/// 存放在上下文槽位中的类型擦除共享值。
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// A single lock-free, last-writer-wins cell holding an optional [`Opaque`].
///
/// Concurrent writers race and the last store wins. Callers needing more
/// than that synchronize externally (normally through key-lane exclusion).
///
/// 单个无锁、最后写入者获胜的单元，保存一个可选的 [`Opaque`]。
pub struct OpaqueSlot {
    value: ArcSwapOption<Opaque>,
}

impl OpaqueSlot {
    #[inline]
    pub fn new() -> Self {
        Self {
            value: ArcSwapOption::empty(),
        }
    }

    #[inline]
    pub fn get(&self) -> Option<Opaque> {
        self.value.load_full().map(|v| Opaque::clone(&v))
    }

    #[inline]
    pub fn set(&self, value: Option<Opaque>) {
        self.value.store(value.map(Arc::new));
    }

    /// Typed read. Absent if unset or holding a different type.
    /// 类型化读取。未设置或类型不同时返回 None。
    #[inline]
    pub fn get_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get().and_then(|v| v.downcast::<T>().ok())
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.value.load().is_some()
    }
}

impl Default for OpaqueSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OpaqueSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Fixed-size array of variable slots, sized once at build time.
///
/// Slot indices are assigned by the framework when the pipeline is built, so
/// the array never grows. Cloning shares the same slots: a follow-up context
/// for the same record can be built over them with
/// [`RecordContextBuilder::variables`](crate::RecordContextBuilder::variables).
///
/// **Example**:
/// ```
/// use record_context::{ContextError, VariableSlots};
///
/// let vars = VariableSlots::new(1);
/// vars.set(0, 7u32).unwrap();
/// assert_eq!(*vars.get::<u32>(0).unwrap().unwrap(), 7);
/// assert!(matches!(
///     vars.get::<u32>(1),
///     Err(ContextError::UndeclaredVariable { index: 1, declared: 1 })
/// ));
/// ```
///
/// 固定大小的变量槽数组，在构建时一次性确定大小。
/// 槽位索引在构建流水线时由框架分配，因此数组永不增长。
/// 克隆会共享相同的槽位。
#[derive(Clone)]
pub struct VariableSlots {
    slots: Arc<[OpaqueSlot]>,
}

impl VariableSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| OpaqueSlot::new()).collect(),
        }
    }

    /// Declared number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether both handles address the same underlying slots.
    /// 两个句柄是否指向同一组底层槽位。
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.slots, &other.slots)
    }

    fn slot(&self, index: usize) -> Result<&OpaqueSlot, ContextError> {
        self.slots.get(index).ok_or_else(|| {
            error!(
                index,
                declared = self.slots.len(),
                "access to undeclared context variable"
            );
            ContextError::UndeclaredVariable {
                index,
                declared: self.slots.len(),
            }
        })
    }

    /// Read slot `index` as `T`.
    ///
    /// `Ok(None)` if the slot was never set or was cleared.
    ///
    /// # Errors
    /// - [`ContextError::UndeclaredVariable`] if `index` is out of range.
    /// - [`ContextError::VariableTypeMismatch`] if the slot holds another type.
    ///
    /// 以 `T` 类型读取第 `index` 个槽位。
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>, ContextError> {
        match self.slot(index)?.get() {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ContextError::VariableTypeMismatch { index }),
        }
    }

    /// Read slot `index` without committing to a type.
    pub fn get_opaque(&self, index: usize) -> Result<Option<Opaque>, ContextError> {
        Ok(self.slot(index)?.get())
    }

    /// Store `value` in slot `index`, replacing whatever was there.
    ///
    /// # Errors
    /// [`ContextError::UndeclaredVariable`] if `index` is out of range.
    pub fn set<T: Any + Send + Sync>(&self, index: usize, value: T) -> Result<(), ContextError> {
        self.slot(index)?.set(Some(Arc::new(value)));
        Ok(())
    }

    pub fn set_opaque(&self, index: usize, value: Opaque) -> Result<(), ContextError> {
        self.slot(index)?.set(Some(value));
        Ok(())
    }

    pub fn clear(&self, index: usize) -> Result<(), ContextError> {
        self.slot(index)?.set(None);
        Ok(())
    }
}

impl fmt::Debug for VariableSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}
