use arc_swap::ArcSwapOption;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a partitioned-state handle.
/// 分区状态句柄的标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(u64);

impl StateId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Handle to one logical partitioned state whose namespace type is `N`.
///
/// Only the handle's identity matters to a record context: two handles are
/// equal iff they were cloned from the same [`StateHandle::new`] call.
///
/// 命名空间类型为 `N` 的某个逻辑分区状态的句柄。
/// 对记录上下文而言只关心句柄的标识：只有从同一次 [`StateHandle::new`]
/// 调用克隆而来的句柄才相等。
pub struct StateHandle<N> {
    id: StateId,
    name: Arc<str>,
    _namespace: PhantomData<fn() -> N>,
}

impl<N> StateHandle<N> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: StateId(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            _namespace: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<N> Clone for StateHandle<N> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            _namespace: PhantomData,
        }
    }
}

impl<N> PartialEq for StateHandle<N> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<N> Eq for StateHandle<N> {}

impl<N> Hash for StateHandle<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<N> fmt::Debug for StateHandle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("id", &self.id.0)
            .field("name", &self.name)
            .finish()
    }
}

/// Per-context namespace bindings, keyed by state handle identity.
///
/// The map is absent until the first write so contexts that never touch a
/// namespaced state allocate nothing. Reads load the current map without
/// locking; writes copy the map, insert and swap it in, retrying if another
/// writer got there first.
///
/// 每个上下文的命名空间绑定，以状态句柄标识为键。
/// 在第一次写入之前映射不存在，因此从不使用命名空间的上下文不会分配内存。
/// 读取无锁地加载当前映射；写入复制映射、插入并替换，若有其他写入者抢先则重试。
pub(crate) struct Namespaces {
    map: ArcSwapOption<HashMap<StateId, Arc<dyn Any + Send + Sync>>>,
}

impl Namespaces {
    pub(crate) fn new() -> Self {
        Self {
            map: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn get<N: Clone + 'static>(&self, state: &StateHandle<N>) -> Option<N> {
        let namespace = Arc::clone(self.map.load_full()?.get(&state.id)?);
        namespace.downcast_ref::<N>().cloned()
    }

    pub(crate) fn set<N: Send + Sync + 'static>(&self, state: &StateHandle<N>, namespace: N) {
        let namespace: Arc<dyn Any + Send + Sync> = Arc::new(namespace);
        self.map.rcu(|current| {
            let mut map = current.as_deref().cloned().unwrap_or_default();
            map.insert(state.id, Arc::clone(&namespace));
            Some(Arc::new(map))
        });
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.map.load().is_some()
    }
}
