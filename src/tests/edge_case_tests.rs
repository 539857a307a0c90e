/// 边界情况和属性测试模块
/// 测试相等性、诊断输出、共享变量、惰性命名空间和随机交错
use super::counted_context;
use crate::{Epoch, RecordContext, ReferenceCounted, StateHandle, VariableSlots};
use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// 测试1: 相等性只比较 record、key 和 epoch
#[test]
fn test_equality_ignores_partition_priority_occupancy_count() {
    let a = RecordContext::builder("rec", 5u64, Epoch::new(1), |_ctx| {})
        .partition_id(1)
        .priority(0)
        .build();
    let b = RecordContext::builder("rec", 5u64, Epoch::new(1), |_ctx| {})
        .partition_id(99)
        .priority(10)
        .initial_ref_count(3)
        .build();
    b.set_key_occupied();

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
}

/// 测试2: record、key 或 epoch 任一不同则不相等
#[test]
fn test_inequality_on_record_key_or_epoch() {
    let base = RecordContext::new("rec", 5u64, |_ctx| {}, 0, Epoch::new(1), 0);
    let other_record = RecordContext::new("other", 5u64, |_ctx| {}, 0, Epoch::new(1), 0);
    let other_key = RecordContext::new("rec", 6u64, |_ctx| {}, 0, Epoch::new(1), 0);
    let other_epoch = RecordContext::new("rec", 5u64, |_ctx| {}, 0, Epoch::new(2), 0);

    assert_ne!(base, other_record);
    assert_ne!(base, other_key);
    assert_ne!(base, other_epoch);
}

/// 测试3: 诊断输出包含计数和占用状态
#[test]
fn test_debug_includes_count_and_occupancy() {
    let (ctx, _) = counted_context("rec", 3, 0);
    ctx.retain().unwrap();
    ctx.retain().unwrap();
    ctx.set_key_occupied();

    let rendered = format!("{ctx:?}");
    assert!(rendered.contains("occupied: true"), "{rendered}");
    assert!(rendered.contains("ref: 2"), "{rendered}");
    assert!(rendered.contains("key: 3"), "{rendered}");
    assert!(rendered.contains("epoch: 1"), "{rendered}");
}

/// 测试4: 命名空间映射在第一次写入前不分配
#[test]
fn test_namespaces_lazily_allocated() {
    let (ctx, _) = counted_context("rec", 1, 0);
    let handle: StateHandle<u8> = StateHandle::new("lazy");

    assert_eq!(ctx.get_namespace(&handle), None);
    assert!(!ctx.namespaces_allocated());

    ctx.set_namespace(&handle, 1);
    assert!(ctx.namespaces_allocated());
}

/// 测试5: 后续上下文共享同一组变量槽
#[test]
fn test_follow_up_context_shares_variables() {
    let (first, _) = counted_context("rec", 1, 2);
    first.set_variable(0, 42u32).unwrap();

    let follow_up = RecordContext::builder("rec", 1u64, Epoch::new(2), |_ctx| {})
        .variables(first.variables())
        .variable_count(10)
        .build();

    // 预先构建的槽位优先于 variable_count
    assert_eq!(follow_up.variable_count(), 2);
    assert!(VariableSlots::ptr_eq(&first.variables(), &follow_up.variables()));
    assert_eq!(*follow_up.get_variable::<u32>(0).unwrap().unwrap(), 42);

    follow_up.set_variable(1, 7i64).unwrap();
    assert_eq!(*first.get_variable::<i64>(1).unwrap().unwrap(), 7);
}

/// 测试6: 零个变量槽的上下文拒绝任何索引
#[test]
fn test_zero_variable_slots() {
    let (ctx, _) = counted_context("rec", 1, 0);
    assert!(ctx.get_variable::<u8>(0).is_err());
    assert!(ctx.clear_variable(0).is_err());
}

/// 测试7: 克隆句柄不改变逻辑引用计数
#[test]
fn test_clone_does_not_retain() {
    let (ctx, disposed) = counted_context("rec", 1, 0);
    ctx.retain().unwrap();
    ctx.set_key_occupied();

    let clones: Vec<_> = (0..5).map(|_| ctx.clone()).collect();
    assert_eq!(ctx.reference_count(), 1);

    clones[3].release(None).unwrap();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(!ctx.is_key_occupied());
}

/// 测试8: 释放器内部读取变量和命名空间
#[test]
fn test_disposer_sees_context_state() {
    let handle: StateHandle<u32> = StateHandle::new("ns");
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let inner = handle.clone();
    let ctx = RecordContext::builder("rec", 1u64, Epoch::new(0), move |ctx| {
        let var = ctx.get_variable::<usize>(0).unwrap().map(|v| *v).unwrap_or(0);
        let ns = ctx.get_namespace(&inner).unwrap_or(0) as usize;
        counter.store(var + ns, Ordering::SeqCst);
    })
    .variable_count(1)
    .build();

    ctx.retain().unwrap();
    ctx.set_key_occupied();
    ctx.set_variable(0, 40usize).unwrap();
    ctx.set_namespace(&handle, 2);
    ctx.release(None).unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 42);
}

proptest! {
    /// 属性: N 次 retain 之后以任意交错的 retain/release 归零，释放器恰好运行一次，且只在第 N 次 release 之后
    #[test]
    fn prop_n_retains_n_releases_dispose_once(
        n in 1usize..64,
        extra in proptest::collection::vec(any::<bool>(), 0..64),
    ) {
        let (ctx, disposed) = counted_context("rec", 1, 0);
        ctx.retain().unwrap();
        ctx.set_key_occupied();
        for _ in 1..n {
            ctx.retain().unwrap();
        }

        // 额外的 retain/release 对交错在中间
        let mut outstanding = n;
        for retain in extra {
            if retain {
                ctx.retain().unwrap();
                outstanding += 1;
            } else if outstanding > 1 {
                ctx.release(None).unwrap();
                outstanding -= 1;
            }
            prop_assert_eq!(disposed.load(Ordering::SeqCst), 0);
        }

        while outstanding > 1 {
            ctx.release(None).unwrap();
            outstanding -= 1;
            prop_assert_eq!(disposed.load(Ordering::SeqCst), 0);
        }
        ctx.release(None).unwrap();
        prop_assert_eq!(disposed.load(Ordering::SeqCst), 1);
        prop_assert!(ctx.release(None).is_err());
        prop_assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    /// 属性: 从未占用 key 时任意计数归零都不运行释放器
    #[test]
    fn prop_unoccupied_never_disposes(n in 1usize..64) {
        let (ctx, disposed) = counted_context("rec", 1, 0);
        for _ in 0..n {
            ctx.retain().unwrap();
        }
        for _ in 0..n {
            ctx.release(None).unwrap();
        }
        prop_assert_eq!(disposed.load(Ordering::SeqCst), 0);
    }
}
