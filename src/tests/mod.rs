mod edge_case_tests;

use crate::{Epoch, RecordContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 构建一个带计数释放器的上下文，返回上下文和释放次数计数器
pub(crate) fn counted_context(
    record: &'static str,
    key: u64,
    variable_count: usize,
) -> (RecordContext<&'static str, u64>, Arc<AtomicUsize>) {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = disposed.clone();
    let ctx = RecordContext::new(
        record,
        key,
        move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        0,
        Epoch::new(1),
        variable_count,
    );
    (ctx, disposed)
}
