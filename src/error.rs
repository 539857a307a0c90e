use thiserror::Error;

/// Usage errors raised by the reference-count primitive.
///
/// Both variants are defects in the caller. They are reported, never retried.
///
/// 引用计数原语抛出的使用错误。
/// 两种变体都是调用方的缺陷，只会被报告，不会被重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefCountError {
    /// `release()` was called while the count was already zero.
    /// 计数已经为零时调用了 `release()`。
    #[error("reference count released at zero: more releases than retains")]
    ReleasedAtZero,

    /// `retain()` was called after the zero-crossing already disposed the object.
    /// 零点穿越已经释放对象之后又调用了 `retain()`。
    #[error("reference count retained after disposal: objects are never reused")]
    RetainAfterDispose,
}

/// Errors raised by [`RecordContext`](crate::RecordContext) accessors.
///
/// 由 [`RecordContext`](crate::RecordContext) 访问器抛出的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Slot index outside the range declared when the context was built.
    /// 槽位索引超出构建上下文时声明的范围。
    #[error(
        "variable index {index} out of bounds (declared {declared}); \
         maybe you are accessing a variable that has not been declared"
    )]
    UndeclaredVariable { index: usize, declared: usize },

    /// Slot holds a value of a different concrete type than requested.
    /// 槽位中保存的值的具体类型与请求的类型不同。
    #[error("variable {index} holds a value of a different type")]
    VariableTypeMismatch { index: usize },

    #[error(transparent)]
    RefCount(#[from] RefCountError),
}
