//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// 任务体可返回的装箱错误类型。
/// Boxed error type that task bodies may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The primary error type for the scheduling and execution library.
/// 调度与执行库的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The worker pool has been released (or is releasing) and no longer
    /// accepts submissions.
    /// 工作池已被释放（或正在释放），不再接受任务提交。
    #[error("worker pool is closed")]
    PoolClosed,

    /// The timing wheel has been stopped; its control loop no longer
    /// accepts requests.
    /// 时间轮已停止，其控制循环不再接受请求。
    #[error("timing wheel has been stopped")]
    WheelStopped,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::PoolClosed | Error::WheelStopped => ErrorKind::NotConnected.into(),
        }
    }
}
