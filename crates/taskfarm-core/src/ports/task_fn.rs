//! TaskFunction port - the function every worker applies to its tasks
//!
//! All workers in one farm are expected to run the same function; the protocol
//! does not check this.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;

/// TaskFunction は task の引数から結果を計算する
///
/// # 使用例
/// ```ignore
/// struct Cube;
///
/// #[async_trait]
/// impl TaskFunction<u64, u64> for Cube {
///     async fn call(&self, n: u64) -> Result<u64, TaskError> {
///         Ok(n * n * n)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskFunction<A: Send + 'static, R>: Send + Sync {
    async fn call(&self, args: A) -> Result<R, TaskError>;
}

#[async_trait]
impl<A, R, T> TaskFunction<A, R> for Arc<T>
where
    A: Send + 'static,
    T: TaskFunction<A, R> + ?Sized,
{
    async fn call(&self, args: A) -> Result<R, TaskError> {
        (**self).call(args).await
    }
}

/// Wraps a plain synchronous closure as a `TaskFunction`.
pub struct FnTask<F, A> {
    func: F,
    _marker: PhantomData<fn(A)>,
}

impl<F, A> FnTask<F, A> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, A, R> TaskFunction<A, R> for FnTask<F, A>
where
    F: Fn(A) -> Result<R, TaskError> + Send + Sync,
    A: Send + 'static,
    R: Send + 'static,
{
    async fn call(&self, args: A) -> Result<R, TaskError> {
        (self.func)(args)
    }
}
