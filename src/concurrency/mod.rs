//! 全部落定（all-settled）式并发扇出。

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

/// 一组任务的落定结果，成功与失败都按完成顺序记录。
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub successes: Vec<(K, T)>,
    pub failures: Vec<(K, E)>,
    /// 因取消而未完成的任务数。
    pub cancelled: usize,
}

impl<K, T, E> Settled<K, T, E> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            successes: Vec::with_capacity(capacity),
            failures: Vec::with_capacity(capacity),
            cancelled: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len() + self.cancelled
    }
}

/// 并发驱动所有任务直到全部完成，单个任务失败不影响其他任务。
///
/// 取消令牌触发后停止等待，剩余任务被丢弃并计入 `cancelled`。
pub async fn settle_all<K, T, E, Fut, I>(tasks: I, cancel: &CancellationToken) -> Settled<K, T, E>
where
    I: IntoIterator<Item = (K, Fut)>,
    Fut: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<_> = tasks
        .into_iter()
        .map(|(key, fut)| async move { (key, fut.await) })
        .collect();
    let mut settled = Settled::with_capacity(pending.len());

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                settled.cancelled = pending.len();
                break;
            }
            next = pending.next() => match next {
                Some((key, Ok(value))) => settled.successes.push((key, value)),
                Some((key, Err(err))) => settled.failures.push((key, err)),
                None => break,
            },
        }
    }

    settled
}
