//! 按用户的锁表
//!
//! 同一 user_id 的 读-改-写 串行化；不同用户互不阻塞。空闲条目在表变大时清理。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 超过该条目数时清理无人持有的锁
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某个用户的独占锁；持有期间其他同 key 的 acquire 会等待
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= PRUNE_THRESHOLD {
                let before = locks.len();
                // 只有表自身持有引用的条目才是空闲的
                locks.retain(|_, l| Arc::strong_count(l) > 1);
                tracing::debug!("Pruned {} idle key locks", before - locks.len());
            }
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// 当前表中条目数
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.acquire("u1").await;

        let locks2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire("u1").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire("u1").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("u2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }
}
