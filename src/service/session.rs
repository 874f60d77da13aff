//! Per-wallet serialization.
//!
//! Every operation spends from the one custodial address, so two concurrent builds would
//! pick the same input. Holding the address lock for the whole list→build→submit sequence
//! turns that race into a queue.
//!
//! An address stays in the table only while some request holds or waits for its lock, so
//! callers presenting ever new seeds cannot grow it.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::ledger::Address;
use crate::observability::metrics;

type LockTable = DashMap<Address, Arc<Mutex<()>>>;

/// Lock table keyed by wallet address.
#[derive(Debug, Default, Clone)]
pub struct WalletSessions {
    locks: Arc<LockTable>,
}

/// Exclusive use of one wallet address until dropped.
#[derive(Debug)]
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    address: Address,
    locks: Arc<LockTable>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the table's own reference is the only one left when nobody waits
        self.locks
            .remove_if(&self.address, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl WalletSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `address`. The lock is released when the guard drops.
    pub async fn acquire(&self, address: &Address) -> SessionGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(address.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let start = Instant::now();
        let guard = lock.lock_owned().await;
        let waited = start.elapsed();
        metrics::record_session_wait(waited);
        tracing::debug!(
            address = %address,
            waited_ms = waited.as_millis() as u64,
            "Wallet session acquired"
        );
        SessionGuard {
            guard: Some(guard),
            address: address.clone(),
            locks: self.locks.clone(),
        }
    }

    /// Number of addresses currently held or waited for.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Network;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn address(byte: u8) -> Address {
        Address::enterprise(Network::Preprod, [byte; 28])
    }

    #[tokio::test]
    async fn test_same_address_is_serialized() {
        let sessions = WalletSessions::new();
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let sessions = sessions.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = sessions.acquire(&address(1)).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_addresses_do_not_block() {
        let sessions = WalletSessions::new();
        let _a = sessions.acquire(&address(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(200), sessions.acquire(&address(2))).await;
        assert!(b.is_ok());
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_released_addresses_leave_the_table() {
        let sessions = WalletSessions::new();
        for byte in 0..50u8 {
            let _guard = sessions.acquire(&address(byte)).await;
            assert_eq!(sessions.len(), 1);
        }
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_someone_waits() {
        let sessions = WalletSessions::new();
        let first = sessions.acquire(&address(1)).await;

        let waiter = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let _guard = sessions.acquire(&address(1)).await;
                sessions.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        // the waiter still finds its own entry while holding the lock
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(sessions.is_empty());
    }
}
