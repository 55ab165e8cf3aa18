//! Upload quota ledger.
//!
//! One `u64` byte counter per username in the `uploadQuota` bucket. A user
//! without a counter has used nothing.

use tracing::{debug, info};

use crate::codec::{decode, encode};
use crate::db::{Bucket, Store};
use crate::error::{StoreError, StoreResult};
use crate::traits::UploadQuota;

const BUCKET: Bucket = Bucket::UPLOAD_QUOTA;

/// [`UploadQuota`] backed by a [`Store`]. The cap comes from
/// [`StoreOptions::quota_cap`](crate::db::StoreOptions::quota_cap).
#[derive(Clone, Debug)]
pub struct QuotaLedger {
    store: Store,
    cap: u64,
}

impl QuotaLedger {
    pub fn new(store: Store) -> Self {
        let cap = store.quota_cap();
        Self { store, cap }
    }
}

fn parse_usage(bytes: Option<Vec<u8>>, username: &str) -> StoreResult<u64> {
    match bytes {
        None => Ok(0),
        Some(bytes) => decode(&bytes).map_err(|e| e.corrupt(BUCKET, username)),
    }
}

impl UploadQuota for QuotaLedger {
    fn cap(&self) -> u64 {
        self.cap
    }

    fn charge(&self, username: &str, bytes: u64) -> StoreResult<u64> {
        self.store.update(|tx| {
            let used = parse_usage(tx.get(BUCKET, username)?, username)?;
            let total = used
                .checked_add(bytes)
                .filter(|total| *total <= self.cap)
                .ok_or_else(|| StoreError::OverQuota {
                    username: username.to_string(),
                    requested: bytes,
                    used,
                    cap: self.cap,
                })?;
            tx.put(BUCKET, username, &encode(&total)?)?;
            debug!(username, bytes, total, "upload charged");
            Ok(self.cap - total)
        })
    }

    fn usage(&self, username: &str) -> StoreResult<u64> {
        self.store
            .view(|tx| parse_usage(tx.get(BUCKET, username)?, username))
    }

    fn reset_all(&self) -> StoreResult<usize> {
        let cleared = self.store.update(|tx| tx.clear(BUCKET))?;
        info!(cleared, "upload quotas reset");
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreOptions;

    const MIB: u64 = 1 << 20;

    fn ledger() -> QuotaLedger {
        QuotaLedger::new(Store::in_memory(StoreOptions::default()).unwrap())
    }

    #[test]
    fn default_cap_is_ten_mib() {
        assert_eq!(ledger().cap(), 10 * MIB);
    }

    #[test]
    fn untracked_user_has_zero_usage() {
        assert_eq!(ledger().usage("john").unwrap(), 0);
    }

    #[test]
    fn charges_accumulate_until_the_cap() {
        let q = ledger();
        assert_eq!(q.charge("john", 5 * MIB).unwrap(), 5 * MIB);
        assert_eq!(q.charge("john", 2 * MIB).unwrap(), 3 * MIB);

        match q.charge("john", 4 * MIB).unwrap_err() {
            StoreError::OverQuota {
                username,
                requested,
                used,
                cap,
            } => {
                assert_eq!(username, "john");
                assert_eq!(requested, 4 * MIB);
                assert_eq!(used, 7 * MIB);
                assert_eq!(cap, 10 * MIB);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The rejected charge left nothing behind.
        assert_eq!(q.usage("john").unwrap(), 7 * MIB);
    }

    #[test]
    fn charging_exactly_the_cap_is_allowed() {
        let q = ledger();
        assert_eq!(q.charge("john", 10 * MIB).unwrap(), 0);
        assert!(q.charge("john", 1).is_err());
        assert_eq!(q.charge("john", 0).unwrap(), 0);
    }

    #[test]
    fn overflowing_charge_is_over_quota() {
        let q = ledger();
        q.charge("john", 1).unwrap();
        assert!(matches!(
            q.charge("john", u64::MAX),
            Err(StoreError::OverQuota { .. })
        ));
        assert_eq!(q.usage("john").unwrap(), 1);
    }

    #[test]
    fn users_are_independent() {
        let q = ledger();
        q.charge("john", 9 * MIB).unwrap();
        assert_eq!(q.charge("mary", 10 * MIB).unwrap(), 0);
    }

    #[test]
    fn reset_restores_the_full_budget() {
        let q = ledger();
        q.charge("john", 7 * MIB).unwrap();
        q.charge("mary", 1).unwrap();
        assert_eq!(q.reset_all().unwrap(), 2);
        assert_eq!(q.usage("john").unwrap(), 0);
        assert_eq!(q.charge("john", 10 * MIB).unwrap(), 0);
        assert_eq!(q.reset_all().unwrap(), 1);
    }

    #[test]
    fn custom_cap() {
        let store = Store::in_memory(StoreOptions {
            quota_cap: 100,
            ..StoreOptions::default()
        })
        .unwrap();
        let q = QuotaLedger::new(store);
        assert_eq!(q.charge("john", 60).unwrap(), 40);
        assert!(q.charge("john", 41).is_err());
    }

    #[test]
    fn corrupt_counter_is_reported() {
        let q = ledger();
        q.store.update(|tx| tx.put(BUCKET, "john", b"xyz")).unwrap();
        assert!(matches!(q.usage("john"), Err(StoreError::CorruptRecord { .. })));
        assert!(matches!(
            q.charge("john", 1),
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
