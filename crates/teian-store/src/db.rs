//! The transactional bucket store.
//!
//! [`Store`] wraps a single redb database file. Every bucket is a redb table
//! mapping string keys to encoded byte values; per-bucket ID sequences live in
//! a reserved table next to them.
//!
//! - [`Store::view`] runs a closure inside a read-only snapshot. Readers never
//!   block each other and never observe an in-flight writer.
//! - [`Store::update`] runs a closure inside the single write transaction.
//!   Concurrent writers queue. The transaction commits if the closure returns
//!   `Ok` and is rolled back in full if it returns `Err`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use redb::{
    Database, DatabaseError, ReadTransaction, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableError, WriteTransaction,
};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// Per-bucket sequence counters, keyed by bucket name.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("__sequences");

/// A named, key-ordered namespace inside the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bucket(&'static str);

impl Bucket {
    /// Username → list of suggestions.
    pub const SUGGESTIONS: Bucket = Bucket("suggestions");
    /// Decimal alias ID → alias.
    pub const ALIASES: Bucket = Bucket("aliases");
    /// Username → bytes uploaded since the last reset.
    pub const UPLOAD_QUOTA: Bucket = Bucket("uploadQuota");

    /// Buckets created on every open.
    pub const DEFAULTS: [Bucket; 3] = [Self::SUGGESTIONS, Self::ALIASES, Self::UPLOAD_QUOTA];

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        TableDefinition::new(self.0)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Settings fixed at store construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long to keep retrying while another process holds the file lock.
    pub open_timeout: Duration,
    /// Pause between open attempts.
    pub retry_interval: Duration,
    /// Upload bytes each user may charge between quota resets.
    pub quota_cap: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(250),
            quota_cap: 10 << 20, // 10 MiB
        }
    }
}

/// Handle to the embedded database.
///
/// Cloning is cheap and every clone refers to the same database. Open it once
/// at startup, hand clones to the repositories, and [`close`](Store::close)
/// it on shutdown after the repositories are dropped.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    buckets: Arc<RwLock<BTreeSet<Bucket>>>,
    options: StoreOptions,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file at `path` and create the default
    /// buckets.
    ///
    /// If another process holds the file, retries every
    /// `options.retry_interval` until `options.open_timeout` has passed, then
    /// fails with [`StoreError::Locked`].
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = open_with_retry(path, &options)?;
        let store = Self::init(db, options, Some(path.to_path_buf()))?;
        info!(path = %path.display(), quota_cap = store.options.quota_cap, "store opened");
        Ok(store)
    }

    /// A store that lives only in memory. Used by tests and embedders.
    pub fn in_memory(options: StoreOptions) -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, options, None)
    }

    fn init(db: Database, options: StoreOptions, path: Option<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            db: Arc::new(db),
            buckets: Arc::new(RwLock::new(BTreeSet::new())),
            options,
            path,
        };
        for bucket in Bucket::DEFAULTS {
            store.ensure_bucket(bucket)?;
        }
        Ok(store)
    }

    /// Create `bucket` if it does not exist yet. Existing buckets are left
    /// untouched.
    pub fn ensure_bucket(&self, bucket: Bucket) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(SEQUENCES)?;
        txn.open_table(bucket.table())?;
        txn.commit()?;
        self.buckets
            .write()
            .expect("bucket registry poisoned")
            .insert(bucket);
        debug!(%bucket, "bucket ready");
        Ok(())
    }

    pub fn quota_cap(&self) -> u64 {
        self.options.quota_cap
    }

    /// Run `f` inside a read-only snapshot transaction.
    pub fn view<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&ReadTx) -> StoreResult<T>,
    {
        let tx = ReadTx {
            txn: self.db.begin_read()?,
            buckets: self.known_buckets(),
        };
        f(&tx)
    }

    /// Run `f` inside the exclusive write transaction.
    ///
    /// All writes made by `f` become visible together when it returns `Ok`.
    /// When it returns `Err`, every write is discarded and the error is
    /// passed through.
    pub fn update<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut WriteTx) -> StoreResult<T>,
    {
        let mut tx = WriteTx {
            txn: self.db.begin_write()?,
            buckets: self.known_buckets(),
        };
        match f(&mut tx) {
            Ok(value) => {
                tx.txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = tx.txn.abort() {
                    warn!(error = %abort_err, "write transaction abort failed");
                }
                debug!(error = %e, "write transaction rolled back");
                Err(e)
            }
        }
    }

    /// Release the database file.
    ///
    /// Fails with [`StoreError::HandlesOutstanding`] while other clones of
    /// this handle are still alive; the store stays open in that case.
    pub fn close(self) -> StoreResult<()> {
        let path = self.path;
        match Arc::try_unwrap(self.db) {
            Ok(db) => {
                drop(db);
                match path {
                    Some(path) => info!(path = %path.display(), "store closed"),
                    None => info!("in-memory store closed"),
                }
                Ok(())
            }
            Err(db) => Err(StoreError::HandlesOutstanding(Arc::strong_count(&db) - 1)),
        }
    }

    fn known_buckets(&self) -> BTreeSet<Bucket> {
        self.buckets
            .read()
            .expect("bucket registry poisoned")
            .clone()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("buckets", &self.known_buckets())
            .field("quota_cap", &self.options.quota_cap)
            .finish()
    }
}

fn open_with_retry(path: &Path, options: &StoreOptions) -> StoreResult<Database> {
    let deadline = Instant::now() + options.open_timeout;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                if Instant::now() >= deadline {
                    return Err(StoreError::Locked {
                        path: path.to_path_buf(),
                        timeout: options.open_timeout,
                    });
                }
                warn!(path = %path.display(), attempt, "database locked by another process; retrying");
                thread::sleep(options.retry_interval);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn check_bucket(known: &BTreeSet<Bucket>, bucket: Bucket) -> StoreResult<()> {
    if known.contains(&bucket) {
        Ok(())
    } else {
        Err(StoreError::UnknownBucket(bucket.name()))
    }
}

fn table_error(bucket: Bucket) -> impl FnOnce(TableError) -> StoreError {
    move |e| match e {
        TableError::TableDoesNotExist(_) => StoreError::UnknownBucket(bucket.name()),
        e => e.into(),
    }
}

/// A read-only snapshot. Only valid inside [`Store::view`].
pub struct ReadTx {
    txn: ReadTransaction,
    buckets: BTreeSet<Bucket>,
}

impl ReadTx {
    /// Value stored under `key`, or `None` if the key was never written.
    pub fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_bucket(&self.buckets, bucket)?;
        let table = self.txn.open_table(bucket.table()).map_err(table_error(bucket))?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    /// Visit every entry of `bucket` in ascending key order. Stops at the
    /// first error returned by `f`.
    pub fn for_each<F>(&self, bucket: Bucket, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&str, &[u8]) -> StoreResult<()>,
    {
        check_bucket(&self.buckets, bucket)?;
        let table = self.txn.open_table(bucket.table()).map_err(table_error(bucket))?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            f(key.value(), value.value())?;
        }
        Ok(())
    }

    /// Number of keys in `bucket`.
    pub fn len(&self, bucket: Bucket) -> StoreResult<u64> {
        check_bucket(&self.buckets, bucket)?;
        let table = self.txn.open_table(bucket.table()).map_err(table_error(bucket))?;
        let len = table.len()?;
        Ok(len)
    }
}

/// The exclusive write transaction. Only valid inside [`Store::update`].
pub struct WriteTx {
    txn: WriteTransaction,
    buckets: BTreeSet<Bucket>,
}

impl WriteTx {
    /// Value stored under `key`, including writes made earlier in this
    /// transaction.
    pub fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_bucket(&self.buckets, bucket)?;
        let table = self.txn.open_table(bucket.table())?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    pub fn put(&mut self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
        check_bucket(&self.buckets, bucket)?;
        let mut table = self.txn.open_table(bucket.table())?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete(&mut self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        check_bucket(&self.buckets, bucket)?;
        let mut table = self.txn.open_table(bucket.table())?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }

    /// Visit every entry of `bucket` in ascending key order.
    pub fn for_each<F>(&self, bucket: Bucket, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&str, &[u8]) -> StoreResult<()>,
    {
        check_bucket(&self.buckets, bucket)?;
        let table = self.txn.open_table(bucket.table())?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            f(key.value(), value.value())?;
        }
        Ok(())
    }

    /// All keys of `bucket` in ascending order.
    pub fn keys(&self, bucket: Bucket) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        self.for_each(bucket, |key, _| {
            keys.push(key.to_string());
            Ok(())
        })?;
        Ok(keys)
    }

    /// Remove every key of `bucket`. Returns how many were removed. The
    /// bucket's sequence is left alone.
    pub fn clear(&mut self, bucket: Bucket) -> StoreResult<usize> {
        let keys = self.keys(bucket)?;
        let mut table = self.txn.open_table(bucket.table())?;
        for key in &keys {
            table.remove(key.as_str())?;
        }
        Ok(keys.len())
    }

    /// Next identifier for `bucket`: strictly increasing, never 0, and only
    /// consumed if this transaction commits.
    pub fn next_sequence(&mut self, bucket: Bucket) -> StoreResult<u64> {
        check_bucket(&self.buckets, bucket)?;
        let mut seqs = self.txn.open_table(SEQUENCES)?;
        let current = seqs.get(bucket.name())?.map(|v| v.value()).unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or(StoreError::SequenceExhausted(bucket.name()))?;
        seqs.insert(bucket.name(), next)?;
        Ok(next)
    }
}
