use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::store::{page_bounds, DEFAULT_PAGE_SIZE};
use super::{LogError, LogId, LogRecord, LogStore};

/// In-memory [`LogStore`] for development and testing.
///
/// Records live in a map behind a mutex. Not durable: everything is lost on
/// restart.
#[derive(Clone)]
pub struct MemoryLogStore {
    inner: Arc<Mutex<Inner>>,
    default_page_size: u32,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<LogId, LogRecord>,
    resent: HashSet<LogId>,
    next_id: i64,
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(default_page_size: u32) -> Self {
        MemoryLogStore {
            inner: Arc::new(Mutex::new(Inner::default())),
            default_page_size: default_page_size.max(1),
        }
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn create(&self, record: &LogRecord) -> Result<LogId, LogError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = LogId::from(inner.next_id);
        inner.records.insert(id, record.clone().with_id(id));
        Ok(id)
    }

    async fn get(&self, id: LogId) -> Result<Option<LogRecord>, LogError> {
        Ok(self.inner.lock().await.records.get(&id).cloned())
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<Vec<LogRecord>, LogError> {
        let (offset, limit) = page_bounds(page, page_size, self.default_page_size);
        let inner = self.inner.lock().await;

        let mut records: Vec<&LogRecord> = inner.records.values().collect();
        records.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.id().cmp(&a.id()))
        });

        Ok(records
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, LogError> {
        Ok(self.inner.lock().await.records.len() as u64)
    }

    async fn set_error(&self, id: LogId, error: &str) -> Result<(), LogError> {
        if let Some(record) = self.inner.lock().await.records.get_mut(&id) {
            record.set_error(error);
        }
        Ok(())
    }

    async fn delete(&self, id: LogId) -> Result<bool, LogError> {
        let mut inner = self.inner.lock().await;
        inner.resent.remove(&id);
        Ok(inner.records.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<bool, LogError> {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
        inner.resent.clear();
        Ok(true)
    }

    async fn delete_by_recipient(&self, email: &str) -> Result<u64, LogError> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<LogId> = inner
            .records
            .iter()
            .filter(|(_, r)| r.is_addressed_to(email))
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            inner.records.remove(id);
            inner.resent.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn prune_before(&self, cutoff: OffsetDateTime) -> Result<u64, LogError> {
        let mut inner = self.inner.lock().await;
        let before = inner.records.len();
        inner.records.retain(|_, r| r.timestamp() >= cutoff);

        let Inner { records, resent, .. } = &mut *inner;
        resent.retain(|id| records.contains_key(id));

        Ok((before - records.len()) as u64)
    }

    async fn mark_resent(&self, id: LogId) -> Result<bool, LogError> {
        let mut inner = self.inner.lock().await;
        if !inner.records.contains_key(&id) {
            return Ok(false);
        }
        Ok(inner.resent.insert(id))
    }

    async fn is_resent(&self, id: LogId) -> Result<bool, LogError> {
        Ok(self.inner.lock().await.resent.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn record(subject: &str, to: &str) -> LogRecord {
        LogRecord::builder()
            .subject(subject)
            .body("body")
            .recipient(to)
            .build()
    }

    fn aged(subject: &str, age: time::Duration) -> LogRecord {
        LogRecord::builder()
            .subject(subject)
            .recipient("someone@example.com")
            .timestamp(OffsetDateTime::now_utc() - age)
            .build()
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let store = MemoryLogStore::new();
        let a = store.create(&record("a", "x@example.com")).await.unwrap();
        let b = store.create(&record("b", "x@example.com")).await.unwrap();

        assert_ne!(a, b);
        let stored = store.get(a).await.unwrap().unwrap();
        assert_eq!(stored.id(), Some(a));
        assert_eq!(stored.subject(), "a");
        assert!(store.get(LogId::from(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let store = MemoryLogStore::new();
        for n in 0..25 {
            let rec = aged(&format!("mail {n}"), time::Duration::minutes(100 - n));
            store.create(&rec).await.unwrap();
        }

        let first = store.list(1, 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].subject(), "mail 24");
        assert!(first.windows(2).all(|w| w[0].timestamp() >= w[1].timestamp()));

        assert_eq!(store.list(3, 10).await.unwrap().len(), 5);
        assert!(store.list(4, 10).await.unwrap().is_empty());
        assert_eq!(store.list(0, 10).await.unwrap(), first);
        assert_eq!(store.count_pages(10).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn equal_timestamps_order_by_id() {
        let store = MemoryLogStore::new();
        let at = OffsetDateTime::now_utc();
        let a = store
            .create(&LogRecord::builder().subject("a").timestamp(at).build())
            .await
            .unwrap();
        let b = store
            .create(&LogRecord::builder().subject("b").timestamp(at).build())
            .await
            .unwrap();

        let ids: Vec<_> = store
            .list(1, 10)
            .await
            .unwrap()
            .iter()
            .filter_map(LogRecord::id)
            .collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn empty_store_has_one_page() {
        let store = MemoryLogStore::new();
        assert_eq!(store.count_pages(10).await.unwrap(), 1);
        assert_eq!(store.count_pages(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_page_size_uses_default() {
        let store = MemoryLogStore::with_page_size(3);
        for n in 0..5 {
            store.create(&record(&n.to_string(), "x@example.com")).await.unwrap();
        }
        assert_eq!(store.list(1, 0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn set_error_overwrites() {
        let store = MemoryLogStore::new();
        let id = store.create(&record("a", "x@example.com")).await.unwrap();

        store.set_error(id, "first").await.unwrap();
        store.set_error(id, "second").await.unwrap();
        store.set_error(LogId::from(404), "ignored").await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.error(), Some("second"));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryLogStore::new();
        let id = store.create(&record("a", "x@example.com")).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_clears_records_and_ledger() {
        let store = MemoryLogStore::new();
        let id = store.create(&record("a", "x@example.com")).await.unwrap();
        store.mark_resent(id).await.unwrap();

        assert!(store.delete_all().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.is_resent(id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_recipient_matches_address() {
        let store = MemoryLogStore::new();
        store.create(&record("a", "Jane <jane@example.com>")).await.unwrap();
        store.create(&record("b", "JANE@example.com")).await.unwrap();
        store.create(&record("c", "john@example.com")).await.unwrap();

        assert_eq!(store.delete_by_recipient("jane@example.com").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn prune_removes_only_older_records() {
        let store = MemoryLogStore::new();
        let old = store
            .create(&aged("old", time::Duration::days(10)))
            .await
            .unwrap();
        let fresh = store
            .create(&aged("fresh", time::Duration::days(1)))
            .await
            .unwrap();
        store.mark_resent(old).await.unwrap();

        let removed = store.prune(Duration::from_secs(5 * 86_400)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(old).await.unwrap().is_none());
        assert!(store.get(fresh).await.unwrap().is_some());
        assert!(!store.is_resent(old).await.unwrap());
    }

    #[tokio::test]
    async fn prune_boundary_is_exclusive() {
        let store = MemoryLogStore::new();
        let at = OffsetDateTime::now_utc() - time::Duration::hours(1);
        let on = store
            .create(&LogRecord::builder().subject("on").timestamp(at).build())
            .await
            .unwrap();
        let before = store
            .create(
                &LogRecord::builder()
                    .subject("before")
                    .timestamp(at - time::Duration::seconds(1))
                    .build(),
            )
            .await
            .unwrap();

        assert_eq!(store.prune_before(at).await.unwrap(), 1);
        assert!(store.get(on).await.unwrap().is_some());
        assert!(store.get(before).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resent_ledger_is_set_once() {
        let store = MemoryLogStore::new();
        let id = store.create(&record("a", "x@example.com")).await.unwrap();

        assert!(!store.is_resent(id).await.unwrap());
        assert!(store.mark_resent(id).await.unwrap());
        assert!(!store.mark_resent(id).await.unwrap());
        assert!(store.is_resent(id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_id_is_never_marked_resent() {
        let store = MemoryLogStore::new();
        let missing = LogId::from(9999);

        assert!(!store.mark_resent(missing).await.unwrap());
        assert!(!store.is_resent(missing).await.unwrap());
    }

    #[tokio::test]
    async fn prune_older_than_any_timestamp_removes_nothing() {
        let store = MemoryLogStore::new();
        store.create(&record("a", "x@example.com")).await.unwrap();

        let removed = store
            .prune(Duration::from_secs(200_000 * 86_400))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
