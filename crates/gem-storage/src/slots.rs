//! Asset slot consistency.
//!
//! A slot is a record field that owns stored files: a single path (icon,
//! photo, background, image) or an ordered list (infographics). Each
//! operation writes bytes first, then lets the caller commit the new record
//! state, and only then removes files the record no longer references.
//! Removals are best-effort: a failed delete is logged and leaves an orphan,
//! never a dangling reference.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::keys::AssetFolder;
use crate::traits::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("Infographic index {index} out of range; subgroup has {count}")]
    IndexOutOfRange { index: i64, count: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct AssetSlots {
    storage: Arc<dyn Storage>,
}

impl AssetSlots {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Replace a single-valued slot.
    ///
    /// `commit` receives the new path and must persist it. On success the
    /// previous file, if any, is discarded. If `commit` fails the new file is
    /// discarded and the record keeps pointing at the old one.
    pub async fn replace<T, E, F, Fut>(
        &self,
        folder: AssetFolder,
        original_filename: &str,
        data: Vec<u8>,
        previous: Option<&str>,
        commit: F,
    ) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let new_path = self.storage.upload(folder, original_filename, data).await?;

        match commit(new_path.clone()).await {
            Ok(value) => {
                if let Some(old) = previous.filter(|old| !old.is_empty() && *old != new_path) {
                    self.discard(old).await;
                }
                Ok(value)
            }
            Err(err) => {
                self.discard(&new_path).await;
                Err(err)
            }
        }
    }

    /// Add a file to a multi-valued slot. `commit` must append the path
    /// atomically on the record.
    pub async fn append<T, E, F, Fut>(
        &self,
        folder: AssetFolder,
        original_filename: &str,
        data: Vec<u8>,
        commit: F,
    ) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let new_path = self.storage.upload(folder, original_filename, data).await?;

        match commit(new_path.clone()).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.discard(&new_path).await;
                Err(err)
            }
        }
    }

    /// Remove the entry at `index` from a multi-valued slot.
    ///
    /// The index is validated against `current` before anything changes.
    /// `commit` receives the shortened list; the removed file is discarded
    /// only after it succeeds.
    pub async fn remove_at<T, E, F, Fut>(
        &self,
        current: &[String],
        index: i64,
        commit: F,
    ) -> Result<T, E>
    where
        E: From<SlotError>,
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let position = usize::try_from(index)
            .ok()
            .filter(|i| *i < current.len())
            .ok_or(SlotError::IndexOutOfRange {
                index,
                count: current.len(),
            })?;

        let mut remaining = current.to_vec();
        let removed = remaining.remove(position);

        let value = commit(remaining).await?;
        self.discard(&removed).await;
        Ok(value)
    }

    /// Best-effort delete of a file no record references any more.
    pub async fn discard(&self, path: &str) {
        if let Err(e) = self.storage.delete(path).await {
            tracing::warn!(
                path = %path,
                error = %e,
                "Failed to delete unreferenced asset, leaving orphan"
            );
        }
    }

    /// Best-effort delete of every asset owned by a deleted record.
    pub async fn discard_all<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let path = path.as_ref();
            if !path.is_empty() {
                self.discard(path).await;
            }
        }
    }
}

impl std::fmt::Debug for AssetSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetSlots").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ByteStream, StorageResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory storage whose deletes can be made to fail.
    #[derive(Default)]
    struct MemoryStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
        fail_deletes: AtomicBool,
    }

    impl MemoryStorage {
        fn failing_deletes() -> Self {
            let storage = Self::default();
            storage.fail_deletes.store(true, Ordering::SeqCst);
            storage
        }

        fn contains(&self, key: &str) -> bool {
            self.files.lock().unwrap().contains_key(key)
        }

        fn len(&self) -> usize {
            self.files.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        async fn upload_with_key(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
            self.files.lock().unwrap().insert(key.to_string(), data);
            Ok(())
        }

        async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
            let data = self.download(key).await?;
            Ok(Box::pin(futures::stream::once(async move {
                Ok(bytes::Bytes::from(data))
            })))
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StorageError::DeleteFailed(format!("injected failure for {key}")));
            }
            self.files.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            Ok(self.contains(key))
        }
    }

    #[derive(Debug, Error)]
    enum TestError {
        #[error("commit failed")]
        Commit,
        #[error(transparent)]
        Slot(#[from] SlotError),
        #[error(transparent)]
        Storage(#[from] StorageError),
    }

    fn slots(storage: &Arc<MemoryStorage>) -> AssetSlots {
        AssetSlots::new(storage.clone() as Arc<dyn Storage>)
    }

    #[tokio::test]
    async fn replace_discards_previous_file_after_commit() {
        let storage = Arc::new(MemoryStorage::default());
        let slots = slots(&storage);

        let first: String = slots
            .replace(AssetFolder::SubgroupIcons, "a.png", vec![1], None, |p| async move {
                Ok::<_, TestError>(p)
            })
            .await
            .unwrap();
        let second: String = slots
            .replace(
                AssetFolder::SubgroupIcons,
                "b.png",
                vec![2],
                Some(&first),
                |p| async move { Ok::<_, TestError>(p) },
            )
            .await
            .unwrap();

        assert!(!storage.contains(&first));
        assert!(storage.contains(&second));
        assert!(second.starts_with("subgrupos/icons/"));
    }

    #[tokio::test]
    async fn replace_keeps_record_consistent_when_old_delete_fails() {
        let storage = Arc::new(MemoryStorage::failing_deletes());
        storage
            .upload_with_key("membros/photos/old.jpg", vec![0])
            .await
            .unwrap();
        let slots = slots(&storage);

        let recorded: String = slots
            .replace(
                AssetFolder::MemberPhotos,
                "new.jpg",
                vec![1],
                Some("membros/photos/old.jpg"),
                |p| async move { Ok::<_, TestError>(p) },
            )
            .await
            .unwrap();

        // The record points at the new file; the old one is an orphan.
        assert!(storage.contains(&recorded));
        assert!(storage.contains("membros/photos/old.jpg"));
    }

    #[tokio::test]
    async fn failed_commit_discards_new_file_and_keeps_old() {
        let storage = Arc::new(MemoryStorage::default());
        storage
            .upload_with_key("membros/backgrounds/old.png", vec![0])
            .await
            .unwrap();
        let slots = slots(&storage);

        let result: Result<(), TestError> = slots
            .replace(
                AssetFolder::MemberBackgrounds,
                "new.png",
                vec![1],
                Some("membros/backgrounds/old.png"),
                |_| async { Err(TestError::Commit) },
            )
            .await;

        assert!(matches!(result, Err(TestError::Commit)));
        assert!(storage.contains("membros/backgrounds/old.png"));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn append_then_remove_middle_entry() {
        let storage = Arc::new(MemoryStorage::default());
        let slots = slots(&storage);
        let mut list: Vec<String> = Vec::new();

        for name in ["one.png", "two.png", "three.png"] {
            let path: String = slots
                .append(AssetFolder::SubgroupInfographics, name, vec![1], |p| async move {
                    Ok::<_, TestError>(p)
                })
                .await
                .unwrap();
            list.push(path);
        }
        let (p0, p1, p2) = (list[0].clone(), list[1].clone(), list[2].clone());

        let remaining: Vec<String> = slots
            .remove_at(&list, 1, |remaining| async move { Ok::<_, TestError>(remaining) })
            .await
            .unwrap();

        assert_eq!(remaining, vec![p0.clone(), p2.clone()]);
        assert!(storage.contains(&p0));
        assert!(!storage.contains(&p1));
        assert!(storage.contains(&p2));
    }

    #[tokio::test]
    async fn remove_out_of_range_reports_count_and_changes_nothing() {
        let storage = Arc::new(MemoryStorage::default());
        let slots = slots(&storage);
        let list = vec![
            "subgrupos/infographics/a.png".to_string(),
            "subgrupos/infographics/b.png".to_string(),
        ];
        for path in &list {
            storage.upload_with_key(path, vec![1]).await.unwrap();
        }

        for index in [2, 5, -1] {
            let result: Result<Vec<String>, TestError> = slots
                .remove_at(&list, index, |_| async { Err(TestError::Commit) })
                .await;
            match result {
                Err(TestError::Slot(SlotError::IndexOutOfRange { index: i, count })) => {
                    assert_eq!(i, index);
                    assert_eq!(count, 2);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        let message = SlotError::IndexOutOfRange { index: 5, count: 2 }.to_string();
        assert!(message.contains('5'));
        assert!(message.contains('2'));
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn remove_keeps_file_when_commit_fails() {
        let storage = Arc::new(MemoryStorage::default());
        let slots = slots(&storage);
        let list = vec!["subgrupos/infographics/a.png".to_string()];
        storage.upload_with_key(&list[0], vec![1]).await.unwrap();

        let result: Result<(), TestError> = slots
            .remove_at(&list, 0, |_| async { Err(TestError::Commit) })
            .await;

        assert!(result.is_err());
        assert!(storage.contains(&list[0]));
    }

    #[tokio::test]
    async fn concurrent_replace_last_commit_wins_and_loser_is_orphaned() {
        let storage = Arc::new(MemoryStorage::default());
        let old = "publicacoes/images/old.png";
        storage.upload_with_key(old, vec![0]).await.unwrap();
        let slots = slots(&storage);
        let record: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(Some(old.to_string())));

        // Both uploads land before either commit, and both read the same previous value.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let commit = |record: Arc<Mutex<Option<String>>>, barrier: Arc<tokio::sync::Barrier>| {
            move |p: String| async move {
                barrier.wait().await;
                *record.lock().unwrap() = Some(p.clone());
                Ok::<_, TestError>(p)
            }
        };

        let (a, b) = tokio::join!(
            slots.replace(
                AssetFolder::PublicationImages,
                "a.png",
                vec![1],
                Some(old),
                commit(record.clone(), barrier.clone()),
            ),
            slots.replace(
                AssetFolder::PublicationImages,
                "b.png",
                vec![2],
                Some(old),
                commit(record.clone(), barrier.clone()),
            ),
        );
        let (a, b): (String, String) = (a.unwrap(), b.unwrap());

        let winner = record.lock().unwrap().clone().unwrap();
        let loser = if winner == a { &b } else { &a };
        assert!(winner == a || winner == b);
        assert!(storage.contains(&winner));
        assert!(storage.contains(loser));
        assert!(!storage.contains(old));
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn discard_all_skips_empty_and_tolerates_failures() {
        let storage = Arc::new(MemoryStorage::failing_deletes());
        storage
            .upload_with_key("membros/photos/a.jpg", vec![1])
            .await
            .unwrap();
        let slots = slots(&storage);

        slots.discard_all(["membros/photos/a.jpg", ""]).await;

        assert!(storage.contains("membros/photos/a.jpg"));
    }
}
