//! The root cache facade.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use casc_host_filesystem::ContentFiles;
use chrono::{Days, Local, NaiveDate};

use crate::batcher::{FlushReport, WriteBatcher};
use crate::build_info::{read_active_version, DEFAULT_BUILD_VERSION};
use crate::entry::{CacheEntry, StoredRecord, BOOTSTRAP_PATHS};
use crate::error::{CacheError, StoreError};
use crate::mutation::Mutation;
use crate::reconcile::{reconcile, LoadReport, Reconciliation};
use crate::root_store::RootStoreBackend;
use crate::settings::CacheSettings;

/// Effect of `RootCache::add_or_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Identical entry already indexed; nothing enqueued.
    Unchanged,
    /// Entry at the same path replaced.
    Updated,
    /// New path indexed.
    Inserted,
    /// New path indexed after soft-deleting the paths that held the same file data id.
    Renamed {
        /// Previous paths, sorted.
        from: Vec<String>,
    },
}

/// In-memory root index kept in sync with a backing store.
///
/// The cache has a single owner: the build pipeline drives it sequentially.
/// Mutations update the index immediately and are persisted on `save`.
pub struct RootCache {
    backend: Arc<dyn RootStoreBackend>,
    files: Arc<dyn ContentFiles>,
    build_info_path: PathBuf,
    settings: CacheSettings,
    index: HashMap<String, CacheEntry>,
    to_purge: HashSet<String>,
    writes: WriteBatcher,
    version: String,
    loaded: bool,
    cleaned: bool,
    last_load: LoadReport,
}

impl RootCache {
    /// Create a cache and load it from the backing store.
    ///
    /// # Arguments
    /// * `backend` - Backing store holding the persisted index
    /// * `files` - Content files to reconcile against
    /// * `build_info_path` - Location of the `.build.info` file
    /// * `settings` - Batching, purge and id settings
    ///
    /// # Errors
    /// Returns error if the settings are invalid or the store cannot be read.
    /// A store error here is fatal: the cache could not be verified.
    pub async fn open(
        backend: Arc<dyn RootStoreBackend>,
        files: Arc<dyn ContentFiles>,
        build_info_path: impl Into<PathBuf>,
        settings: CacheSettings,
    ) -> Result<Self, CacheError> {
        settings.validate()?;
        let writes: WriteBatcher =
            WriteBatcher::new(settings.batch_size, settings.failed_batch_policy);
        let mut cache: RootCache = Self {
            backend,
            files,
            build_info_path: build_info_path.into(),
            settings,
            index: HashMap::new(),
            to_purge: HashSet::new(),
            writes,
            version: DEFAULT_BUILD_VERSION.to_string(),
            loaded: false,
            cleaned: false,
            last_load: LoadReport::default(),
        };
        cache.load().await?;
        Ok(cache)
    }

    /// Load and reconcile the persisted index.
    ///
    /// Runs once per cache; later calls return the first load's report.
    ///
    /// # Errors
    /// Returns `CacheError::Store` if the store cannot be reached.
    pub async fn load(&mut self) -> Result<LoadReport, CacheError> {
        if self.loaded {
            return Ok(self.last_load.clone());
        }
        self.load_from_store().await
    }

    /// Persist pending changes, then replace the index with a fresh load.
    ///
    /// The index and queue are replaced only once the store has been read.
    /// Mutations that still failed to persist at that point are dropped with
    /// the old index.
    ///
    /// # Errors
    /// Returns `CacheError::Store` if the store cannot be reached. The current
    /// index and pending mutations are left untouched in that case.
    pub async fn reload(&mut self) -> Result<LoadReport, CacheError> {
        self.save().await;
        self.load_from_store().await
    }

    async fn load_from_store(&mut self) -> Result<LoadReport, CacheError> {
        log::info!("Loading cache...");
        let version: String = read_active_version(&self.build_info_path);
        let today: NaiveDate = current_date();

        let records: Vec<StoredRecord> = self.fetch_records().await.map_err(fatal)?;

        let Reconciliation {
            index,
            to_purge,
            mutations,
            mut report,
        } = reconcile(records, today, self.files.as_ref());

        if !self.writes.is_empty() {
            log::warn!(
                "Reloading with {} unsaved mutations discarded",
                self.writes.len()
            );
            self.writes.clear();
        }
        self.version = version;
        self.index = index;
        self.to_purge = to_purge;
        for mutation in mutations {
            self.writes.enqueue(mutation);
        }
        self.flush(today).await;

        report.swept = self.backend.purge_expired(today).await.map_err(fatal)?;

        log::info!(
            "Cache loaded for build {}: {} kept, {} marked for removal, {} purged, \
             {} pending purge, {} rows swept",
            self.version,
            report.kept,
            report.scheduled,
            report.purged,
            report.dropped,
            report.swept
        );

        self.loaded = true;
        self.last_load = report.clone();
        Ok(report)
    }

    /// Insert or replace an entry.
    ///
    /// The first call per cache deletes the previous bootstrap manifests from
    /// the output so the build regenerates them. If no entry exists at the
    /// path but others share its non-zero file data id, those are treated as
    /// the old location of a renamed file and soft-deleted.
    pub fn add_or_update(&mut self, entry: CacheEntry) -> Change {
        if !self.cleaned {
            self.clean();
            self.cleaned = true;
        }

        if let Some(existing) = self.index.get_mut(entry.path()) {
            if *existing == entry {
                return Change::Unchanged;
            }
            *existing = entry.clone();
            self.writes.enqueue(Mutation::Upsert(entry));
            return Change::Updated;
        }

        let mut renamed_from: Vec<String> = Vec::new();
        if !entry.is_bootstrap() {
            renamed_from = self
                .index
                .values()
                .filter(|e| e.file_data_id() == entry.file_data_id())
                .map(|e| e.path().to_string())
                .collect();
            renamed_from.sort_unstable();
            for old_path in &renamed_from {
                self.index.remove(old_path);
                self.writes.enqueue(Mutation::soft_delete(old_path.as_str()));
            }
        }

        self.index.insert(entry.path().to_string(), entry.clone());
        self.writes.enqueue(Mutation::Upsert(entry));

        if renamed_from.is_empty() {
            Change::Inserted
        } else {
            Change::Renamed { from: renamed_from }
        }
    }

    /// Soft-delete the entry at `path`.
    ///
    /// # Returns
    /// `true` if an entry was removed; absent paths enqueue nothing.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.index.remove(path) {
            Some(entry) => {
                self.writes.enqueue(Mutation::soft_delete(entry.path()));
                true
            }
            None => false,
        }
    }

    /// Persist pending changes.
    ///
    /// Store failures are logged, never returned; see `FlushReport`.
    pub async fn save(&mut self) -> FlushReport {
        self.flush(current_date()).await
    }

    /// Whether any entry is indexed.
    pub fn has_files(&self) -> bool {
        !self.index.is_empty()
    }

    /// Whether any entry has the given file data id.
    pub fn has_id(&self, file_data_id: u32) -> bool {
        self.index.values().any(|e| e.file_data_id() == file_data_id)
    }

    /// Highest file data id in the index, `0` when empty.
    pub fn max_id(&self) -> u32 {
        self.index
            .values()
            .map(CacheEntry::file_data_id)
            .max()
            .unwrap_or(0)
    }

    /// File data id to assign to the next new file.
    pub fn next_file_data_id(&self) -> u32 {
        self.max_id()
            .saturating_add(1)
            .max(self.settings.minimum_file_data_id)
    }

    /// All indexed entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.index.values()
    }

    /// Entry at `path`.
    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.index.get(path)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of mutations waiting for `save`.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Pending mutations in queue order.
    pub fn pending_mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.writes.pending()
    }

    /// Version of the active build, read at load.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Paths found scheduled for removal during the last load.
    pub fn to_purge(&self) -> &HashSet<String> {
        &self.to_purge
    }

    /// Counts from the last load.
    pub fn last_load(&self) -> &LoadReport {
        &self.last_load
    }

    /// Settings this cache was opened with.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Delete the output of the current bootstrap manifests.
    fn clean(&self) {
        for path in BOOTSTRAP_PATHS {
            let Some(entry) = self.index.get(path) else {
                continue;
            };
            match self.files.remove_output(entry.encoded_key()) {
                Ok(true) => {
                    log::info!("Removed previous {} output {}", path, entry.encoded_key())
                }
                Ok(false) => {}
                Err(e) => log::warn!("Failed to remove previous {} output: {}", path, e),
            }
        }
    }

    async fn fetch_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.backend.ensure_schema().await?;
        self.backend.load_all().await
    }

    async fn flush(&mut self, today: NaiveDate) -> FlushReport {
        let grace: Days = Days::new(u64::from(self.settings.purge_grace_days));
        let purge_at: NaiveDate = today.checked_add_days(grace).unwrap_or(NaiveDate::MAX);
        self.writes.flush(self.backend.as_ref(), purge_at).await
    }
}

/// Log a load-time store failure and wrap it as fatal.
fn fatal(err: StoreError) -> CacheError {
    log::error!(
        "Unable to connect to the root store (code {:?}): {}",
        err.code,
        err.message
    );
    CacheError::Store(err)
}

fn current_date() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ENCODING_MANIFEST_PATH, ROOT_MANIFEST_PATH};
    use crate::root_store::MemoryRootStore;
    use casc_host_common::{CdnLayout, ContentKey};
    use casc_host_filesystem::DiskContentFiles;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: Arc<MemoryRootStore>,
        files: Arc<DiskContentFiles>,
    }

    impl Fixture {
        fn new(records: Vec<StoredRecord>) -> Self {
            let dir: TempDir = tempfile::tempdir().unwrap();
            let files = Arc::new(DiskContentFiles::from_web_root(
                dir.path(),
                CdnLayout::default(),
            ));
            Self {
                dir,
                store: Arc::new(MemoryRootStore::with_records(records)),
                files,
            }
        }

        fn stage(&self, path: &str) {
            touch(&self.dir.path().join("Data").join(path));
        }

        async fn open(&self) -> RootCache {
            self.open_with(CacheSettings::default()).await
        }

        async fn open_with(&self, settings: CacheSettings) -> RootCache {
            RootCache::open(
                self.store.clone(),
                self.files.clone(),
                self.dir.path().join("SystemFiles/.build.info"),
                settings,
            )
            .await
            .unwrap()
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn entry(path: &str, id: u32) -> CacheEntry {
        entry_with_key(path, id, id as u8)
    }

    fn entry_with_key(path: &str, id: u32, key: u8) -> CacheEntry {
        CacheEntry::new(
            path,
            id,
            7,
            ContentKey::new([key; 16]),
            ContentKey::new([key ^ 0x80; 16]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_distinct_paths_counted() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;

        for i in 1..=20u32 {
            cache.add_or_update(entry(&format!("file{}.bin", i), i));
        }
        assert_eq!(cache.len(), 20);
        assert_eq!(cache.entries().count(), 20);
        assert!(cache.has_files());
    }

    #[tokio::test]
    async fn test_identical_add_is_noop() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;

        assert_eq!(cache.add_or_update(entry("a.bin", 1)), Change::Inserted);
        let pending: usize = cache.pending();
        assert_eq!(cache.add_or_update(entry("a.bin", 1)), Change::Unchanged);
        assert_eq!(cache.pending(), pending);
    }

    #[tokio::test]
    async fn test_changed_content_is_updated() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;

        cache.add_or_update(entry_with_key("a.bin", 1, 1));
        assert_eq!(cache.add_or_update(entry_with_key("a.bin", 1, 2)), Change::Updated);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.bin").unwrap().content_key(), &ContentKey::new([2; 16]));
        assert_eq!(cache.pending(), 2);
    }

    #[tokio::test]
    async fn test_same_id_new_path_is_rename() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;
        cache.add_or_update(entry("old/name.bin", 42));
        cache.save().await;
        assert_eq!(cache.pending(), 0);

        let change: Change = cache.add_or_update(entry("new/name.bin", 42));

        assert_eq!(
            change,
            Change::Renamed {
                from: vec!["old/name.bin".to_string()]
            }
        );
        assert!(cache.get("old/name.bin").is_none());
        assert!(cache.get("new/name.bin").is_some());
        let pending: Vec<&Mutation> = cache.pending_mutations().collect();
        assert_eq!(
            pending,
            vec![
                &Mutation::soft_delete("old/name.bin"),
                &Mutation::Upsert(entry("new/name.bin", 42)),
            ]
        );
    }

    #[tokio::test]
    async fn test_bootstrap_ids_never_rename() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;

        cache.add_or_update(entry(ROOT_MANIFEST_PATH, 0));
        assert_eq!(cache.add_or_update(entry(ENCODING_MANIFEST_PATH, 0)), Change::Inserted);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_remove() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;

        assert!(!cache.remove("absent.bin"));
        assert_eq!(cache.pending(), 0);

        cache.add_or_update(entry("a.bin", 1));
        cache.save().await;
        assert!(cache.remove("a.bin"));
        assert!(cache.get("a.bin").is_none());
        let pending: Vec<&Mutation> = cache.pending_mutations().collect();
        assert_eq!(pending, vec![&Mutation::soft_delete("a.bin")]);
    }

    #[tokio::test]
    async fn test_max_id_and_has_id() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;
        assert_eq!(cache.max_id(), 0);
        assert_eq!(cache.next_file_data_id(), 1);

        cache.add_or_update(entry(ROOT_MANIFEST_PATH, 0));
        cache.add_or_update(entry("five.bin", 5));
        cache.add_or_update(entry("twelve.bin", 12));
        cache.add_or_update(entry("three.bin", 3));

        assert_eq!(cache.max_id(), 12);
        assert!(cache.has_id(5));
        assert!(!cache.has_id(6));
        assert_eq!(cache.next_file_data_id(), 13);
    }

    #[tokio::test]
    async fn test_next_file_data_id_respects_minimum() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture
            .open_with(CacheSettings::default().with_minimum_file_data_id(1000))
            .await;
        cache.add_or_update(entry("a.bin", 12));
        assert_eq!(cache.next_file_data_id(), 1000);

        cache.add_or_update(entry("b.bin", 1500));
        assert_eq!(cache.next_file_data_id(), 1501);
    }

    #[tokio::test]
    async fn test_load_reconciles_and_flushes() {
        let today: NaiveDate = current_date();
        let fixture: Fixture = Fixture::new(vec![
            StoredRecord::live(entry("present.bin", 1)),
            StoredRecord::live(entry("missing.bin", 2)),
            StoredRecord::scheduled(entry("expired.bin", 3), today - Days::new(1)),
        ]);
        fixture.stage("present.bin");

        let cache: RootCache = fixture.open().await;

        assert_eq!(cache.len(), 1);
        assert!(cache.get("present.bin").is_some());
        assert!(cache.to_purge().contains("missing.bin"));
        assert!(cache.to_purge().contains("expired.bin"));
        assert_eq!(cache.pending(), 0);
        assert_eq!(fixture.store.batch_sizes(), vec![1]);

        let missing: StoredRecord = fixture.store.get("missing.bin").unwrap();
        assert_eq!(missing.purge_at, Some(today + Days::new(7)));
        // purge sweep removed the elapsed row
        assert!(fixture.store.get("expired.bin").is_none());
        assert_eq!(cache.last_load().swept, 1);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let fixture: Fixture = Fixture::new(vec![StoredRecord::live(entry("missing.bin", 2))]);
        let mut cache: RootCache = fixture.open().await;
        let first: LoadReport = cache.last_load().clone();

        let again: LoadReport = cache.load().await.unwrap();
        assert_eq!(again, first);
        assert_eq!(fixture.store.batch_sizes(), vec![1]);
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal() {
        let fixture: Fixture = Fixture::new(Vec::new());
        fixture.store.set_unavailable(true);

        let result: Result<RootCache, CacheError> = RootCache::open(
            fixture.store.clone(),
            fixture.files.clone(),
            fixture.dir.path().join(".build.info"),
            CacheSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(CacheError::Store(_))));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let result: Result<RootCache, CacheError> = RootCache::open(
            fixture.store.clone(),
            fixture.files.clone(),
            fixture.dir.path().join(".build.info"),
            CacheSettings::default().with_batch_size(0),
        )
        .await;
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_version_read_at_load() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let cache: RootCache = fixture.open().await;
        assert_eq!(cache.version(), DEFAULT_BUILD_VERSION);

        let info_path = fixture.dir.path().join("SystemFiles/.build.info");
        touch(&info_path);
        std::fs::write(&info_path, "Active!DEC:1|Version!STRING:0\n1|7.3.5.26972\n").unwrap();
        let cache: RootCache = fixture.open().await;
        assert_eq!(cache.version(), "7.3.5.26972");
    }

    #[tokio::test]
    async fn test_first_mutation_cleans_bootstrap_output() {
        let root: CacheEntry = entry_with_key(ROOT_MANIFEST_PATH, 0, 0x10);
        let encoding: CacheEntry = entry_with_key(ENCODING_MANIFEST_PATH, 0, 0x20);
        let fixture: Fixture = Fixture::new(vec![
            StoredRecord::live(root.clone()),
            StoredRecord::live(encoding.clone()),
        ]);
        let root_output = fixture.files.output_path(root.encoded_key());
        let encoding_output = fixture.files.output_path(encoding.encoded_key());
        touch(&root_output);
        touch(&encoding_output);

        let mut cache: RootCache = fixture.open().await;
        assert!(root_output.exists());

        cache.add_or_update(entry("a.bin", 1));
        assert!(!root_output.exists());
        assert!(!encoding_output.exists());

        // Regenerated manifests are not cleaned again
        let new_root: CacheEntry = entry_with_key(ROOT_MANIFEST_PATH, 0, 0x30);
        let new_root_output = fixture.files.output_path(new_root.encoded_key());
        touch(&new_root_output);
        cache.add_or_update(new_root);
        cache.add_or_update(entry("b.bin", 2));
        assert!(new_root_output.exists());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_index_and_requeues() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;
        cache.add_or_update(entry("a.bin", 1));

        fixture.store.fail_next_batches(1);
        let report: FlushReport = cache.save().await;
        assert_eq!(report.failed_batches, 1);
        assert!(cache.get("a.bin").is_some());
        assert_eq!(cache.pending(), 1);

        let report: FlushReport = cache.save().await;
        assert!(report.is_clean());
        assert!(fixture.store.get("a.bin").is_some());
    }

    #[tokio::test]
    async fn test_reload_picks_up_saved_state() {
        let fixture: Fixture = Fixture::new(Vec::new());
        fixture.stage("kept.bin");
        let mut cache: RootCache = fixture.open().await;
        cache.add_or_update(entry("kept.bin", 1));
        cache.add_or_update(entry("unstaged.bin", 2));

        let report: LoadReport = cache.reload().await.unwrap();

        assert_eq!(report.kept, 1);
        assert_eq!(report.scheduled, 1);
        assert!(cache.get("kept.bin").is_some());
        assert!(cache.to_purge().contains("unstaged.bin"));
    }

    #[tokio::test]
    async fn test_add_after_soft_delete_revives_row() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;
        cache.add_or_update(entry("a.bin", 1));
        cache.remove("a.bin");
        cache.save().await;
        assert!(fixture.store.get("a.bin").unwrap().purge_at.is_some());

        cache.add_or_update(entry("a.bin", 1));
        cache.save().await;
        assert_eq!(fixture.store.get("a.bin").unwrap().purge_at, None);
    }

    #[tokio::test]
    async fn test_reload_during_outage_keeps_unsaved_changes() {
        let fixture: Fixture = Fixture::new(Vec::new());
        let mut cache: RootCache = fixture.open().await;
        cache.add_or_update(entry("a.bin", 1));

        fixture.store.set_unavailable(true);
        let result: Result<LoadReport, CacheError> = cache.reload().await;
        assert!(matches!(result, Err(CacheError::Store(_))));
        assert!(cache.get("a.bin").is_some());
        assert_eq!(cache.pending(), 1);

        fixture.store.set_unavailable(false);
        let report: FlushReport = cache.save().await;
        assert_eq!(report.applied, 1);
        assert!(fixture.store.get("a.bin").is_some());
    }

    #[tokio::test]
    async fn test_load_restores_scheduled_bootstrap_row() {
        let today: NaiveDate = current_date();
        let root: CacheEntry = entry(ROOT_MANIFEST_PATH, 0);
        let fixture: Fixture = Fixture::new(vec![StoredRecord::scheduled(
            root.clone(),
            today - Days::new(1),
        )]);

        let cache: RootCache = fixture.open().await;

        assert_eq!(cache.get(ROOT_MANIFEST_PATH), Some(&root));
        assert_eq!(cache.last_load().restored, 1);
        assert_eq!(cache.last_load().swept, 0);
        assert_eq!(fixture.store.get(ROOT_MANIFEST_PATH), Some(StoredRecord::live(root)));
    }
}
