//! Session-scoped owner of the active conversation tree.
//!
//! Every mutation goes through `HistoryCoordinator`, which writes the tree
//! and refreshes the metadata index after each change.

use arbor_core::config::ArborConfig;
use arbor_core::error::Result;
use arbor_core::history::{
    AdvanceSettings, ConversationEntry, ConversationHistory, EditMode, HistoryRepository, NewEntry,
};
use arbor_core::index::{HistoryIndex, HistoryIndexEntry, HistoryIndexRepository};
use arbor_core::notice::Notifier;
use arbor_core::provider::ProviderRequest;
use arbor_core::sync::{FileReader, FileSyncOperation, SyncReport, sync_file_change_context};
use arbor_core::tool::ToolSchemaRegistry;
use std::sync::Arc;

/// Storage collaborators of a `HistoryCoordinator`.
#[derive(Clone)]
pub struct HistoryDeps {
    pub histories: Arc<dyn HistoryRepository>,
    pub index: Arc<dyn HistoryIndexRepository>,
    pub files: Arc<dyn FileReader>,
}

/// Session object owning the active conversation tree and the index.
///
/// `HistoryCoordinator` is responsible for:
/// - Persisting every mutation of the active tree (empty trees are never written)
/// - Keeping the metadata index in step with stored trees
/// - Switching, creating and deleting conversations without losing edits
/// - Running file reconciliation over the active branch
///
/// Storage faults never surface as errors here: they are reported through the
/// `Notifier` and the coordinator continues with a fallback (empty index,
/// default tree).
pub struct HistoryCoordinator {
    histories: Arc<dyn HistoryRepository>,
    index_repository: Arc<dyn HistoryIndexRepository>,
    files: Arc<dyn FileReader>,
    notifier: Notifier,
    config: ArborConfig,
    tools: ToolSchemaRegistry,
    active: ConversationHistory,
    index: HistoryIndex,
}

impl HistoryCoordinator {
    /// Loads the index and starts on a fresh default tree.
    ///
    /// A missing index file gives an empty index; an unreadable one is
    /// reported and also gives an empty index.
    pub async fn open(deps: HistoryDeps, config: ArborConfig, notifier: Notifier) -> Self {
        let index = match deps.index.load().await {
            Ok(index) => index,
            Err(err) => {
                notifier.error(format!("Failed to load conversation index: {}", err));
                HistoryIndex::new()
            }
        };
        tracing::info!(
            "[HistoryCoordinator] Opened with {} indexed conversation(s)",
            index.len()
        );

        let active = ConversationHistory::create_default(config.history.default_system_prompt.clone());
        Self {
            histories: deps.histories,
            index_repository: deps.index,
            files: deps.files,
            notifier,
            config,
            tools: ToolSchemaRegistry::with_builtins(),
            active,
            index,
        }
    }

    /// Replaces the schema registry used by `build_request`.
    pub fn with_tool_registry(mut self, tools: ToolSchemaRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn active(&self) -> &ConversationHistory {
        &self.active
    }

    pub fn index(&self) -> &HistoryIndex {
        &self.index
    }

    pub fn tools(&self) -> &ToolSchemaRegistry {
        &self.tools
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn default_tree(&self) -> ConversationHistory {
        ConversationHistory::create_default(self.config.history.default_system_prompt.clone())
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    /// Writes `history` to its keyed document. Returns `false` when nothing
    /// was written (empty tree or reported failure).
    pub async fn save(&self, history: &ConversationHistory) -> bool {
        if history.is_empty() {
            tracing::debug!("[HistoryCoordinator] Skipping save of empty tree {}", history.root);
            return false;
        }
        match self.histories.save(history).await {
            Ok(()) => {
                tracing::debug!(
                    "[HistoryCoordinator] Saved tree {} ({} entries)",
                    history.root,
                    history.entry_count()
                );
                true
            }
            Err(err) => {
                self.notifier
                    .error(format!("Failed to save conversation {}: {}", history.root, err));
                false
            }
        }
    }

    /// Reads the tree stored under `root`, or a default tree when it is
    /// missing or unreadable (both reported).
    pub async fn load(&self, root: &str) -> ConversationHistory {
        match self.histories.find_by_root(root).await {
            Ok(Some(history)) => history,
            Ok(None) => {
                self.notifier.warn(format!("Conversation {} not found", root));
                self.default_tree()
            }
            Err(err) => {
                self.notifier
                    .error(format!("Failed to load conversation {}: {}", root, err));
                self.default_tree()
            }
        }
    }

    /// Persists the outgoing tree, then loads and activates `root`.
    pub async fn switch_active(&mut self, root: &str) -> &ConversationHistory {
        tracing::debug!(
            "[HistoryCoordinator] Switching from {} to {}",
            self.active.root,
            root
        );
        self.save(&self.active).await;
        self.active = self.load(root).await;
        &self.active
    }

    /// Persists the outgoing tree and activates a fresh default one.
    pub async fn new_conversation(&mut self) -> &ConversationHistory {
        self.save(&self.active).await;
        self.active = self.default_tree();
        tracing::debug!("[HistoryCoordinator] Started conversation {}", self.active.root);
        &self.active
    }

    /// Removes the stored tree and its index record, then activates a fresh
    /// default tree. A failed file removal is reported, not fatal.
    pub async fn delete(&mut self, root: &str) {
        if self.active.root != root {
            self.save(&self.active).await;
        }
        if let Err(err) = self.histories.delete(root).await {
            self.notifier
                .error(format!("Failed to delete conversation {}: {}", root, err));
        }
        if self.index.remove(root).is_some() {
            self.save_index().await;
        }
        self.active = self.default_tree();
        tracing::info!("[HistoryCoordinator] Deleted conversation {}", root);
    }

    async fn save_index(&self) -> bool {
        match self.index_repository.save(&self.index).await {
            Ok(()) => true,
            Err(err) => {
                self.notifier
                    .error(format!("Failed to save conversation index: {}", err));
                false
            }
        }
    }

    /// Saves the active tree and refreshes its index record. A tree that
    /// became empty has its stored document and record removed instead.
    async fn persist_active(&mut self) {
        if self.active.is_empty() {
            self.discard_emptied_active().await;
            return;
        }
        if !self.save(&self.active).await {
            return;
        }

        let first_message = self
            .active
            .top
            .first()
            .and_then(|id| self.active.get(id))
            .map(|entry| entry.message.clone())
            .unwrap_or_default();
        if self.index.touch(
            &self.active.root,
            &first_message,
            self.config.history.title_max_chars,
        ) {
            tracing::debug!("[HistoryCoordinator] Indexed conversation {}", self.active.root);
        }
        self.save_index().await;
    }

    async fn discard_emptied_active(&mut self) {
        let root = self.active.root.clone();
        match self.histories.exists(&root).await {
            Ok(true) => {
                if let Err(err) = self.histories.delete(&root).await {
                    self.notifier
                        .error(format!("Failed to delete conversation {}: {}", root, err));
                }
            }
            Ok(false) => {}
            Err(err) => {
                self.notifier
                    .error(format!("Failed to check conversation {}: {}", root, err));
            }
        }
        if self.index.remove(&root).is_some() {
            self.save_index().await;
        }
        tracing::debug!("[HistoryCoordinator] Discarded emptied tree {}", root);
    }

    // ============================================================================
    // Tree mutations
    // ============================================================================

    /// Appends an entry to the active tree and persists it.
    ///
    /// An unresolvable `parent_id` is reported; the entry is still returned
    /// but the tree is left unchanged.
    pub async fn append_entry(&mut self, parent_id: Option<&str>, entry: NewEntry) -> ConversationEntry {
        let outcome = self.active.append_entry(parent_id, entry);
        if let Some(warning) = &outcome.warning {
            self.notifier
                .warn(format!("Entry was not added to the conversation: {}", warning));
            return outcome.entry;
        }
        self.persist_active().await;
        outcome.entry
    }

    /// Edits a past entry by branching: the edited text goes into a new
    /// sibling that becomes current. Returns the id carrying the edit.
    pub async fn edit_entry(&mut self, entry_id: &str, message: impl Into<String>) -> Option<String> {
        self.edit_entry_with_mode(entry_id, message, EditMode::Branch)
            .await
    }

    pub async fn edit_entry_with_mode(
        &mut self,
        entry_id: &str,
        message: impl Into<String>,
        mode: EditMode,
    ) -> Option<String> {
        match self.active.edit_entry(entry_id, message, mode) {
            Ok(id) => {
                self.persist_active().await;
                Some(id)
            }
            Err(err) => {
                self.notifier.warn(format!("Cannot edit entry: {}", err));
                None
            }
        }
    }

    /// Moves `current` to another entry of the active tree.
    pub async fn select_entry(&mut self, entry_id: &str) -> bool {
        match self.active.set_current(entry_id) {
            Ok(()) => {
                self.persist_active().await;
                true
            }
            Err(err) => {
                self.notifier.warn(format!("Cannot select entry: {}", err));
                false
            }
        }
    }

    /// Detaches the current tool entry so the call can be retried.
    pub async fn rollback_last_tool_response(&mut self) -> Option<ConversationEntry> {
        let removed = self.active.rollback_last_tool_response()?;
        tracing::debug!("[HistoryCoordinator] Rolled back tool entry {}", removed.id);
        self.persist_active().await;
        Some(removed)
    }

    pub async fn update_advance_settings(&mut self, settings: AdvanceSettings) {
        if self.active.advance_settings == settings {
            return;
        }
        self.active.advance_settings = settings;
        self.active.touch();
        self.persist_active().await;
    }

    // ============================================================================
    // Index
    // ============================================================================

    /// Tags the active conversation with the provider that answered it.
    /// Conversations without a record yet (empty trees) are left alone.
    pub async fn record_provider_tag(&mut self, provider: &str) {
        if !self.index.contains(&self.active.root) {
            return;
        }
        let root = self.active.root.clone();
        self.add_tag(&root, provider).await;
    }

    pub async fn set_title(&mut self, root: &str, title: impl Into<String>) -> bool {
        let result = self.index.set_title(root, title);
        self.finish_index_update(result, "rename").await
    }

    pub async fn add_tag(&mut self, root: &str, tag: impl Into<String>) -> bool {
        let result = self.index.add_tag(root, tag);
        self.finish_index_update(result, "tag").await
    }

    pub async fn remove_tag(&mut self, root: &str, tag: &str) -> bool {
        let result = self.index.remove_tag(root, tag);
        self.finish_index_update(result, "untag").await
    }

    async fn finish_index_update(&self, result: Result<()>, action: &str) -> bool {
        match result {
            Ok(()) => self.save_index().await,
            Err(err) => {
                self.notifier
                    .warn(format!("Cannot {} conversation: {}", action, err));
                false
            }
        }
    }

    /// Index records, most recently updated first.
    pub fn list(&self) -> Vec<HistoryIndexEntry> {
        self.index.list_sorted().into_iter().cloned().collect()
    }

    // ============================================================================
    // Reconciliation and provider context
    // ============================================================================

    /// Reconciles recorded file contents of the active branch with
    /// `operations`, then persists the tree once if anything changed.
    pub async fn sync_file_change_context(
        &mut self,
        operations: &[FileSyncOperation],
        force_sync: bool,
    ) -> SyncReport {
        let report =
            sync_file_change_context(&mut self.active, operations, force_sync, self.files.as_ref())
                .await;

        if !report.failed_paths.is_empty() {
            self.notifier.warn(format!(
                "Could not refresh {} file(s): {}",
                report.failed_paths.len(),
                report.failed_paths.join(", ")
            ));
        }
        if report.changed() {
            self.persist_active().await;
        }
        report
    }

    /// Provider context for the branch ending at `entry_id`, or the active
    /// branch when `None`.
    pub fn build_request(&self, entry_id: Option<&str>) -> ProviderRequest {
        let view = self.active.branch_before_entry(entry_id);
        ProviderRequest::from_history(&view, &self.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::error::ArborError;
    use arbor_core::notice::{Notice, Severity};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Default)]
    struct MockHistoryRepository {
        histories: Mutex<HashMap<String, ConversationHistory>>,
        fail_saves: Mutex<bool>,
        save_count: Mutex<usize>,
    }

    #[async_trait]
    impl HistoryRepository for MockHistoryRepository {
        async fn find_by_root(&self, root: &str) -> Result<Option<ConversationHistory>> {
            Ok(self.histories.lock().unwrap().get(root).cloned())
        }

        async fn save(&self, history: &ConversationHistory) -> Result<()> {
            if *self.fail_saves.lock().unwrap() {
                return Err(ArborError::io("disk full"));
            }
            *self.save_count.lock().unwrap() += 1;
            self.histories
                .lock()
                .unwrap()
                .insert(history.root.clone(), history.clone());
            Ok(())
        }

        async fn delete(&self, root: &str) -> Result<()> {
            self.histories.lock().unwrap().remove(root);
            Ok(())
        }

        async fn exists(&self, root: &str) -> Result<bool> {
            Ok(self.histories.lock().unwrap().contains_key(root))
        }
    }

    #[derive(Default)]
    struct MockIndexRepository {
        index: Mutex<Option<HistoryIndex>>,
        corrupt: bool,
    }

    #[async_trait]
    impl HistoryIndexRepository for MockIndexRepository {
        async fn load(&self) -> Result<HistoryIndex> {
            if self.corrupt {
                return Err(ArborError::Serialization {
                    format: "JSON".to_string(),
                    message: "expected value".to_string(),
                });
            }
            Ok(self.index.lock().unwrap().clone().unwrap_or_default())
        }

        async fn save(&self, index: &HistoryIndex) -> Result<()> {
            *self.index.lock().unwrap() = Some(index.clone());
            Ok(())
        }
    }

    struct NoFiles;

    #[async_trait]
    impl FileReader for NoFiles {
        async fn read_to_string(&self, relative_path: &str) -> Result<String> {
            Err(ArborError::not_found("File", relative_path))
        }
    }

    struct Fixture {
        coordinator: HistoryCoordinator,
        histories: Arc<MockHistoryRepository>,
        index: Arc<MockIndexRepository>,
        notices: UnboundedReceiver<Notice>,
    }

    async fn fixture_with(index: MockIndexRepository) -> Fixture {
        let histories = Arc::new(MockHistoryRepository::default());
        let index = Arc::new(index);
        let (notifier, notices) = Notifier::channel();
        let deps = HistoryDeps {
            histories: histories.clone(),
            index: index.clone(),
            files: Arc::new(NoFiles),
        };
        let coordinator = HistoryCoordinator::open(deps, ArborConfig::default(), notifier).await;
        Fixture {
            coordinator,
            histories,
            index,
            notices,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(MockIndexRepository::default()).await
    }

    fn drain(notices: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut drained = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            drained.push(notice);
        }
        drained
    }

    #[tokio::test]
    async fn test_corrupt_index_is_reported_and_empty() {
        let mut fx = fixture_with(MockIndexRepository {
            corrupt: true,
            ..Default::default()
        })
        .await;

        assert!(fx.coordinator.index().is_empty());
        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_empty_tree_is_never_saved() {
        let fx = fixture().await;
        assert!(!fx.coordinator.save(fx.coordinator.active()).await);
        assert_eq!(*fx.histories.save_count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_persists_and_indexes() {
        let mut fx = fixture().await;
        let first = fx.coordinator.append_entry(None, NewEntry::user("hi")).await;
        fx.coordinator
            .append_entry(Some(&first.id), NewEntry::assistant("hello"))
            .await;

        let root = fx.coordinator.active().root.clone();
        let stored = fx.histories.histories.lock().unwrap().get(&root).cloned().unwrap();
        assert_eq!(stored.entry_count(), 2);
        assert_eq!(stored, *fx.coordinator.active());

        let index = fx.index.index.lock().unwrap().clone().unwrap();
        assert_eq!(index.get(&root).unwrap().title, "hi");
    }

    #[tokio::test]
    async fn test_undocked_append_is_reported_and_not_saved() {
        let mut fx = fixture().await;
        let entry = fx
            .coordinator
            .append_entry(Some("missing"), NewEntry::user("lost"))
            .await;

        assert_eq!(entry.message, "lost");
        assert!(fx.coordinator.active().is_empty());
        assert_eq!(*fx.histories.save_count.lock().unwrap(), 0);
        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_switch_active_saves_outgoing_tree_first() {
        let mut fx = fixture().await;
        fx.coordinator.append_entry(None, NewEntry::user("first")).await;
        let first_root = fx.coordinator.active().root.clone();

        fx.coordinator.new_conversation().await;
        fx.coordinator.append_entry(None, NewEntry::user("second")).await;
        let second_root = fx.coordinator.active().root.clone();

        let switched = fx.coordinator.switch_active(&first_root).await;
        assert_eq!(switched.root, first_root);
        assert!(fx.histories.histories.lock().unwrap().contains_key(&second_root));
        assert_eq!(fx.coordinator.list().len(), 2);
    }

    #[tokio::test]
    async fn test_switch_to_missing_tree_gives_default() {
        let mut fx = fixture().await;
        let active = fx.coordinator.switch_active("nope").await;
        assert!(active.is_empty());
        assert_ne!(active.root, "nope");
        assert_eq!(drain(&mut fx.notices)[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_record() {
        let mut fx = fixture().await;
        let a = fx.coordinator.append_entry(None, NewEntry::user("hi")).await;
        fx.coordinator
            .append_entry(Some(&a.id), NewEntry::assistant("hello"))
            .await;
        let root = fx.coordinator.active().root.clone();

        fx.coordinator.delete(&root).await;

        assert!(fx.coordinator.active().top.is_empty());
        assert_ne!(fx.coordinator.active().root, root);
        assert!(fx.coordinator.list().is_empty());
        assert!(!fx.histories.exists(&root).await.unwrap());
        assert!(fx.coordinator.load(&root).await.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_to_empty_tree_removes_stored_copy() {
        let mut fx = fixture().await;
        let tool = fx
            .coordinator
            .append_entry(None, NewEntry::tool(Vec::new()))
            .await;
        let root = fx.coordinator.active().root.clone();
        assert!(fx.histories.exists(&root).await.unwrap());
        assert_eq!(fx.coordinator.list().len(), 1);

        let removed = fx.coordinator.rollback_last_tool_response().await.unwrap();
        assert_eq!(removed.id, tool.id);
        assert!(fx.coordinator.active().is_empty());

        fx.coordinator.new_conversation().await;
        assert!(!fx.histories.exists(&root).await.unwrap());
        assert!(fx.coordinator.load(&root).await.is_empty());
        assert!(fx.coordinator.list().is_empty());
        let stored_index = fx.index.index.lock().unwrap().clone().unwrap();
        assert!(!stored_index.contains(&root));
    }

    #[tokio::test]
    async fn test_edit_defaults_to_branching() {
        let mut fx = fixture().await;
        let question = fx.coordinator.append_entry(None, NewEntry::user("typo")).await;
        fx.coordinator
            .append_entry(Some(&question.id), NewEntry::assistant("answer"))
            .await;

        let edited = fx.coordinator.edit_entry(&question.id, "fixed").await.unwrap();

        let active = fx.coordinator.active();
        assert_ne!(edited, question.id);
        assert_eq!(active.get(&question.id).unwrap().message, "typo");
        assert_eq!(active.get(&edited).unwrap().message, "fixed");
        assert_eq!(active.current, edited);
        assert_eq!(active.top.len(), 2);

        assert!(fx.coordinator.edit_entry("unknown", "x").await.is_none());
    }

    #[tokio::test]
    async fn test_tags_and_titles_on_unknown_root_are_reported() {
        let mut fx = fixture().await;
        assert!(!fx.coordinator.add_tag("ghost", "x").await);
        assert!(!fx.coordinator.set_title("ghost", "x").await);
        assert_eq!(drain(&mut fx.notices).len(), 2);
    }

    #[tokio::test]
    async fn test_provider_tag_only_for_indexed_conversations() {
        let mut fx = fixture().await;
        fx.coordinator.record_provider_tag("openai").await;
        assert!(fx.coordinator.list().is_empty());

        fx.coordinator.append_entry(None, NewEntry::user("hi")).await;
        fx.coordinator.record_provider_tag("openai").await;
        fx.coordinator.record_provider_tag("openai").await;

        let listed = fx.coordinator.list();
        assert_eq!(listed[0].tags.iter().collect::<Vec<_>>(), vec!["openai"]);
    }

    #[tokio::test]
    async fn test_failed_save_is_reported_not_propagated() {
        let mut fx = fixture().await;
        *fx.histories.fail_saves.lock().unwrap() = true;

        fx.coordinator.append_entry(None, NewEntry::user("hi")).await;

        assert_eq!(fx.coordinator.active().entry_count(), 1);
        assert!(fx.coordinator.list().is_empty());
        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_build_request_uses_branch_view() {
        let mut fx = fixture().await;
        let a = fx.coordinator.append_entry(None, NewEntry::user("a")).await;
        let b = fx
            .coordinator
            .append_entry(Some(&a.id), NewEntry::assistant("b"))
            .await;
        fx.coordinator
            .append_entry(Some(&b.id), NewEntry::user("c"))
            .await;

        let full = fx.coordinator.build_request(None);
        let upto_b = fx.coordinator.build_request(Some(&b.id));
        assert_eq!(full.messages.len(), 3);
        assert_eq!(upto_b.messages.len(), 2);
        assert_eq!(upto_b.messages[1].content, "b");
    }
}
