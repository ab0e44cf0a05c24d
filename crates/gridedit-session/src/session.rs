//! Optimistic editing of a grid document backed by a remote store.
//!
//! The session is the single owner of the document: every mutation goes
//! through `&mut self`. Remote calls run as background tasks and their
//! results are applied back here by [`EditSession::next_reconciliation`] or
//! [`EditSession::drain_reconciliations`], so network I/O never blocks an
//! edit.
//!
//! Each optimistic cell edit gets a sequence number. A completion only
//! commits or reverts its cell when it still carries the latest number
//! issued for that cell; anything older was superseded by a newer edit and
//! only moves the cell's baseline, the last value the remote store is known
//! to hold. A failed latest edit reverts to that baseline.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use gridedit_core::{
    classify, CellAction, CellIntent, CellPosition, CellStatus, DeleteConfirmation, EditError,
    EditState, GridDocument, SelectionSet, StoreError, MAX_COLS, MAX_ROWS,
};
use gridedit_history::{EditOperation, UndoStack};
use tokio::task::{self, JoinError, JoinSet};
use uuid::Uuid;

use crate::config::{SessionConfig, StructuralSync};
use crate::store::{with_timeout, RemoteGridStore};

/// Result of reconciling one optimistic cell edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote store accepted the value
    Committed,
    /// The remote store rejected the value; the cell was restored
    Reverted(StoreError),
    /// A newer edit to the same cell was issued first; nothing was applied
    Superseded,
}

/// A background remote call that has finished and been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Cell {
        position: CellPosition,
        seq: u64,
        outcome: SyncOutcome,
    },
    Structural {
        operation: EditOperation,
        result: Result<(), StoreError>,
    },
}

/// What activating a cell led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The cell entered edit mode
    Editing,
    /// The content triggers an external action; no state changed
    Action(CellAction),
}

/// Bookkeeping for a spawned remote call
#[derive(Debug)]
enum SyncTicket {
    Cell {
        position: CellPosition,
        seq: u64,
        value: String,
    },
    Structural(EditOperation),
}

/// Sync state of a cell with edits outstanding
#[derive(Debug)]
struct PendingCell {
    /// Sequence number of the newest edit
    latest: u64,
    /// Last value the remote store is known to hold
    baseline: String,
    /// Edit that produced `baseline`, 0 for the value before any edit
    baseline_seq: u64,
}

#[derive(Debug, Clone, Copy)]
enum Structural {
    AddRow,
    AddColumn,
}

impl Structural {
    fn operation(self) -> EditOperation {
        match self {
            Structural::AddRow => EditOperation::AddRow,
            Structural::AddColumn => EditOperation::AddColumn,
        }
    }
}

pub struct EditSession<S: RemoteGridStore> {
    store: Arc<S>,
    document_id: Uuid,
    config: SessionConfig,
    document: GridDocument,
    undo: UndoStack,
    selection: SelectionSet,
    edit: EditState,
    /// Cells whose latest edit has not been acknowledged yet
    in_flight: HashMap<CellPosition, PendingCell>,
    tasks: JoinSet<Result<(), StoreError>>,
    tickets: HashMap<task::Id, SyncTicket>,
    next_seq: u64,
    last_error: Option<EditError>,
}

impl<S: RemoteGridStore> EditSession<S> {
    /// Start a session over rows that are already loaded
    pub fn new(
        store: Arc<S>,
        document_id: Uuid,
        rows: Vec<Vec<String>>,
        config: SessionConfig,
    ) -> Self {
        let mut document = GridDocument::new();
        document.load(rows);

        Self {
            store,
            document_id,
            undo: UndoStack::new(config.undo_depth),
            config,
            document,
            selection: SelectionSet::new(),
            edit: EditState::new(),
            in_flight: HashMap::new(),
            tasks: JoinSet::new(),
            tickets: HashMap::new(),
            next_seq: 0,
            last_error: None,
        }
    }

    /// Fetch the document snapshot and start a session over it
    pub async fn open(
        store: Arc<S>,
        document_id: Uuid,
        config: SessionConfig,
    ) -> Result<Self, EditError> {
        let rows = with_timeout(config.sync_timeout, store.fetch_snapshot(document_id)).await?;

        tracing::info!(
            "Opened document {} ({} rows)",
            document_id,
            rows.len()
        );

        Ok(Self::new(store, document_id, rows, config))
    }

    /// End the session. Outstanding remote calls are aborted and their
    /// results are never applied.
    pub fn close(mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!(
                "Closing document {} with {} sync(s) outstanding",
                self.document_id,
                self.tasks.len()
            );
        }
        self.tasks.abort_all();
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn document(&self) -> &GridDocument {
        &self.document
    }

    pub fn get_cell(&self, row: usize, col: usize) -> &str {
        self.document.get_cell(row, col)
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// The transient error to show, if any
    pub fn last_error(&self) -> Option<&EditError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Number of remote calls that have not completed yet
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    pub fn cell_status(&self, row: usize, col: usize) -> CellStatus {
        let position = CellPosition::new(row, col);
        if self.edit.editing_position() == Some(position) {
            CellStatus::Editing
        } else if self.in_flight.contains_key(&position) {
            CellStatus::SyncPending
        } else {
            CellStatus::Viewing
        }
    }

    /// Handle a press on a cell: actionable content triggers its action,
    /// anything else enters edit mode. Activating another cell while editing
    /// abandons the uncommitted edit.
    pub fn activate_cell(&mut self, row: usize, col: usize) -> Activation {
        let content = self.document.get_cell(row, col);

        match classify(content) {
            CellIntent::Actionable(action) => Activation::Action(action),
            CellIntent::Editable => {
                let content = content.to_string();
                self.edit.cancel();
                self.edit.start_edit(CellPosition::new(row, col), content);
                Activation::Editing
            }
        }
    }

    /// Replace the text in the cell being edited
    pub fn edit_value(&mut self, content: impl Into<String>) -> Result<(), EditError> {
        self.edit
            .update_value(content.into())
            .map_err(EditError::Validation)
    }

    /// Leave edit mode and apply the edited text. Returns whether a change
    /// was issued; unchanged text goes back to viewing without a sync.
    pub fn commit_edit(&mut self) -> Result<bool, EditError> {
        let (position, content) = self
            .edit
            .commit()
            .ok_or_else(|| EditError::Validation("no cell is being edited".to_string()))?;

        self.update_cell(position.row, position.col, content)
    }

    /// Leave edit mode without applying anything
    pub fn cancel_edit(&mut self) {
        self.edit.cancel();
    }

    /// Optimistically set a cell and sync it in the background.
    ///
    /// The new value is readable immediately. Returns false when the value
    /// is unchanged, in which case nothing is recorded or sent. Addresses
    /// outside the grid limits are rejected.
    pub fn update_cell(
        &mut self,
        row: usize,
        col: usize,
        value: impl Into<String>,
    ) -> Result<bool, EditError> {
        if !GridDocument::within_limits(row, col) {
            return Err(EditError::Validation(format!(
                "cell ({}, {}) is outside the {}x{} grid limit",
                row, col, MAX_ROWS, MAX_COLS
            )));
        }

        let new_value = value.into();
        let old_value = self.document.get_cell(row, col).to_string();
        if old_value == new_value {
            return Ok(false);
        }

        let position = CellPosition::new(row, col);
        self.undo.record(EditOperation::update_cell(
            row,
            col,
            old_value.clone(),
            new_value.clone(),
        ));
        self.document.set_cell(row, col, new_value.clone());

        self.next_seq += 1;
        let seq = self.next_seq;
        // An unacknowledged earlier edit keeps its baseline
        self.in_flight
            .entry(position)
            .or_insert_with(|| PendingCell {
                latest: seq,
                baseline: old_value,
                baseline_seq: 0,
            })
            .latest = seq;

        let store = Arc::clone(&self.store);
        let document_id = self.document_id;
        let limit = self.config.sync_timeout;
        let remote_value = new_value.clone();
        let handle = self.tasks.spawn(async move {
            with_timeout(limit, store.update_cell(document_id, row, col, remote_value)).await
        });
        self.tickets.insert(
            handle.id(),
            SyncTicket::Cell {
                position,
                seq,
                value: new_value,
            },
        );

        tracing::debug!("Dispatched sync #{} for {}", seq, position);
        Ok(true)
    }

    /// Append a blank row
    pub fn add_row(&mut self) {
        self.apply_structural(Structural::AddRow);
    }

    /// Append a blank column
    pub fn add_column(&mut self) {
        self.apply_structural(Structural::AddColumn);
    }

    fn apply_structural(&mut self, kind: Structural) {
        let operation = kind.operation();
        operation.apply(&mut self.document);
        self.undo.record(operation.clone());

        if self.config.structural_sync == StructuralSync::LocalOnly {
            return;
        }

        let store = Arc::clone(&self.store);
        let document_id = self.document_id;
        let limit = self.config.sync_timeout;
        let handle = self.tasks.spawn(async move {
            match kind {
                Structural::AddRow => with_timeout(limit, store.add_row(document_id)).await,
                Structural::AddColumn => with_timeout(limit, store.add_column(document_id)).await,
            }
        });
        self.tickets
            .insert(handle.id(), SyncTicket::Structural(operation));
    }

    /// Mark or unmark a column for deletion. Returns whether it is selected
    /// afterwards.
    pub fn toggle_column(&mut self, col: usize) -> Result<bool, EditError> {
        if col >= self.document.max_cols() {
            return Err(EditError::Validation(format!(
                "column {} is outside the grid",
                col
            )));
        }
        Ok(self.selection.toggle(col))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// First step of deleting columns: confirm the current selection
    pub fn confirm_delete(&self) -> Result<DeleteConfirmation, EditError> {
        self.selection.confirm_delete()
    }

    /// Delete the confirmed columns, highest index first, one remote call
    /// per column.
    ///
    /// Each column is removed locally as soon as the remote store confirms
    /// it, so dropping the future partway leaves the document matching what
    /// was deleted. A failure stops the batch; the remaining columns stay
    /// selected so the delete can be retried. Rejected while cell syncs are
    /// outstanding, since removing columns would shift the cells those syncs
    /// address.
    pub async fn delete_selected_columns(
        &mut self,
        confirmation: DeleteConfirmation,
    ) -> Result<Vec<usize>, EditError> {
        if self.selection.is_empty() {
            return Err(EditError::Validation(
                "no columns selected for deletion".to_string(),
            ));
        }
        if !self.selection.matches(&confirmation) {
            return Err(EditError::Validation(
                "selection changed since the delete was confirmed".to_string(),
            ));
        }
        let pending = self.pending_cell_syncs();
        if pending > 0 {
            return Err(EditError::Conflict { pending });
        }

        let mut removed = Vec::with_capacity(confirmation.indices().len());
        for &col in confirmation.indices() {
            let call = self.store.delete_column(self.document_id, col);
            match with_timeout(self.config.sync_timeout, call).await {
                Ok(()) => {
                    self.remove_column_locally(col);
                    removed.push(col);
                }
                Err(source) => {
                    tracing::warn!(
                        "Column delete stopped at {} after removing {:?}: {}",
                        col,
                        removed,
                        source
                    );
                    let err = EditError::PartialDelete {
                        removed,
                        failed: col,
                        source,
                    };
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        }

        self.selection.clear();
        tracing::info!("Deleted columns {:?} from {}", removed, self.document_id);
        Ok(removed)
    }

    fn remove_column_locally(&mut self, col: usize) {
        let operation = EditOperation::DeleteColumns { indices: vec![col] };
        operation.apply(&mut self.document);
        self.undo.record(operation);

        self.selection.remove(col);
        self.edit.cancel();
    }

    fn pending_cell_syncs(&self) -> usize {
        self.tickets
            .values()
            .filter(|t| matches!(t, SyncTicket::Cell { .. }))
            .count()
    }

    /// Undo the last cell edit locally. The remote store is not contacted,
    /// and any sync still outstanding for that cell is disregarded.
    pub fn undo(&mut self) -> Option<CellPosition> {
        let operation = self.undo.undo(&mut self.document)?;
        let EditOperation::UpdateCell { row, col, .. } = operation else {
            return None;
        };

        let position = CellPosition::new(row, col);
        self.in_flight.remove(&position);
        Some(position)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Label for the undo action, e.g. "Edit cell"
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.undo_description()
    }

    /// Wait for the next background call to finish and apply its result.
    /// Returns `None` when nothing is outstanding.
    pub async fn next_reconciliation(&mut self) -> Option<Reconciliation> {
        loop {
            let joined = self.tasks.join_next_with_id().await?;
            if let Some(reconciliation) = self.reconcile(joined) {
                return Some(reconciliation);
            }
        }
    }

    /// Apply every background result that is already available
    pub fn drain_reconciliations(&mut self) -> Vec<Reconciliation> {
        let mut applied = Vec::new();
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            applied.extend(self.reconcile(joined));
        }
        applied
    }

    /// Wait for every outstanding call and apply the results
    pub async fn settle(&mut self) -> Vec<Reconciliation> {
        let mut applied = Vec::new();
        while let Some(reconciliation) = self.next_reconciliation().await {
            applied.push(reconciliation);
        }
        applied
    }

    fn reconcile(
        &mut self,
        joined: Result<(task::Id, Result<(), StoreError>), JoinError>,
    ) -> Option<Reconciliation> {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(err) if err.is_cancelled() => (err.id(), Err(StoreError::Cancelled)),
            Err(err) => (
                err.id(),
                Err(StoreError::Transport(format!("sync task failed: {}", err))),
            ),
        };

        match self.tickets.remove(&id)? {
            SyncTicket::Cell {
                position,
                seq,
                value,
            } => Some(Reconciliation::Cell {
                position,
                seq,
                outcome: self.reconcile_cell(position, seq, value, result),
            }),
            SyncTicket::Structural(operation) => {
                if let Err(err) = &result {
                    tracing::warn!("{} was not persisted: {}", operation.description(), err);
                    self.last_error = Some(EditError::Store(err.clone()));
                }
                Some(Reconciliation::Structural { operation, result })
            }
        }
    }

    fn reconcile_cell(
        &mut self,
        position: CellPosition,
        seq: u64,
        value: String,
        result: Result<(), StoreError>,
    ) -> SyncOutcome {
        let pending = match self.in_flight.entry(position) {
            Entry::Occupied(entry) if entry.get().latest == seq => entry.remove(),
            Entry::Occupied(mut entry) => {
                // Only an acknowledged older edit moves the baseline
                let pending = entry.get_mut();
                if result.is_ok() && seq > pending.baseline_seq {
                    pending.baseline = value;
                    pending.baseline_seq = seq;
                }
                tracing::debug!("Sync #{} for {} superseded; ignoring", seq, position);
                return SyncOutcome::Superseded;
            }
            Entry::Vacant(_) => {
                tracing::debug!("Sync #{} for {} no longer tracked; ignoring", seq, position);
                return SyncOutcome::Superseded;
            }
        };

        match result {
            Ok(()) => {
                self.last_error = None;
                SyncOutcome::Committed
            }
            Err(source) => {
                tracing::warn!(
                    "Sync #{} for {} failed, reverting to {:?}: {}",
                    seq,
                    position,
                    pending.baseline,
                    source
                );
                self.document.set(position, pending.baseline);
                self.last_error = Some(EditError::Network {
                    position,
                    source: source.clone(),
                });
                SyncOutcome::Reverted(source)
            }
        }
    }
}

impl<S: RemoteGridStore> std::fmt::Debug for EditSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("document_id", &self.document_id)
            .field("rows", &self.document.row_count())
            .field("cols", &self.document.max_cols())
            .field("outstanding", &self.tasks.len())
            .field("undo", &self.undo)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Update(usize, usize, String),
        DeleteColumn(usize),
        AddRow,
        AddColumn,
    }

    /// A cell update held until the test decides its outcome
    struct Gate {
        call: Call,
        reply: oneshot::Sender<Result<(), StoreError>>,
    }

    #[derive(Default)]
    struct MockStore {
        snapshot: Vec<Vec<String>>,
        calls: Mutex<Vec<Call>>,
        fail_updates: AtomicBool,
        hang_updates: AtomicBool,
        failing_column: Mutex<Option<usize>>,
        hanging_column: Mutex<Option<usize>>,
        gates: Option<mpsc::UnboundedSender<Gate>>,
    }

    impl MockStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn io_error() -> StoreError {
        StoreError::Transport("connection reset".to_string())
    }

    impl RemoteGridStore for MockStore {
        async fn fetch_snapshot(&self, _document_id: Uuid) -> Result<Vec<Vec<String>>, StoreError> {
            Ok(self.snapshot.clone())
        }

        async fn update_cell(
            &self,
            _document_id: Uuid,
            row: usize,
            col: usize,
            value: String,
        ) -> Result<(), StoreError> {
            let call = Call::Update(row, col, value);
            self.record(call.clone());

            if let Some(gates) = &self.gates {
                let (reply, outcome) = oneshot::channel();
                gates
                    .send(Gate { call, reply })
                    .map_err(|_| StoreError::Cancelled)?;
                return outcome.await.unwrap_or(Err(StoreError::Cancelled));
            }
            if self.hang_updates.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            Ok(())
        }

        async fn delete_column(&self, _document_id: Uuid, col: usize) -> Result<(), StoreError> {
            self.record(Call::DeleteColumn(col));
            if *self.failing_column.lock().unwrap() == Some(col) {
                return Err(io_error());
            }
            if *self.hanging_column.lock().unwrap() == Some(col) {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn add_row(&self, _document_id: Uuid) -> Result<(), StoreError> {
            self.record(Call::AddRow);
            Ok(())
        }

        async fn add_column(&self, _document_id: Uuid) -> Result<(), StoreError> {
            self.record(Call::AddColumn);
            Err(io_error())
        }
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn session_with(store: MockStore, data: &[&[&str]]) -> (Arc<MockStore>, EditSession<MockStore>) {
        let store = Arc::new(store);
        let session = EditSession::new(
            Arc::clone(&store),
            Uuid::new_v4(),
            rows(data),
            SessionConfig::default(),
        );
        (store, session)
    }

    fn gated(data: &[&[&str]]) -> (Arc<MockStore>, EditSession<MockStore>, mpsc::UnboundedReceiver<Gate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = MockStore {
            gates: Some(tx),
            ..Default::default()
        };
        let (store, session) = session_with(store, data);
        (store, session, rx)
    }

    #[tokio::test]
    async fn test_update_is_visible_before_ack() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        assert!(session.update_cell(0, 0, "B").unwrap());
        assert_eq!(session.get_cell(0, 0), "B");
        assert_eq!(session.cell_status(0, 0), CellStatus::SyncPending);

        let gate = gates.recv().await.unwrap();
        assert_eq!(gate.call, Call::Update(0, 0, "B".to_string()));
        gate.reply.send(Ok(())).unwrap();

        let reconciliation = session.next_reconciliation().await.unwrap();
        assert!(matches!(
            reconciliation,
            Reconciliation::Cell { outcome: SyncOutcome::Committed, .. }
        ));
        assert_eq!(session.get_cell(0, 0), "B");
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
    }

    #[tokio::test]
    async fn test_failed_sync_reverts_cell() {
        let store = MockStore::default();
        store.fail_updates.store(true, Ordering::SeqCst);
        let (_store, mut session) = session_with(store, &[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        let applied = session.settle().await;

        assert_eq!(session.get_cell(0, 0), "A");
        assert_eq!(
            applied,
            vec![Reconciliation::Cell {
                position: CellPosition::new(0, 0),
                seq: 1,
                outcome: SyncOutcome::Reverted(io_error()),
            }]
        );
        assert!(matches!(session.last_error(), Some(EditError::Network { .. })));
        // The undo entry is kept even though the edit was reverted
        assert!(session.can_undo());

        session.dismiss_error();
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_unchanged_value_is_noop() {
        let (store, mut session) = session_with(MockStore::default(), &[&["same"]]);

        assert!(!session.update_cell(0, 0, "same").unwrap());
        assert!(!session.update_cell(3, 3, "").unwrap());
        assert!(session.settle().await.is_empty());
        assert!(store.calls().is_empty());
        assert!(!session.can_undo());
    }

    #[tokio::test]
    async fn test_undo_is_local_only() {
        let (store, mut session) = session_with(MockStore::default(), &[&["", ""], &["", "Y"]]);

        session.update_cell(1, 1, "X").unwrap();
        session.settle().await;
        assert_eq!(store.calls().len(), 1);

        assert_eq!(session.undo_label(), Some("Edit cell"));
        assert_eq!(session.undo(), Some(CellPosition::new(1, 1)));
        assert_eq!(session.get_cell(1, 1), "Y");
        assert_eq!(store.calls().len(), 1);
        assert_eq!(session.undo(), None);
        assert_eq!(session.undo_label(), None);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_revert_newer_edit() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        session.update_cell(0, 0, "C").unwrap();

        let first = gates.recv().await.unwrap();
        let second = gates.recv().await.unwrap();
        assert_eq!(first.call, Call::Update(0, 0, "B".to_string()));

        first.reply.send(Err(io_error())).unwrap();
        let stale = session.next_reconciliation().await.unwrap();
        assert_eq!(
            stale,
            Reconciliation::Cell {
                position: CellPosition::new(0, 0),
                seq: 1,
                outcome: SyncOutcome::Superseded,
            }
        );
        assert_eq!(session.get_cell(0, 0), "C");
        assert!(session.last_error().is_none());
        assert_eq!(session.cell_status(0, 0), CellStatus::SyncPending);

        second.reply.send(Ok(())).unwrap();
        session.settle().await;
        assert_eq!(session.get_cell(0, 0), "C");
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
    }

    #[tokio::test]
    async fn test_both_failures_revert_to_remote_value() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        session.update_cell(0, 0, "C").unwrap();
        let first = gates.recv().await.unwrap();
        let second = gates.recv().await.unwrap();

        first.reply.send(Err(io_error())).unwrap();
        session.next_reconciliation().await.unwrap();
        assert_eq!(session.get_cell(0, 0), "C");

        second.reply.send(Err(io_error())).unwrap();
        let last = session.next_reconciliation().await.unwrap();
        assert!(matches!(
            last,
            Reconciliation::Cell { seq: 2, outcome: SyncOutcome::Reverted(_), .. }
        ));
        assert_eq!(session.get_cell(0, 0), "A");
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
    }

    #[tokio::test]
    async fn test_latest_failure_reverts_to_acknowledged_value() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        session.update_cell(0, 0, "C").unwrap();
        let first = gates.recv().await.unwrap();
        let second = gates.recv().await.unwrap();

        first.reply.send(Ok(())).unwrap();
        let early = session.next_reconciliation().await.unwrap();
        assert!(matches!(
            early,
            Reconciliation::Cell { outcome: SyncOutcome::Superseded, .. }
        ));

        second.reply.send(Err(io_error())).unwrap();
        session.next_reconciliation().await.unwrap();
        assert_eq!(session.get_cell(0, 0), "B");
        assert!(matches!(session.last_error(), Some(EditError::Network { .. })));
    }

    #[tokio::test]
    async fn test_latest_failure_before_older_reply() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        session.update_cell(0, 0, "C").unwrap();
        let first = gates.recv().await.unwrap();
        let second = gates.recv().await.unwrap();

        // B is still unconfirmed, so the remote is only known to hold A
        second.reply.send(Err(io_error())).unwrap();
        session.next_reconciliation().await.unwrap();
        assert_eq!(session.get_cell(0, 0), "A");

        first.reply.send(Err(io_error())).unwrap();
        let late = session.next_reconciliation().await.unwrap();
        assert!(matches!(
            late,
            Reconciliation::Cell { outcome: SyncOutcome::Superseded, .. }
        ));
        assert_eq!(session.get_cell(0, 0), "A");
    }

    #[tokio::test]
    async fn test_update_outside_limits_is_rejected() {
        let (store, mut session) = session_with(MockStore::default(), &[&["A"]]);

        for (row, col) in [(usize::MAX, 0), (0, usize::MAX), (MAX_ROWS, 0), (0, MAX_COLS)] {
            assert!(matches!(
                session.update_cell(row, col, "x"),
                Err(EditError::Validation(_))
            ));
        }
        assert_eq!(session.document().row_count(), 1);
        assert!(store.calls().is_empty());

        assert!(session.update_cell(2, 3, "x").unwrap());
        session.settle().await;
        assert_eq!(store.calls(), vec![Call::Update(2, 3, "x".to_string())]);
    }

    #[tokio::test]
    async fn test_different_cells_reconcile_independently() {
        let (_store, mut session, mut gates) = gated(&[&["a", "b"]]);

        session.update_cell(0, 0, "x").unwrap();
        session.update_cell(0, 1, "y").unwrap();
        let left = gates.recv().await.unwrap();
        let right = gates.recv().await.unwrap();

        right.reply.send(Err(io_error())).unwrap();
        session.next_reconciliation().await.unwrap();
        assert_eq!(session.get_cell(0, 1), "b");
        assert_eq!(session.get_cell(0, 0), "x");

        left.reply.send(Ok(())).unwrap();
        session.next_reconciliation().await.unwrap();
        assert_eq!(session.get_cell(0, 0), "x");
    }

    #[tokio::test]
    async fn test_timeout_reverts() {
        let store = MockStore::default();
        store.hang_updates.store(true, Ordering::SeqCst);
        let store = Arc::new(store);
        let config = SessionConfig {
            sync_timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let mut session = EditSession::new(store, Uuid::new_v4(), rows(&[&["A"]]), config);

        session.update_cell(0, 0, "B").unwrap();
        let applied = session.settle().await;

        assert_eq!(session.get_cell(0, 0), "A");
        assert!(matches!(
            applied.as_slice(),
            [Reconciliation::Cell { outcome: SyncOutcome::Reverted(StoreError::Timeout(20)), .. }]
        ));
    }

    #[tokio::test]
    async fn test_close_aborts_outstanding_syncs() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        let mut gate = gates.recv().await.unwrap();
        assert_eq!(session.outstanding(), 1);

        session.close();
        tokio::time::timeout(Duration::from_secs(1), gate.reply.closed())
            .await
            .expect("aborted sync should drop its reply channel");
    }

    #[tokio::test]
    async fn test_drain_applies_finished_syncs() {
        let (_store, mut session) = session_with(MockStore::default(), &[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        assert_eq!(session.cell_status(0, 0), CellStatus::SyncPending);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let applied = session.drain_reconciliations();
        assert_eq!(applied.len(), 1);
        assert_eq!(session.outstanding(), 0);
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
    }

    #[tokio::test]
    async fn test_activate_phone_cell_triggers_call() {
        let (store, mut session) = session_with(MockStore::default(), &[&["Alice", "+91 98765 43210"]]);

        let activation = session.activate_cell(0, 1);
        assert_eq!(
            activation,
            Activation::Action(CellAction::PhoneCall("919876543210".to_string()))
        );
        assert_eq!(session.cell_status(0, 1), CellStatus::Viewing);
        assert!(!session.edit_state().is_editing());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_commit_flow() {
        let (store, mut session) = session_with(MockStore::default(), &[&["Alice"]]);

        assert_eq!(session.activate_cell(0, 0), Activation::Editing);
        assert_eq!(session.cell_status(0, 0), CellStatus::Editing);

        // Unchanged commit goes straight back to viewing
        assert!(!session.commit_edit().unwrap());
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
        assert!(store.calls().is_empty());

        session.activate_cell(0, 0);
        session.edit_value("Bob").unwrap();
        assert!(session.commit_edit().unwrap());
        assert_eq!(session.get_cell(0, 0), "Bob");
        session.settle().await;
        assert_eq!(store.calls(), vec![Call::Update(0, 0, "Bob".to_string())]);

        assert!(matches!(session.commit_edit(), Err(EditError::Validation(_))));
        assert!(session.edit_value("x").is_err());
    }

    #[tokio::test]
    async fn test_cancel_edit() {
        let (store, mut session) = session_with(MockStore::default(), &[&["Alice"]]);

        session.activate_cell(0, 0);
        session.edit_value("Bob").unwrap();
        session.cancel_edit();

        assert_eq!(session.get_cell(0, 0), "Alice");
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_structural_edits_local_only_by_default() {
        let (store, mut session) = session_with(MockStore::default(), &[]);

        session.add_column();
        assert_eq!(session.document().rows(), &[vec![String::new()]]);
        session.add_row();
        assert_eq!(session.document().row_count(), 2);

        assert_eq!(session.outstanding(), 0);
        assert!(store.calls().is_empty());
        assert!(!session.can_undo());
    }

    #[tokio::test]
    async fn test_structural_edits_remote_sync() {
        let store = Arc::new(MockStore::default());
        let config = SessionConfig {
            structural_sync: StructuralSync::Remote,
            ..SessionConfig::default()
        };
        let mut session = EditSession::new(Arc::clone(&store), Uuid::new_v4(), rows(&[&["a"]]), config);

        session.add_row();
        session.add_column();
        let applied = session.settle().await;

        assert_eq!(store.calls().len(), 2);
        assert!(applied.contains(&Reconciliation::Structural {
            operation: EditOperation::AddRow,
            result: Ok(()),
        }));
        // Failed structural sync is surfaced but not rolled back
        assert_eq!(session.document().max_cols(), 2);
        assert!(matches!(session.last_error(), Some(EditError::Store(_))));
    }

    #[tokio::test]
    async fn test_delete_requires_selection() {
        let (store, mut session) = session_with(MockStore::default(), &[&["a", "b"]]);

        assert!(matches!(session.confirm_delete(), Err(EditError::Validation(_))));
        assert!(session.toggle_column(5).is_err());

        session.toggle_column(1).unwrap();
        let confirmation = session.confirm_delete().unwrap();
        session.clear_selection();
        assert!(matches!(
            session.delete_selected_columns(confirmation).await,
            Err(EditError::Validation(_))
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_rejects_stale_confirmation() {
        let (store, mut session) = session_with(MockStore::default(), &[&["a", "b", "c"]]);

        session.toggle_column(0).unwrap();
        let confirmation = session.confirm_delete().unwrap();
        session.toggle_column(2).unwrap();

        assert!(matches!(
            session.delete_selected_columns(confirmation).await,
            Err(EditError::Validation(_))
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_selected_columns() {
        let (store, mut session) = session_with(MockStore::default(), &[&["a", "b", "c", "d"]]);

        session.toggle_column(0).unwrap();
        session.toggle_column(2).unwrap();
        let confirmation = session.confirm_delete().unwrap();
        let removed = session.delete_selected_columns(confirmation).await.unwrap();

        assert_eq!(removed, vec![2, 0]);
        assert_eq!(store.calls(), vec![Call::DeleteColumn(2), Call::DeleteColumn(0)]);
        assert_eq!(session.document().rows()[0], vec!["b".to_string(), "d".to_string()]);
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn test_partial_delete_keeps_remaining_selection() {
        let store = MockStore::default();
        *store.failing_column.lock().unwrap() = Some(2);
        let (store, mut session) = session_with(store, &[&["a", "b", "c", "d", "e"]]);

        for col in [0, 2, 4] {
            session.toggle_column(col).unwrap();
        }
        let confirmation = session.confirm_delete().unwrap();
        let err = session.delete_selected_columns(confirmation).await.unwrap_err();

        assert!(matches!(
            &err,
            EditError::PartialDelete { removed, failed: 2, .. } if removed == &vec![4]
        ));
        assert_eq!(store.calls(), vec![Call::DeleteColumn(4), Call::DeleteColumn(2)]);
        assert_eq!(session.document().max_cols(), 4);
        assert_eq!(session.selection().descending(), vec![2, 0]);
        assert_eq!(session.last_error(), Some(&err));

        // Retry once the backend recovers
        *store.failing_column.lock().unwrap() = None;
        let confirmation = session.confirm_delete().unwrap();
        session.delete_selected_columns(confirmation).await.unwrap();
        assert_eq!(session.document().rows()[0], vec!["b".to_string(), "d".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_delete_keeps_confirmed_removals() {
        let store = MockStore::default();
        *store.hanging_column.lock().unwrap() = Some(1);
        let (store, mut session) = session_with(store, &[&["a", "b", "c", "d"]]);

        for col in [1, 3] {
            session.toggle_column(col).unwrap();
        }
        let confirmation = session.confirm_delete().unwrap();
        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            session.delete_selected_columns(confirmation),
        )
        .await;
        assert!(dropped.is_err());

        assert_eq!(store.calls(), vec![Call::DeleteColumn(3), Call::DeleteColumn(1)]);
        assert_eq!(
            session.document().rows()[0],
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(session.selection().descending(), vec![1]);
    }

    #[tokio::test]
    async fn test_delete_conflicts_with_pending_sync() {
        let (store, mut session, mut gates) = gated(&[&["a", "b"]]);

        session.update_cell(0, 1, "z").unwrap();
        session.toggle_column(0).unwrap();
        let confirmation = session.confirm_delete().unwrap();

        let err = session.delete_selected_columns(confirmation.clone()).await.unwrap_err();
        assert_eq!(err, EditError::Conflict { pending: 1 });

        gates.recv().await.unwrap().reply.send(Ok(())).unwrap();
        session.settle().await;
        session.delete_selected_columns(confirmation).await.unwrap();
        assert_eq!(session.document().rows()[0], vec!["z".to_string()]);
        assert!(store.calls().contains(&Call::DeleteColumn(0)));
    }

    #[tokio::test]
    async fn test_delete_drops_undo_history() {
        let (_store, mut session) = session_with(MockStore::default(), &[&["a", "b"]]);

        session.update_cell(0, 1, "z").unwrap();
        session.settle().await;
        session.toggle_column(0).unwrap();
        let confirmation = session.confirm_delete().unwrap();
        session.delete_selected_columns(confirmation).await.unwrap();

        assert!(!session.can_undo());
    }

    #[tokio::test]
    async fn test_open_loads_snapshot() {
        let store = Arc::new(MockStore {
            snapshot: rows(&[&["Name", ""], &["Ada", "555 123 4567"]]),
            ..Default::default()
        });

        let session = EditSession::open(store, Uuid::new_v4(), SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(session.document().row_count(), 2);
        assert_eq!(session.get_cell(1, 0), "Ada");
        assert_eq!(session.document().column_headers(), vec!["Name", "B"]);
    }

    #[tokio::test]
    async fn test_undo_ignores_outstanding_sync() {
        let (_store, mut session, mut gates) = gated(&[&["A"]]);

        session.update_cell(0, 0, "B").unwrap();
        let gate = gates.recv().await.unwrap();
        session.undo();
        assert_eq!(session.get_cell(0, 0), "A");
        assert_eq!(session.cell_status(0, 0), CellStatus::Viewing);

        gate.reply.send(Err(io_error())).unwrap();
        let late = session.next_reconciliation().await.unwrap();
        assert!(matches!(
            late,
            Reconciliation::Cell { outcome: SyncOutcome::Superseded, .. }
        ));
        assert!(session.last_error().is_none());
    }
}
