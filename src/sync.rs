//! Note synchronization service
//!
//! Owns the note lists. Reads come from the remote store when sync is enabled and a
//! session is confirmed, mirrored into the local cache, or from the local cache alone
//! otherwise. Writes go to the remote store first and always land locally, even when
//! the remote store fails.
//!
//! A write the remote store did not take while sync is enabled is queued in the local
//! store. The queue is pushed before every remote read, so a later load or refresh
//! never replaces a local change the remote store has not seen.
//!
//! All operations are serialized: one operation runs from start to finish (remote call
//! included) before the next one begins. Observers get whole snapshots through
//! [`SyncService::subscribe`], never a half-applied change.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Weak;

use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::error::Result;
use crate::local::SharedLocalStore;
use crate::local::keys;
use crate::note::Note;
use crate::note::NoteDraft;
use crate::note::Partition;
use crate::remote::SharedRemoteStore;
use crate::session::SessionGate;

/// Everything the UI shows about notes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteState {
    /// Public notes, newest first
    pub notes: Vec<Note>,

    /// Private notes, newest first
    pub private_notes: Vec<Note>,

    /// A load or refresh is running
    pub loading: bool,

    /// Notes are synced with the remote store
    pub sync_enabled: bool,

    /// A remote session is confirmed
    pub signed_in: bool,
}

impl NoteState {
    /// Notes of a partition
    pub fn partition(&self, partition: Partition) -> &[Note] {
        match partition {
            Partition::Public => &self.notes,
            Partition::Private => &self.private_notes,
        }
    }

    fn partition_mut(&mut self, partition: Partition) -> &mut Vec<Note> {
        match partition {
            Partition::Public => &mut self.notes,
            Partition::Private => &mut self.private_notes,
        }
    }

    /// Find a note in either partition
    pub fn find(&self, id: &str) -> Option<&Note> {
        self.notes
            .iter()
            .chain(self.private_notes.iter())
            .find(|note| note.id == id)
    }

    /// Notes go through the remote store
    pub fn remote_active(&self) -> bool {
        self.sync_enabled && self.signed_in
    }
}

/// Local changes the remote store has not seen yet
#[derive(Debug, Default, Deserialize, Serialize)]
struct Pending {
    /// IDs of notes to write as they are in the local cache
    #[serde(default)]
    upserts: BTreeSet<String>,

    /// Documents to delete
    #[serde(default)]
    deletes: BTreeSet<(Partition, String)>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    fn upsert(&mut self, note: &Note) {
        self.deletes.remove(&(note.partition(), note.id.clone()));
        self.upserts.insert(note.id.clone());
    }

    fn delete(&mut self, id: &str, partition: Partition) {
        self.upserts.remove(id);
        self.deletes.insert((partition, id.to_string()));
    }
}

/// Note synchronization service
#[derive(Debug)]
pub struct SyncService {
    /// Local cache and preferences
    local: SharedLocalStore,

    /// Remote document store
    remote: SharedRemoteStore,

    /// Whether a remote session is confirmed
    session: SessionGate,

    /// Current state, with its observers
    state: watch::Sender<NoteState>,

    /// Held for the whole duration of every operation
    writer: Mutex<()>,
}

impl SyncService {
    /// Create the service, nothing is loaded until [`SyncService::load`]
    pub fn new(local: SharedLocalStore, remote: SharedRemoteStore, session: SessionGate) -> Self {
        let state = NoteState {
            signed_in: session.is_signed_in(),
            ..NoteState::default()
        };

        Self {
            local,
            remote,
            session,
            state: watch::Sender::new(state),
            writer: Mutex::new(()),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> NoteState {
        self.state.borrow().clone()
    }

    /// Receive every future state
    pub fn subscribe(&self) -> watch::Receiver<NoteState> {
        self.state.subscribe()
    }

    /// Reload the notes whenever the session changes
    ///
    /// The task stops once the service is dropped
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let mut receiver = self.session.subscribe();
        let service: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let Some(service) = service.upgrade() else {
                    break;
                };

                tracing::debug!("Session changed, reloading notes");

                if let Err(err) = service.load().await {
                    tracing::warn!("Could not reload notes after session change: {err}");
                }
            }
        })
    }

    /// Load the notes
    ///
    /// From the remote store (mirrored into the local cache) when sync is enabled and
    /// signed in, from the local cache otherwise. When the remote store fails the local
    /// cache is used and [`Error::NotSynced`] is returned.
    ///
    /// # Errors
    ///
    /// Will return `Err` when the remote store failed or the cache could not be written
    pub async fn load(&self) -> Result<()> {
        let _writer = self.writer.lock().await;

        self.load_locked().await
    }

    /// Fetch the notes from the remote store again
    ///
    /// Does nothing when sync is disabled or signed out. Queued local changes are pushed
    /// first. A failure leaves the notes as they were.
    ///
    /// # Errors
    ///
    /// Will return `Err` when the remote store failed or the cache could not be written
    pub async fn refresh(&self) -> Result<()> {
        let _writer = self.writer.lock().await;

        let signed_in = self.session.is_signed_in();
        self.state.send_modify(|state| state.signed_in = signed_in);

        if !self.state.borrow().remote_active() {
            tracing::debug!("Sync disabled or signed out, nothing to refresh");
            return Ok(());
        }

        self.state.send_modify(|state| state.loading = true);

        match self.sync_remote().await {
            Ok((notes, private_notes)) => {
                let mut state = self.snapshot();
                state.notes = notes;
                state.private_notes = private_notes;

                self.apply(state).await
            }
            Err(err) => {
                tracing::warn!("Could not refresh notes: {err}");
                self.state.send_modify(|state| state.loading = false);

                Err(err)
            }
        }
    }

    /// Create a note from a draft and add it
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::add_note`], and when the draft is invalid
    pub async fn add(&self, draft: NoteDraft) -> Result<Note> {
        self.add_note(Note::create(draft)?).await
    }

    /// Add a complete note
    ///
    /// Returns the note as stored, the remote store may have given it another ID
    ///
    /// # Errors
    ///
    /// Will return `Err` when the note is invalid or its ID is taken, nothing changes then.
    /// Will return [`Error::NotSynced`] when only the remote store failed, the note is
    /// added locally.
    pub async fn add_note(&self, note: Note) -> Result<Note> {
        note.validate()?;

        let _writer = self.writer.lock().await;
        let mut state = self.current_state();

        if state.find(&note.id).is_some() {
            return Err(Error::InvalidNote(format!(
                "A note with ID {} already exists",
                note.id
            )));
        }

        let (note, remote_result) = if state.remote_active() {
            match self.remote.create(&note).await {
                Ok(created) => (created, Ok(())),
                Err(err) => (note, Err(err)),
            }
        } else {
            (note, Ok(()))
        };

        insert_newest_first(state.partition_mut(note.partition()), note.clone());

        let queued = must_queue(&state, &remote_result);
        self.apply(state).await?;

        if queued {
            self.queue(|pending| pending.upsert(&note)).await?;
        }

        finish(remote_result, "add", &note.id)?;

        Ok(note)
    }

    /// Edit the user-editable parts of a note
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::update`], and when the draft is invalid
    pub async fn edit(&self, id: &str, draft: NoteDraft) -> Result<Note> {
        let mut note = self
            .snapshot()
            .find(id)
            .cloned()
            .ok_or_else(|| Error::NoteNotFound(id.to_string()))?;

        note.edit(draft)?;

        self.update(note).await
    }

    /// Replace a note
    ///
    /// A note that changed privacy moves to the other partition, keeping its ID
    ///
    /// # Errors
    ///
    /// Will return `Err` when the note is invalid or unknown, nothing changes then.
    /// Will return [`Error::NotSynced`] when only the remote store failed, the note is
    /// replaced locally.
    pub async fn update(&self, mut note: Note) -> Result<Note> {
        note.validate()?;

        let _writer = self.writer.lock().await;
        let mut state = self.current_state();

        let previous = state
            .find(&note.id)
            .cloned()
            .ok_or_else(|| Error::NoteNotFound(note.id.clone()))?;

        note.created_at = previous.created_at;
        note.updated_at = Utc::now();

        let remote_result = if !state.remote_active() {
            Ok(())
        } else if previous.partition() == note.partition() {
            self.remote.update(&note).await
        } else {
            self.move_remote(&note, previous.partition()).await
        };

        state
            .partition_mut(previous.partition())
            .retain(|existing| existing.id != note.id);
        insert_newest_first(state.partition_mut(note.partition()), note.clone());

        let queued = must_queue(&state, &remote_result);
        self.apply(state).await?;

        if queued {
            let from = previous.partition();

            self.queue(|pending| {
                if from != note.partition() {
                    pending.delete(&note.id, from);
                }
                pending.upsert(&note);
            })
            .await?;
        }

        finish(remote_result, "update", &note.id)?;

        Ok(note)
    }

    /// Delete a note
    ///
    /// # Errors
    ///
    /// Will return [`Error::NoteNotFound`] when neither partition has the note.
    /// Will return [`Error::NotSynced`] when only the remote store failed, the note is
    /// deleted locally.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.current_state();

        let partition = state
            .find(id)
            .map(Note::partition)
            .ok_or_else(|| Error::NoteNotFound(id.to_string()))?;

        let remote_result = if state.remote_active() {
            self.remote.delete(id, partition).await
        } else {
            Ok(())
        };

        state
            .partition_mut(partition)
            .retain(|existing| existing.id != id);

        let queued = must_queue(&state, &remote_result);
        self.apply(state).await?;

        if queued {
            self.queue(|pending| pending.delete(id, partition)).await?;
        }

        finish(remote_result, "delete", id)
    }

    /// Enable or disable sync
    ///
    /// Enabling queues every note for the remote store. Signed in, the queue is pushed
    /// and the notes are reloaded; signed out, the push waits for the next load with a
    /// confirmed session.
    ///
    /// # Errors
    ///
    /// Will return `Err` when the preference can not be stored. Will return
    /// [`Error::NotSynced`] when the push fails, the preference and the queue are kept
    /// so the next load or refresh pushes again
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        let _writer = self.writer.lock().await;

        self.local
            .set(keys::SYNC_ENABLED, if enabled { "true" } else { "false" })
            .await?;

        let state = self.current_state();
        self.state.send_modify(|current| current.sync_enabled = enabled);

        tracing::info!("Sync {}", if enabled { "enabled" } else { "disabled" });

        if !enabled {
            return Ok(());
        }

        let notes = state.notes.iter().chain(state.private_notes.iter());
        self.queue(|pending| notes.for_each(|note| pending.upsert(note))).await?;

        if !state.signed_in {
            return Ok(());
        }

        self.load_locked().await
    }

    /// State with the session freshly checked
    fn current_state(&self) -> NoteState {
        let signed_in = self.session.is_signed_in();
        self.state.send_modify(|state| state.signed_in = signed_in);

        self.snapshot()
    }

    async fn load_locked(&self) -> Result<()> {
        let sync_enabled = self.local.get(keys::SYNC_ENABLED).await.as_deref() == Some("true");
        let signed_in = self.session.is_signed_in();

        self.state.send_modify(|state| {
            state.loading = true;
            state.sync_enabled = sync_enabled;
            state.signed_in = signed_in;
        });

        let mut state = self.snapshot();

        if !state.remote_active() {
            let (notes, private_notes) = self.read_cache().await;
            state.notes = notes;
            state.private_notes = private_notes;

            tracing::debug!(
                "Loaded {} public and {} private notes from the local cache",
                state.notes.len(),
                state.private_notes.len()
            );

            state.loading = false;
            self.state.send_replace(state);

            return Ok(());
        }

        match self.sync_remote().await {
            Ok((notes, private_notes)) => {
                state.notes = notes;
                state.private_notes = private_notes;

                self.apply(state).await
            }
            Err(err) => {
                tracing::warn!("Could not load remote notes, using the local cache: {err}");

                let (notes, private_notes) = self.read_cache().await;
                state.notes = notes;
                state.private_notes = private_notes;
                state.loading = false;
                self.state.send_replace(state);

                Err(Error::not_synced(err))
            }
        }
    }

    /// Push the queued changes, then read both partitions from the remote store
    async fn sync_remote(&self) -> Result<(Vec<Note>, Vec<Note>)> {
        self.push_pending().await?;

        self.fetch_remote().await
    }

    /// Push the queued changes, the queue is kept unless all of them went through
    async fn push_pending(&self) -> Result<()> {
        let pending = self.read_pending().await;
        if pending.is_empty() {
            return Ok(());
        }

        tracing::info!("Pushing {} queued changes to the remote store", pending.len());

        for (partition, id) in &pending.deletes {
            self.remote.delete(id, *partition).await?;
        }

        let (notes, private_notes) = self.read_cache().await;
        let notes = notes
            .into_iter()
            .chain(private_notes)
            .filter(|note| pending.upserts.contains(&note.id))
            .collect::<Vec<_>>();

        if !notes.is_empty() {
            self.remote.batch_upsert(&notes).await?;
        }

        self.write_pending(&Pending::default()).await
    }

    async fn read_pending(&self) -> Pending {
        let Some(json) = self.local.get(keys::PENDING_WRITES).await else {
            return Pending::default();
        };

        serde_json::from_str(&json).unwrap_or_else(|err| {
            tracing::warn!("Ignoring unreadable queue of pending writes: {err}");
            Pending::default()
        })
    }

    async fn write_pending(&self, pending: &Pending) -> Result<()> {
        if pending.is_empty() {
            return self.local.remove(keys::PENDING_WRITES).await;
        }

        let json = serde_json::to_string(pending)?;

        self.local.set(keys::PENDING_WRITES, &json).await
    }

    /// Change the queue of pending writes and store it
    async fn queue(&self, change: impl FnOnce(&mut Pending)) -> Result<()> {
        let mut pending = self.read_pending().await;
        change(&mut pending);

        tracing::debug!("{} changes waiting for the remote store", pending.len());

        self.write_pending(&pending).await
    }

    /// Both partitions from the remote store, both have to succeed
    async fn fetch_remote(&self) -> Result<(Vec<Note>, Vec<Note>)> {
        let mut notes = self.remote.list(Partition::Public).await?;
        let mut private_notes = self.remote.list(Partition::Private).await?;

        sort_newest_first(&mut notes);
        sort_newest_first(&mut private_notes);

        Ok((notes, private_notes))
    }

    /// Move a note to the collection of its new partition, same ID
    async fn move_remote(&self, note: &Note, from: Partition) -> Result<()> {
        tracing::debug!(
            "Moving note {} from the {from} to the {} partition",
            note.id,
            note.partition()
        );

        self.remote.delete(&note.id, from).await?;
        self.remote.batch_upsert(std::slice::from_ref(note)).await
    }

    /// Both partitions from the local cache, empty when absent or unreadable
    async fn read_cache(&self) -> (Vec<Note>, Vec<Note>) {
        let mut notes = Vec::new();
        let mut private_notes = Vec::new();

        for partition in Partition::ALL {
            let cached = self.read_cached_partition(partition).await;

            match partition {
                Partition::Public => notes = cached,
                Partition::Private => private_notes = cached,
            }
        }

        (notes, private_notes)
    }

    async fn read_cached_partition(&self, partition: Partition) -> Vec<Note> {
        let Some(json) = self.local.get(partition.collection()).await else {
            return Vec::new();
        };

        let mut notes = match serde_json::from_str::<Vec<Note>>(&json) {
            Ok(notes) => notes,
            Err(err) => {
                tracing::warn!("Ignoring unreadable cache of {partition} notes: {err}");
                return Vec::new();
            }
        };

        notes.retain(|note| {
            if note.partition() != partition {
                tracing::warn!("Ignoring cached note {} in the {partition} cache", note.id);
                return false;
            }

            if let Err(err) = note.validate() {
                tracing::warn!("Ignoring invalid cached note {}: {err}", note.id);
                return false;
            }

            true
        });

        sort_newest_first(&mut notes);

        notes
    }

    /// Write both partitions to the local cache, then publish the state
    ///
    /// The state is published even when the cache write fails, the error is returned
    async fn apply(&self, mut state: NoteState) -> Result<()> {
        let persisted = self.write_cache(&state).await;

        if let Err(err) = &persisted {
            tracing::warn!("Could not write the local cache: {err}");
        }

        state.loading = false;
        self.state.send_replace(state);

        persisted
    }

    async fn write_cache(&self, state: &NoteState) -> Result<()> {
        let notes = serde_json::to_string(&state.notes)?;
        let private_notes = serde_json::to_string(&state.private_notes)?;

        self.local.set(keys::NOTES, &notes).await?;
        self.local.set(keys::PRIVATE_NOTES, &private_notes).await
    }
}

/// A write has to be queued when sync is on and the remote store did not take it
fn must_queue(state: &NoteState, remote_result: &Result<()>) -> bool {
    state.sync_enabled && (!state.signed_in || remote_result.is_err())
}

/// Turn the outcome of the remote half of a write into the result of the write
fn finish(remote_result: Result<()>, operation: &str, id: &str) -> Result<()> {
    remote_result.map_err(|err| {
        tracing::warn!("Remote {operation} of note {id} failed, kept locally: {err}");

        Error::not_synced(err)
    })
}

fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|one, other| other.created_at.cmp(&one.created_at));
}

fn insert_newest_first(notes: &mut Vec<Note>, note: Note) {
    let position = notes
        .iter()
        .position(|existing| existing.created_at < note.created_at)
        .unwrap_or(notes.len());

    notes.insert(position, note);
}
