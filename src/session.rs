//! Session gate
//!
//! Whether a remote session is active, as one persisted state. The auth client drives
//! the transitions, everyone else reads the current state or subscribes to changes.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::Result;
use crate::local::SharedLocalStore;
use crate::local::keys;

/// Who is signed in, and the token proving it
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// ID of the user at the remote store
    pub user_id: String,

    /// Bearer token for the remote store
    pub id_token: String,
}

/// State of the remote session
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SessionState {
    /// A session may exist but has not been confirmed
    #[default]
    Unknown,

    /// Confirmed session
    SignedIn(Identity),

    /// Never signed in, or explicitly signed out
    SignedOut,
}

impl SessionState {
    /// Identity of a confirmed session
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            SessionState::Unknown | SessionState::SignedOut => None,
        }
    }
}

/// Tracks and persists the session state
#[derive(Clone, Debug)]
pub struct SessionGate {
    /// Where the state is persisted
    store: SharedLocalStore,

    /// Current state, with its subscribers
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionGate {
    /// Restore the state persisted by a previous run
    ///
    /// The flags of older versions (`auth_state` = "true" and `user_signed_out` = "true")
    /// are migrated: the sign-out marker wins, a bare flag becomes [`SessionState::Unknown`]
    pub async fn restore(store: SharedLocalStore) -> Self {
        let signed_out_marker = store.get(keys::USER_SIGNED_OUT).await.as_deref() == Some("true");
        let persisted = store.get(keys::AUTH_STATE).await;

        let (state, legacy) = match persisted.as_deref() {
            _ if signed_out_marker => (SessionState::SignedOut, true),
            None => (SessionState::SignedOut, false),
            Some("true") => (SessionState::Unknown, true),
            Some(json) => match serde_json::from_str::<SessionState>(json) {
                Ok(state) => (state, false),
                Err(err) => {
                    tracing::warn!("Ignoring unreadable session state: {err}");
                    (SessionState::SignedOut, false)
                }
            },
        };

        let gate = Self {
            store,
            state: Arc::new(watch::Sender::new(state)),
        };

        if legacy {
            tracing::info!("Migrating legacy session flags");

            if let Err(err) = gate.persist(&gate.current()).await {
                tracing::warn!("Could not migrate legacy session flags: {err}");
            } else if let Err(err) = gate.store.remove(keys::USER_SIGNED_OUT).await {
                tracing::warn!("Could not remove legacy sign-out marker: {err}");
            }
        }

        gate
    }

    /// Current state
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Identity of the confirmed session, if any
    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Is a session confirmed?
    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().identity().is_some()
    }

    /// Receive every future state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// A session has been confirmed
    ///
    /// # Errors
    ///
    /// Will return `Err` when the state can not be persisted, the state is not changed then
    pub async fn sign_in(&self, identity: Identity) -> Result<()> {
        tracing::info!("Signed in as {}", identity.user_id);

        self.transition(SessionState::SignedIn(identity)).await
    }

    /// The user signed out
    ///
    /// # Errors
    ///
    /// Will return `Err` when the state can not be persisted, the state is not changed then
    pub async fn sign_out(&self) -> Result<()> {
        tracing::info!("Signed out");

        self.transition(SessionState::SignedOut).await
    }

    /// The session could not be confirmed (for example an expired token)
    ///
    /// # Errors
    ///
    /// Will return `Err` when the state can not be persisted, the state is not changed then
    pub async fn invalidate(&self) -> Result<()> {
        tracing::info!("Session no longer confirmed");

        self.transition(SessionState::Unknown).await
    }

    async fn transition(&self, state: SessionState) -> Result<()> {
        self.persist(&state).await?;

        self.state.send_replace(state);

        Ok(())
    }

    async fn persist(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string(state)?;

        self.store.set(keys::AUTH_STATE, &json).await
    }
}
