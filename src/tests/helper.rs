use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tower::Service;
use uuid::Uuid;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::local::LocalBackend;
use crate::local::Memory as MemoryStore;
use crate::local::SharedLocalStore;
use crate::local::keys;
use crate::note::Category;
use crate::note::Note;
use crate::note::NoteDraft;
use crate::note::Partition;
use crate::remote::RemoteStore;
use crate::remote::RestClient;
use crate::server::api::JwtKeys;
use crate::server::create_router;
use crate::server::storage::Memory;
use crate::session::Identity;
use crate::session::SessionGate;
use crate::sync::SyncService;

/// Test helper version of a session
#[derive(Debug)]
pub struct Session {
    pub id_token: String,
    pub local_id: String,
}

impl Session {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.id_token)
    }
}

/// Setup the document store, with a fixed JWT secret
pub fn setup_test_app() -> Router {
    create_router(Memory::new(), JwtKeys::new(b"verysecret"))
}

/// Call the app with an optional token and JSON body
pub async fn call(
    app: &mut Router,
    method: Method,
    uri: &str,
    access_token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(access_token) = access_token {
        builder = builder.header(AUTHORIZATION, access_token);
    }

    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, to_json(&body))
}

fn to_json(body: &Bytes) -> Value {
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body[..]).unwrap()
    }
}

pub async fn maybe_sign_up(app: &mut Router, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/v1/accounts:signUp",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

pub async fn maybe_sign_in(app: &mut Router, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/v1/accounts:signInWithPassword",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// Sign up a fresh user
pub async fn sign_up(app: &mut Router) -> Session {
    let email = format!("{}@example.com", Uuid::new_v4());

    let (status_code, body) = maybe_sign_up(app, &email, "verysecret").await;
    assert_eq!(StatusCode::OK, status_code);

    get_session(&body)
}

pub fn get_session(body: &Value) -> Session {
    Session {
        id_token: body["idToken"].as_str().map(ToString::to_string).unwrap(),
        local_id: body["localId"].as_str().map(ToString::to_string).unwrap(),
    }
}

pub fn get_error_message(body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .map(ToString::to_string)
        .unwrap()
}

/// Fields of a note-like document owned by a user
pub fn note_fields(owner_id: &str, title: &str) -> Value {
    json!({
        "userId": { "stringValue": owner_id },
        "title": { "stringValue": title },
        "isPrivate": { "booleanValue": false },
    })
}

pub async fn list_documents(
    app: &mut Router,
    session: &Session,
    collection: &str,
) -> (StatusCode, Vec<Value>) {
    let (status_code, body) = call(
        app,
        Method::GET,
        &format!("/v1/documents/{collection}"),
        Some(&session.bearer()),
        None,
    )
    .await;

    let documents = body["documents"].as_array().cloned().unwrap_or_default();

    (status_code, documents)
}

pub async fn maybe_create_document(
    app: &mut Router,
    session: &Session,
    collection: &str,
    fields: Value,
) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        &format!("/v1/documents/{collection}"),
        Some(&session.bearer()),
        Some(json!({ "fields": fields })),
    )
    .await
}

pub async fn maybe_upsert_document(
    app: &mut Router,
    session: &Session,
    collection: &str,
    id: &str,
    fields: Value,
) -> (StatusCode, Value) {
    call(
        app,
        Method::PATCH,
        &format!("/v1/documents/{collection}/{id}"),
        Some(&session.bearer()),
        Some(json!({ "fields": fields })),
    )
    .await
}

pub async fn single_document(
    app: &mut Router,
    session: &Session,
    collection: &str,
    id: &str,
) -> (StatusCode, Value) {
    call(
        app,
        Method::GET,
        &format!("/v1/documents/{collection}/{id}"),
        Some(&session.bearer()),
        None,
    )
    .await
}

pub async fn maybe_delete_document(
    app: &mut Router,
    session: &Session,
    collection: &str,
    id: &str,
) -> (StatusCode, Value) {
    call(
        app,
        Method::DELETE,
        &format!("/v1/documents/{collection}/{id}"),
        Some(&session.bearer()),
        None,
    )
    .await
}

pub async fn maybe_commit(app: &mut Router, session: &Session, writes: Value) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/v1/documents:commit",
        Some(&session.bearer()),
        Some(json!({ "writes": writes })),
    )
    .await
}

/// Serve the document store on a free local port
pub async fn spawn_backend() -> Config {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, setup_test_app()).await.unwrap();
    });

    client_config(&format!("http://{address}"))
}

/// Client configuration for an endpoint, with an in-memory local store
pub fn client_config(endpoint: &str) -> Config {
    let mut config = Config::with_endpoint(endpoint).unwrap();
    config.local = LocalBackend::Memory;
    config
}

/// Everything the client needs to talk to a backend
pub struct Client {
    pub local: SharedLocalStore,
    pub session: SessionGate,
    pub auth: AuthClient,
    pub remote: RestClient,
}

pub async fn setup_client(config: &Config) -> Client {
    let local: SharedLocalStore = Arc::new(MemoryStore::new());
    let session = SessionGate::restore(local.clone()).await;

    Client {
        auth: AuthClient::new(config, session.clone()).unwrap(),
        remote: RestClient::new(config, session.clone()).unwrap(),
        local,
        session,
    }
}

/// A client signed up as a fresh user
pub async fn setup_signed_in_client(config: &Config) -> (Client, Identity) {
    let client = setup_client(config).await;

    let identity = client
        .auth
        .sign_up(&format!("{}@example.com", Uuid::new_v4()), "verysecret")
        .await
        .unwrap();

    (client, identity)
}

pub fn draft(title: &str) -> NoteDraft {
    NoteDraft {
        title: title.to_string(),
        content: format!("Content of {title}"),
        category: Category::Work,
        is_private: false,
    }
}

pub fn private_draft(title: &str) -> NoteDraft {
    NoteDraft {
        is_private: true,
        ..draft(title)
    }
}

pub fn note(title: &str) -> Note {
    Note::create(draft(title)).unwrap()
}

/// Remote store in memory, can be told to fail or to be slow
#[derive(Debug, Default)]
pub struct FakeRemote {
    notes: Mutex<HashMap<(Partition, String), Note>>,
    updates: Mutex<Vec<String>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl FakeRemote {
    /// Make every following call fail, or stop failing
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every following call take this long
    pub fn slow_down(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Titles of all updates, in the order they arrived
    pub fn updated_titles(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }

    /// Number of calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stored notes of a partition
    pub fn notes(&self, partition: Partition) -> Vec<Note> {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .filter(|((stored_partition, _), _)| *stored_partition == partition)
            .map(|(_, note)| note.clone())
            .collect()
    }

    /// Put a note in place, as if another device wrote it
    pub fn insert(&self, note: Note) {
        self.notes
            .lock()
            .unwrap()
            .insert((note.partition(), note.id.clone()), note);
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Unreachable("Connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn list(&self, partition: Partition) -> Result<Vec<Note>> {
        self.enter().await?;

        Ok(self.notes(partition))
    }

    async fn create(&self, note: &Note) -> Result<Note> {
        self.enter().await?;

        let created = Note {
            id: Uuid::new_v4().to_string(),
            ..note.clone()
        };
        self.insert(created.clone());

        Ok(created)
    }

    async fn update(&self, note: &Note) -> Result<()> {
        self.enter().await?;

        self.updates.lock().unwrap().push(note.title.clone());
        self.insert(note.clone());

        Ok(())
    }

    async fn delete(&self, id: &str, partition: Partition) -> Result<()> {
        self.enter().await?;

        self.notes
            .lock()
            .unwrap()
            .remove(&(partition, id.to_string()));

        Ok(())
    }

    async fn batch_upsert(&self, notes: &[Note]) -> Result<()> {
        self.enter().await?;

        for note in notes {
            self.insert(note.clone());
        }

        Ok(())
    }
}

/// Sync service over a fake remote store
pub struct SyncFixture {
    pub local: SharedLocalStore,
    pub remote: Arc<FakeRemote>,
    pub session: SessionGate,
    pub service: Arc<SyncService>,
}

pub fn identity() -> Identity {
    Identity {
        user_id: "someone".to_string(),
        id_token: "token".to_string(),
    }
}

/// Setup a loaded sync service
pub async fn setup_sync(sync_enabled: bool, signed_in: bool) -> SyncFixture {
    let local: SharedLocalStore = Arc::new(MemoryStore::new());
    local
        .set(keys::SYNC_ENABLED, if sync_enabled { "true" } else { "false" })
        .await
        .unwrap();

    let session = SessionGate::restore(local.clone()).await;
    if signed_in {
        session.sign_in(identity()).await.unwrap();
    }

    let remote = Arc::new(FakeRemote::default());
    let service = Arc::new(SyncService::new(
        local.clone(),
        remote.clone(),
        session.clone(),
    ));

    service.load().await.unwrap();

    SyncFixture {
        local,
        remote,
        session,
        service,
    }
}

/// Notes in the local cache of a partition
pub async fn cached_notes(local: &SharedLocalStore, partition: Partition) -> Vec<Note> {
    local
        .get(partition.collection())
        .await
        .map(|json| serde_json::from_str(&json).unwrap())
        .unwrap_or_default()
}
