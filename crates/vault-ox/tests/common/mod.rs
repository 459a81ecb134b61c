#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use vault_ox::{
    FileRecord, GraphqlError, GraphqlRequest, GraphqlResponse, Identity, IdentityProvider,
    MemoryIdentityStore, Role, Timestamp, Transport, UploadFile, UserRecord, Vault, VaultConfig,
    VaultError,
};

/// One call seen by a fake transport
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: String,
    pub identity: Option<String>,
    pub variables: Value,
}

pub fn file(id: &str, filename: &str, size: u64, mime: Option<&str>) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        filename: filename.to_string(),
        size_bytes: size,
        mime_type: mime.map(ToString::to_string),
        is_public: false,
        created_at: Timestamp::from_unix_seconds(1_735_689_600).expect("valid"),
        public_token: None,
        download_count: 0,
    }
}

pub fn user(id: &str, role: Role) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: id.to_uppercase(),
        role,
        created_at: Timestamp::from_unix_seconds(1_735_689_600).expect("valid"),
    }
}

#[derive(Debug, Default)]
struct BackendState {
    files: Vec<FileRecord>,
    users: Vec<UserRecord>,
    next_token: u64,
    failing: HashSet<String>,
    calls: Vec<Call>,
    uploads: Vec<(String, Vec<String>)>,
}

/// In-memory stand-in for the vault backend
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    latency: Option<Duration>,
}

impl FakeBackend {
    pub fn new(files: Vec<FileRecord>, users: Vec<UserRecord>) -> Self {
        Self {
            state: Mutex::new(BackendState {
                files,
                users,
                ..BackendState::default()
            }),
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call of this operation answer with a GraphQL error
    pub fn fail(&self, operation: &str) {
        self.state.lock().unwrap().failing.insert(operation.to_string());
    }

    pub fn heal(&self, operation: &str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.operation == operation).count()
    }

    pub fn last(&self, operation: &str) -> Option<Call> {
        self.calls().into_iter().rev().find(|c| c.operation == operation)
    }

    pub fn uploads(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.id == user_id).map(|u| u.role.clone())
    }

    pub fn add_file(&self, record: FileRecord) {
        self.state.lock().unwrap().files.push(record);
    }

    fn handle(&self, request: &GraphqlRequest, identity: Option<&Identity>) -> GraphqlResponse {
        let operation = request.operation_name.clone().unwrap_or_default();
        let vars = &request.variables;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            operation: operation.clone(),
            identity: identity.map(ToString::to_string),
            variables: Value::Object(vars.clone()),
        });

        if state.failing.contains(&operation) {
            return GraphqlResponse::with_errors(vec![GraphqlError {
                message: format!("{operation} failed"),
                path: None,
            }]);
        }

        let str_var = |name: &str| vars.get(name).and_then(Value::as_str).map(ToString::to_string);
        let u64_var = |name: &str| vars.get(name).and_then(Value::as_u64);

        let data = match operation.as_str() {
            "MyFiles" => {
                let name_like = str_var("nameLike").map(|s| s.to_lowercase());
                let mimes: Option<Vec<String>> = vars
                    .get("mimeTypes")
                    .and_then(|v| serde_json::from_value(v.clone()).ok());
                let size_min = u64_var("sizeMin");
                let size_max = u64_var("sizeMax");
                let limit = usize::try_from(u64_var("limit").unwrap_or(50)).unwrap();
                let offset = usize::try_from(u64_var("offset").unwrap_or(0)).unwrap();
                let files: Vec<&FileRecord> = state
                    .files
                    .iter()
                    .filter(|f| name_like.as_ref().is_none_or(|n| f.filename.to_lowercase().contains(n)))
                    .filter(|f| {
                        mimes
                            .as_ref()
                            .is_none_or(|m| f.mime_type.as_ref().is_some_and(|t| m.contains(t)))
                    })
                    .filter(|f| size_min.is_none_or(|min| f.size_bytes >= min))
                    .filter(|f| size_max.is_none_or(|max| f.size_bytes <= max))
                    .skip(offset)
                    .take(limit)
                    .collect();
                json!({ "myFiles": files })
            }
            "MyStorageStats" => {
                let original: u64 = state.files.iter().map(|f| f.size_bytes).sum();
                let mut seen = HashSet::new();
                let deduped: u64 = state
                    .files
                    .iter()
                    .filter(|f| seen.insert(f.filename.clone()))
                    .map(|f| f.size_bytes)
                    .sum();
                let saved = original - deduped;
                #[allow(clippy::cast_precision_loss)]
                let percent = if original > 0 { saved as f64 / original as f64 * 100.0 } else { 0.0 };
                json!({ "myStorageStats": {
                    "originalBytes": original,
                    "dedupedBytes": deduped,
                    "savedBytes": saved,
                    "savedPercent": percent
                }})
            }
            "AllFiles" => json!({ "allFiles": state.files }),
            "AllUsers" => json!({ "allUsers": state.users }),
            "CreatePublicLink" => {
                let id = str_var("fileId").unwrap_or_default();
                state.next_token += 1;
                let fresh = format!("tok-{}", state.next_token);
                match state.files.iter_mut().find(|f| f.id == id) {
                    Some(f) => {
                        let token = f.public_token.get_or_insert(fresh).clone();
                        json!({ "createPublicLink": token })
                    }
                    None => {
                        return GraphqlResponse::with_errors(vec![GraphqlError {
                            message: "file not found".to_string(),
                            path: None,
                        }]);
                    }
                }
            }
            "RevokePublicLink" => {
                let id = str_var("fileId").unwrap_or_default();
                let found = state.files.iter_mut().find(|f| f.id == id).map(|f| f.public_token = None).is_some();
                json!({ "revokePublicLink": found })
            }
            "TogglePublic" => {
                let id = str_var("fileId").unwrap_or_default();
                let public = vars.get("isPublic").and_then(Value::as_bool).unwrap_or(false);
                let found = state.files.iter_mut().find(|f| f.id == id).map(|f| f.is_public = public).is_some();
                json!({ "togglePublic": found })
            }
            "DeleteFile" => {
                let id = str_var("fileId").unwrap_or_default();
                let before = state.files.len();
                state.files.retain(|f| f.id != id);
                json!({ "deleteFile": state.files.len() < before })
            }
            "SetUserRole" => {
                let id = str_var("userId").unwrap_or_default();
                let role = Role::from(str_var("role").unwrap_or_default());
                let found = state.users.iter_mut().find(|u| u.id == id).map(|u| u.role = role).is_some();
                json!({ "setUserRole": found })
            }
            other => {
                return GraphqlResponse::with_errors(vec![GraphqlError {
                    message: format!("unknown operation {other}"),
                    path: None,
                }]);
            }
        };
        GraphqlResponse::with_data(data)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: GraphqlRequest, identity: Option<Identity>) -> Result<GraphqlResponse, VaultError> {
        let response = self.handle(&request, identity.as_ref());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(response)
    }

    async fn upload(&self, files: Vec<UploadFile>, identity: Identity) -> Result<(), VaultError> {
        let mut state = self.state.lock().unwrap();
        let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        for f in &files {
            let id = format!("f{}", state.files.len() + 1);
            let mut record = file(&id, &f.filename, f.data.len() as u64, f.mime_type.as_deref());
            record.created_at = Timestamp::now();
            state.files.push(record);
        }
        state.uploads.push((identity.to_string(), names));
        Ok(())
    }

    async fn download_public(&self, token: &str) -> Result<Bytes, VaultError> {
        let mut state = self.state.lock().unwrap();
        match state.files.iter_mut().find(|f| f.public_token.as_deref() == Some(token)) {
            Some(f) => {
                f.download_count += 1;
                Ok(Bytes::from(f.filename.clone().into_bytes()))
            }
            None => Err(VaultError::Server(vec![GraphqlError {
                message: "not found".to_string(),
                path: None,
            }])),
        }
    }
}

/// A request held by [`GatedTransport`] until the test releases it
pub struct Pending {
    pub request: GraphqlRequest,
    pub identity: Option<Identity>,
    reply: oneshot::Sender<Result<GraphqlResponse, VaultError>>,
}

impl Pending {
    pub fn respond(self, data: Value) {
        let _ = self.reply.send(Ok(GraphqlResponse::with_data(data)));
    }

    pub fn fail(self, error: VaultError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Transport whose responses are released in whatever order the test chooses
#[derive(Default)]
pub struct GatedTransport {
    pending: Mutex<VecDeque<Pending>>,
    issued: Mutex<usize>,
}

impl GatedTransport {
    pub fn issued(&self) -> usize {
        *self.issued.lock().unwrap()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Take the oldest held request
    pub fn take(&self) -> Pending {
        self.pending.lock().unwrap().pop_front().expect("a pending request")
    }

    /// Yield to other tasks until `n` requests are held
    pub async fn wait_for(&self, n: usize) {
        for _ in 0..1000 {
            if self.pending() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} pending requests, have {}", self.pending());
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn execute(&self, request: GraphqlRequest, identity: Option<Identity>) -> Result<GraphqlResponse, VaultError> {
        let (reply, rx) = oneshot::channel();
        *self.issued.lock().unwrap() += 1;
        self.pending.lock().unwrap().push_back(Pending { request, identity, reply });
        rx.await.unwrap_or_else(|_| Err(VaultError::validation("gate dropped")))
    }

    async fn upload(&self, _files: Vec<UploadFile>, _identity: Identity) -> Result<(), VaultError> {
        Ok(())
    }

    async fn download_public(&self, _token: &str) -> Result<Bytes, VaultError> {
        Ok(Bytes::new())
    }
}

pub fn identity(token: &str) -> IdentityProvider {
    IdentityProvider::new(MemoryIdentityStore::with_token(token))
}

pub fn vault_over(transport: Arc<dyn Transport>) -> Vault {
    Vault::with_transport(VaultConfig::default(), transport, identity("1700000000000"))
}

pub fn sample_backend() -> Arc<FakeBackend> {
    Arc::new(FakeBackend::new(
        vec![
            file("f1", "holiday.png", 2048, Some("image/png")),
            file("f2", "report.pdf", 500_000, Some("application/pdf")),
            file("f3", "notes.txt", 120, Some("text/plain")),
        ],
        vec![user("alice", Role::Admin), user("bob", Role::User)],
    ))
}
