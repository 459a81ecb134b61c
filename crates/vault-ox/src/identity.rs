//! Per-profile identity token sent as `X-User-ID` on every request.
//!
//! The token is created lazily, persisted through an [`IdentityStore`] and never
//! rotated. When the store fails the provider keeps working with an in-memory
//! token for the lifetime of the process.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;

/// Header carrying the identity token
pub const IDENTITY_HEADER: &str = "X-User-ID";

/// Opaque identity token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Time based token: milliseconds since the UNIX epoch.
    #[must_use]
    pub fn generate() -> Self {
        Self(Utc::now().timestamp_millis().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Durable storage for the identity token
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
}

/// Stores the token in a small text file
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }
}

/// Keeps the token in memory only
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    token: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }
}

/// Token in use plus whether the store has been consulted yet
#[derive(Debug, Default)]
struct IdentitySlot {
    identity: Option<Identity>,
    loaded: bool,
}

/// Resolves and lazily creates the identity token. Cheap to clone; clones
/// share the same token.
///
/// The store is read at most once. An empty or failed read is remembered, so
/// requests sent before the token exists do not touch storage again.
#[derive(Clone)]
pub struct IdentityProvider {
    store: Arc<dyn IdentityStore>,
    current: Arc<Mutex<IdentitySlot>>,
}

impl IdentityProvider {
    pub fn new(store: impl IdentityStore + 'static) -> Self {
        Self::from_store(Arc::new(store))
    }

    pub fn from_store(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            current: Arc::new(Mutex::new(IdentitySlot::default())),
        }
    }

    /// Provider backed by nothing but memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryIdentityStore::default())
    }

    /// Lock the cached token, recovering from a poisoned mutex
    fn lock(&self) -> MutexGuard<'_, IdentitySlot> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a token from the store, treating failures as "no token"
    fn load_from_store(&self) -> Option<Identity> {
        match self.store.load() {
            Ok(token) => token.map(Identity),
            Err(e) => {
                log::warn!("identity storage unreadable, continuing without stored token: {e}");
                None
            }
        }
    }

    /// Fill the slot from the store on first use
    fn load_once(&self, slot: &mut IdentitySlot) {
        if !slot.loaded {
            slot.identity = self.load_from_store();
            slot.loaded = true;
        }
    }

    /// The current token, if one has been created. Never creates one.
    #[must_use]
    pub fn get_identity(&self) -> Option<Identity> {
        let mut slot = self.lock();
        self.load_once(&mut slot);
        slot.identity.clone()
    }

    /// The current token, creating and persisting one if none exists yet.
    /// Repeated calls return the same token.
    #[must_use]
    pub fn ensure_identity(&self) -> Identity {
        let mut slot = self.lock();
        self.load_once(&mut slot);
        if let Some(identity) = slot.identity.as_ref() {
            return identity.clone();
        }

        let identity = Identity::generate();
        if let Err(e) = self.store.save(identity.as_str()) {
            log::warn!("identity storage unavailable, keeping token in memory only: {e}");
        }
        log::debug!("created identity {identity}");
        slot.identity = Some(identity.clone());
        identity
    }
}

impl fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvider")
            .field("current", &self.lock().identity)
            .finish_non_exhaustive()
    }
}
