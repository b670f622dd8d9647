//! Account context and on-disk persistence of account settings.
//!
//! An [`Account`] owns the live [`DriverConfig`], including the token pair.
//! Token rotation goes through [`Account::update_tokens`], which is the only
//! writer, and then hands the new settings to the save hook. The default
//! hook is an [`AccountStore`], which keeps one JSON file per account.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use open115_client::TokenPair;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::DriverError;

/// Called with the account id and settings after every token rotation.
pub type SaveHook = Arc<dyn Fn(&str, &DriverConfig) -> Result<(), DriverError> + Send + Sync>;

/// One configured account.
pub struct Account {
    id: String,
    config: RwLock<DriverConfig>,
    save_hook: Option<SaveHook>,
}

impl Account {
    pub fn new(id: impl Into<String>, config: DriverConfig) -> Self {
        Self {
            id: id.into(),
            config: RwLock::new(config),
            save_hook: None,
        }
    }

    pub fn with_save_hook(
        mut self,
        hook: impl Fn(&str, &DriverConfig) -> Result<(), DriverError> + Send + Sync + 'static,
    ) -> Self {
        self.save_hook = Some(Arc::new(hook));
        self
    }

    /// Persists rotated tokens through `store`.
    pub fn with_store(self, store: Arc<AccountStore>) -> Self {
        self.with_save_hook(move |id, config| store.save(id, config))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> DriverConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn tokens(&self) -> TokenPair {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        TokenPair::new(config.access_token.clone(), config.refresh_token.clone())
    }

    /// Replaces the token pair and runs the save hook.
    ///
    /// A failing hook is logged; the in-memory pair stays rotated.
    pub fn update_tokens(&self, tokens: &TokenPair) {
        let snapshot = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            config.access_token.clone_from(&tokens.access_token);
            config.refresh_token.clone_from(&tokens.refresh_token);
            config.clone()
        };
        debug!(account = %self.id, "token pair rotated");
        if let Some(hook) = &self.save_hook
            && let Err(e) = hook(&self.id, &snapshot)
        {
            warn!(account = %self.id, error = %e, "failed to save rotated tokens");
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("config", &*self.config.read().unwrap_or_else(PoisonError::into_inner))
            .field("save_hook", &self.save_hook.is_some())
            .finish()
    }
}

/// One JSON settings file per account under a directory.
#[derive(Debug, Clone)]
pub struct AccountStore {
    dir: PathBuf,
}

impl AccountStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at [`default_account_dir`].
    pub fn open_default() -> Result<Self, DriverError> {
        default_account_dir()
            .map(Self::new)
            .ok_or_else(|| DriverError::Config("no config directory for this platform".into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the settings file for `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf, DriverError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Loads settings for `id`, or `None` if nothing is stored.
    pub fn load(&self, id: &str) -> Result<Option<DriverConfig>, DriverError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let config = serde_json::from_str(&data)?;
        debug!(account = %id, path = %path.display(), "loaded account settings");
        Ok(Some(config))
    }

    /// Writes settings for `id`, creating the directory if needed.
    pub fn save(&self, id: &str, config: &DriverConfig) -> Result<(), DriverError> {
        let path = self.path_for(id)?;
        let json = serde_json::to_string_pretty(config)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, json)?;
        debug!(account = %id, path = %path.display(), "persisted account settings");
        Ok(())
    }

    /// Deletes the settings for `id`. Missing files are not an error.
    pub fn remove(&self, id: &str) -> Result<(), DriverError> {
        match std::fs::remove_file(self.path_for(id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every stored account, sorted.
    pub fn ids(&self) -> Result<Vec<String>, DriverError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Loads `id` and wires this store as its save hook.
    pub fn open_account(self: &Arc<Self>, id: &str) -> Result<Account, DriverError> {
        let config = self
            .load(id)?
            .ok_or_else(|| DriverError::Config(format!("account {id:?} not found")))?;
        info!(account = %id, "opened account");
        Ok(Account::new(id, config).with_store(Arc::clone(self)))
    }
}

fn validate_id(id: &str) -> Result<(), DriverError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DriverError::Config(format!("invalid account id {id:?}")))
    }
}

/// Returns the default account directory.
pub fn default_account_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("open115").join("accounts"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
