//! Roster configuration
//!
//! Loaded from `roster.toml`; every key is optional. The remote credential
//! may also come from `ROSTER_REMOTE_TOKEN`, which takes precedence over the
//! file.

use crate::error::{ConfigError, RosterError};
use crate::journal::ChangeJournal;
use crate::registry::{Defaults, Registry};
use roster_merge::Validator;
use roster_record::{DepartmentAliases, IdentityAllocator, Person, RecordKind, Student};
use roster_store::{
    CommitAuthor, FsSnapshotStore, GitHubApi, GitHubConfig, LocalBackend, RemoteBackend,
    StorageBackend, WebhookTrigger, DEFAULT_TIMEOUT, GITHUB_API,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default config file name
pub const CONFIG_FILE: &str = "roster.toml";

/// Environment variable holding the remote credential
pub const TOKEN_ENV: &str = "ROSTER_REMOTE_TOKEN";

/// Where artifacts are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    Remote,
}

/// Remote repository settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// `owner/name`
    pub repository: String,
    pub branch: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub api_base: String,
    /// Directory of JSON artifacts in the repository
    pub json_base_path: String,
    /// Directory of media assets in the repository
    pub media_base_path: String,
    /// URL POSTed after every successful commit
    pub deploy_hook: Option<String>,
    pub timeout_secs: u64,
    pub commit_author: Option<CommitAuthor>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            branch: "main".to_string(),
            token: None,
            api_base: GITHUB_API.to_string(),
            json_base_path: String::new(),
            media_base_path: String::new(),
            deploy_hook: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            commit_author: None,
        }
    }
}

impl RemoteConfig {
    /// Repository path of an artifact
    ///
    /// With a `json_base_path` the artifact's file name is placed under it;
    /// otherwise the configured relative path is used as is.
    #[must_use]
    pub fn artifact_path(&self, relative: &str) -> String {
        let base = self.json_base_path.trim_matches('/');
        if base.is_empty() {
            return relative.trim_start_matches('/').to_string();
        }
        let file = relative.rsplit('/').next().unwrap_or(relative);
        format!("{base}/{file}")
    }

    /// Repository path of a media reference
    #[must_use]
    pub fn media_path(&self, reference: &str) -> String {
        let base = self.media_base_path.trim_matches('/');
        let reference = reference.trim_start_matches('/');
        if base.is_empty() {
            reference.to_string()
        } else {
            format!("{base}/{reference}")
        }
    }

    fn github(&self) -> GitHubConfig {
        GitHubConfig {
            api_base: self.api_base.clone(),
            repository: self.repository.clone(),
            branch: self.branch.clone(),
            token: self.token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            committer: self.commit_author.clone(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    pub storage: StorageMode,
    /// Base directory for relative local paths
    pub root: PathBuf,
    pub people_path: String,
    pub students_path: String,
    pub backup_dir: PathBuf,
    /// `None` disables the journal
    pub journal_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    /// Report media files missing under the media root
    pub check_media: bool,
    pub person_prefix: String,
    pub student_prefix: String,
    /// Prefix for people first seen in an import
    pub import_prefix: String,
    pub department_aliases: DepartmentAliases,
    pub remote: Option<RemoteConfig>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            storage: StorageMode::Local,
            root: PathBuf::from("."),
            people_path: "data/teachers.json".to_string(),
            students_path: "data/students.json".to_string(),
            backup_dir: PathBuf::from("data/backups"),
            journal_path: Some(PathBuf::from("todo.txt")),
            media_root: None,
            check_media: false,
            person_prefix: "teacher".to_string(),
            student_prefix: "student".to_string(),
            import_prefix: "import".to_string(),
            department_aliases: DepartmentAliases::new(),
            remote: None,
        }
    }
}

impl RosterConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML and validate
    ///
    /// # Errors
    /// `Parse` on bad syntax or unknown keys, `Invalid` on inconsistent values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults if it does not exist, then apply the
    /// environment
    ///
    /// # Errors
    /// See [`Self::from_toml_str`]; `Read` if the file exists but cannot be read
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loading config");
                toml::from_str(&text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.remote.get_or_insert_with(RemoteConfig::default).token = Some(token);
        }
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    /// `Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, prefix) in [
            ("person_prefix", &self.person_prefix),
            ("student_prefix", &self.student_prefix),
            ("import_prefix", &self.import_prefix),
        ] {
            IdentityAllocator::scan(prefix, [])
                .map_err(|e| ConfigError::Invalid(format!("{key}: {e}")))?;
        }
        for (key, path) in [
            ("people_path", &self.people_path),
            ("students_path", &self.students_path),
        ] {
            if path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} is empty")));
            }
        }

        if self.storage == StorageMode::Remote {
            let remote = self.remote.as_ref().ok_or_else(|| {
                ConfigError::Invalid("storage = \"remote\" needs a [remote] section".to_string())
            })?;
            let valid_repo = remote
                .repository
                .split_once('/')
                .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
            if !valid_repo {
                return Err(ConfigError::Invalid(format!(
                    "remote.repository must be 'owner/name', got '{}'",
                    remote.repository
                )));
            }
            if remote.branch.trim().is_empty() {
                return Err(ConfigError::Invalid("remote.branch is empty".to_string()));
            }
            if remote.timeout_secs == 0 {
                return Err(ConfigError::Invalid("remote.timeout_secs must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Resolve a path against `root`
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Validator with the media root when media checks are enabled
    #[must_use]
    pub fn validator(&self) -> Validator {
        if !self.check_media {
            return Validator::new();
        }
        let root = self
            .media_root
            .as_ref()
            .map_or_else(|| self.root.clone(), |m| self.resolve(m));
        Validator::new().with_media_root(root)
    }

    #[must_use]
    pub fn journal(&self) -> ChangeJournal {
        let journal = match &self.journal_path {
            Some(path) => ChangeJournal::new(self.resolve(path)),
            None => return ChangeJournal::disabled(),
        };
        // remote commits and journal lines name the same author
        match self.remote.as_ref().and_then(|r| r.commit_author.as_ref()) {
            Some(author) => journal.with_author(author.name.clone()),
            None => journal,
        }
    }

    #[must_use]
    pub fn defaults(&self) -> Defaults {
        Defaults {
            person_prefix: self.person_prefix.clone(),
            student_prefix: self.student_prefix.clone(),
            import_prefix: self.import_prefix.clone(),
            aliases: self.department_aliases.clone(),
        }
    }

    /// Storage backend for an artifact at `relative`
    ///
    /// # Errors
    /// `Config` if remote storage is selected without a `[remote]` section,
    /// `Store` if the HTTP client cannot be built
    pub fn backend(&self, relative: &str) -> Result<Box<dyn StorageBackend>, RosterError> {
        match self.storage {
            StorageMode::Local => Ok(Box::new(LocalBackend::new(self.resolve(relative)))),
            StorageMode::Remote => {
                let remote = self.remote.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("storage = \"remote\" needs a [remote] section".to_string())
                })?;
                let api = GitHubApi::new(remote.github())?;
                let backend = RemoteBackend::new(api, remote.artifact_path(relative));
                let backend = match &remote.deploy_hook {
                    Some(url) => {
                        let client = reqwest_client(remote.timeout_secs)?;
                        backend.with_deploy(Arc::new(WebhookTrigger::new(client, url.clone())))
                    }
                    None => backend,
                };
                Ok(Box::new(backend))
            }
        }
    }

    fn registry<K: RecordKind>(
        &self,
        relative: &str,
    ) -> Result<Registry<K, Box<dyn StorageBackend>>, RosterError> {
        let label = relative.rsplit('/').next().unwrap_or(relative).to_string();
        Ok(Registry::new(
            self.backend(relative)?,
            Arc::new(FsSnapshotStore::new(self.resolve(&self.backup_dir))),
            label,
        )
        .with_validator(self.validator())
        .with_journal(self.journal())
        .with_defaults(self.defaults()))
    }

    /// Registry for the people artifact
    ///
    /// # Errors
    /// See [`Self::backend`]
    pub fn people(&self) -> Result<Registry<Person, Box<dyn StorageBackend>>, RosterError> {
        self.registry(&self.people_path)
    }

    /// Registry for the students artifact
    ///
    /// # Errors
    /// See [`Self::backend`]
    pub fn students(&self) -> Result<Registry<Student, Box<dyn StorageBackend>>, RosterError> {
        self.registry(&self.students_path)
    }

    /// Human-readable summary of where things live
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("storage: {:?}", self.storage).to_lowercase()];
        match (&self.storage, &self.remote) {
            (StorageMode::Remote, Some(remote)) => {
                lines.push(format!("repository: {}@{}", remote.repository, remote.branch));
                lines.push(format!("people: {}", remote.artifact_path(&self.people_path)));
                lines.push(format!("students: {}", remote.artifact_path(&self.students_path)));
                lines.push(format!("media: {}", remote.media_path("")));
                lines.push(format!(
                    "credential: {}",
                    if remote.token.is_some() { "set" } else { "unset" }
                ));
                lines.push(format!(
                    "deploy hook: {}",
                    remote.deploy_hook.as_deref().unwrap_or("none")
                ));
            }
            _ => {
                lines.push(format!("people: {}", self.resolve(&self.people_path).display()));
                lines.push(format!("students: {}", self.resolve(&self.students_path).display()));
            }
        }
        lines.push(format!("backups: {}", self.resolve(&self.backup_dir).display()));
        lines.push(format!(
            "journal: {}",
            self.journal_path
                .as_ref()
                .map_or_else(|| "disabled".to_string(), |p| self.resolve(p).display().to_string())
        ));
        lines.join("\n")
    }
}

fn reqwest_client(timeout_secs: u64) -> Result<reqwest::Client, RosterError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConfigError::Invalid(format!("failed to build deploy hook client: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config = RosterConfig::from_toml_str("").unwrap();
        assert_eq!(config, RosterConfig::default());
        assert_eq!(config.people_path, "data/teachers.json");
    }

    #[test]
    fn parses_full_remote_config() {
        let config = RosterConfig::from_toml_str(
            r#"
            storage = "remote"
            check_media = true
            media_root = "site"
            person_prefix = "vocal"

            [department_aliases]
            "理论组教师" = "理论组"

            [remote]
            repository = "rundeart/site"
            branch = "gh-pages"
            json_base_path = "data/"
            media_base_path = "images"
            deploy_hook = "https://deploy.example/hook"
            timeout_secs = 5

            [remote.commit_author]
            name = "Roster Bot"
            email = "bot@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage, StorageMode::Remote);
        assert_eq!(config.department_aliases.canonical("理论组教师"), "理论组");
        let remote = config.remote.as_ref().unwrap();
        assert_eq!(remote.artifact_path("data/teachers.json"), "data/teachers.json");
        assert_eq!(remote.media_path("teachers/a.jpg"), "images/teachers/a.jpg");
        assert_eq!(remote.api_base, GITHUB_API);
        assert_eq!(
            config.validator().media_root(),
            Some(Path::new("./site"))
        );
        assert!(config
            .journal()
            .line(chrono::Local::now(), "edit")
            .ends_with("— edit — by Roster Bot\n"));
    }

    #[test]
    fn remote_requires_repository() {
        let err = RosterConfig::from_toml_str("storage = \"remote\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RosterConfig::from_toml_str(
            "storage = \"remote\"\n[remote]\nrepository = \"no-slash\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("owner/name"));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            RosterConfig::from_toml_str("stroage = \"local\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_token_takes_precedence() {
        let mut config = RosterConfig::from_toml_str(
            "[remote]\nrepository = \"a/b\"\ntoken = \"from-file\"\n",
        )
        .unwrap();
        config.apply_env(|key| (key == TOKEN_ENV).then(|| "from-env".to_string()));
        assert_eq!(config.remote.unwrap().token.as_deref(), Some("from-env"));
    }

    #[test]
    fn bad_prefix_rejected() {
        let err = RosterConfig::from_toml_str("person_prefix = \"a b\"\n").unwrap_err();
        assert!(err.to_string().contains("person_prefix"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RosterConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.storage, StorageMode::Local);
    }

    #[test]
    fn describe_local() {
        let text = RosterConfig::default().describe();
        assert!(text.starts_with("storage: local"));
        assert!(text.contains("journal: ./todo.txt"));
    }
}
