//! Session snapshots.
//!
//! A session is an ordered list of question/answer turns with the index
//! entries each answer was grounded on. Sessions live as JSON files in
//! `[sessions].dir`:
//!
//! ```text
//! snapshots/
//!   aliases.json                              {"work": "<uuid>", "<uuid>": "<uuid>"}
//!   1b4e28ba-2fa1-11d2-883f-0016d3cca427.json [SessionRecord, ...]
//! ```
//!
//! Every session id maps to itself in `aliases.json`, so lookups accept
//! either an alias or a raw id. [`LATEST_SESSION`] names the most recently
//! modified session and cannot be used as an alias.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use ragsync_core::ScoredEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved identifier that resolves to the newest session.
pub const LATEST_SESSION: &str = "latest";

const ALIASES_FILE: &str = "aliases.json";
const EMPTY_PREVIEW: &str = "(corrupt or empty)";

/// An index entry cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    pub page: i64,
    pub chunk: i64,
    pub text: String,
}

impl From<&ScoredEntry> for SourceRef {
    fn from(hit: &ScoredEntry) -> Self {
        let meta = &hit.entry.metadata;
        Self {
            file: meta.file.clone(),
            page: meta.page,
            chunk: meta.chunk,
            text: meta.text.clone(),
        }
    }
}

/// One question/answer turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub alias: Option<String>,
    pub modified: DateTime<Utc>,
    /// First question, or a placeholder for empty or unreadable files.
    pub first_question: String,
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub alias: Option<String>,
    pub records: Vec<SessionRecord>,
    path: PathBuf,
}

impl Session {
    pub fn record_turn(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
        sources: Vec<SourceRef>,
    ) {
        self.records.push(SessionRecord {
            question: question.into(),
            answer: answer.into(),
            sources,
            asked_at: Some(Utc::now()),
        });
    }

    /// Write the session file, replacing it atomically.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to save session {}", self.id))
    }
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open the store at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create sessions dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Create and persist a new, empty session.
    pub fn start(&self, alias: Option<&str>) -> Result<Session> {
        let mut aliases = self.read_aliases()?;
        if let Some(alias) = alias {
            validate_identifier(alias)?;
            if alias == LATEST_SESSION {
                bail!("Session alias '{}' is reserved", LATEST_SESSION);
            }
            if aliases.contains_key(alias) {
                bail!("Session alias already in use: {}", alias);
            }
        }

        let id = Uuid::new_v4().to_string();
        aliases.insert(id.clone(), id.clone());
        if let Some(alias) = alias {
            aliases.insert(alias.to_string(), id.clone());
        }

        let session = Session {
            path: self.session_path(&id),
            id,
            alias: alias.map(str::to_string),
            records: Vec::new(),
        };
        session.save()?;
        self.write_aliases(&aliases)?;

        tracing::info!(id = %session.id, alias = ?session.alias, "started session");
        Ok(session)
    }

    /// Load a session by alias or id. `None` when no such session file exists.
    pub fn resume(&self, identifier: &str) -> Result<Option<Session>> {
        validate_identifier(identifier)?;
        let aliases = self.read_aliases()?;
        let id = aliases
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| identifier.to_string());

        let path = self.session_path(&id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let records: Vec<SessionRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Malformed session file: {}", path.display()))?;

        Ok(Some(Session {
            alias: alias_for(&aliases, &id),
            id,
            records,
            path,
        }))
    }

    /// Load a session by alias or id, or the newest one for [`LATEST_SESSION`].
    pub fn resolve(&self, identifier: &str) -> Result<Option<Session>> {
        if identifier == LATEST_SESSION {
            self.resume_latest()
        } else {
            self.resume(identifier)
        }
    }

    /// Resume the most recently modified session, if any.
    pub fn resume_latest(&self) -> Result<Option<Session>> {
        match self.list()?.into_iter().next() {
            Some(summary) => self.resume(&summary.id),
            None => Ok(None),
        }
    }

    /// All sessions, newest first.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let aliases = self.read_aliases()?;
        let mut summaries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_session = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != ALIASES_FILE);
            if !is_session {
                continue;
            }
            let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };

            let modified = std::fs::metadata(&path)?
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            let first_question = std::fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<Vec<SessionRecord>>(&content).ok())
                .and_then(|records| records.into_iter().next())
                .map(|record| record.question)
                .unwrap_or_else(|| EMPTY_PREVIEW.to_string());

            summaries.push(SessionSummary {
                alias: alias_for(&aliases, &id),
                id,
                modified,
                first_question,
            });
        }

        summaries.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read_aliases(&self) -> Result<BTreeMap<String, String>> {
        let path = self.dir.join(ALIASES_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Malformed {}", path.display()))
    }

    fn write_aliases(&self, aliases: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(aliases)?;
        write_atomic(&self.dir.join(ALIASES_FILE), &json)
    }
}

fn alias_for(aliases: &BTreeMap<String, String>, id: &str) -> Option<String> {
    aliases
        .iter()
        .find(|(key, value)| value.as_str() == id && key.as_str() != id)
        .map(|(key, _)| key.clone())
}

/// Identifiers become file names; keep them to a single path component.
fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty()
        || identifier == ALIASES_FILE.trim_end_matches(".json")
        || identifier.contains(['/', '\\'])
        || identifier.starts_with('.')
    {
        return Err(anyhow!("Invalid session identifier: '{}'", identifier));
    }
    Ok(())
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
