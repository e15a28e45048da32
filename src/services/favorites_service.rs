//! src/services/favorites_service.rs
//!
//! FavoritesService: save, list and delete vase presets backed by plain files.
//! Each favorite is a pretty-printed JSON document at
//! `base_path/favorite_{token}.json`; an optional PNG preview lives at
//! `base_path/previews/preview_{token}.png` and is referenced from the document
//! by its public URL path.

use crate::models::favorite::{Favorite, PREVIEW_FIELD, SaveOutcome};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Public URL prefix under which preview images are served.
pub const PREVIEW_URL_PREFIX: &str = "/saved_favorites/previews/";

const PREVIEW_DIR_NAME: &str = "previews";
const DOCUMENT_PREFIX: &str = "favorite_";
const DOCUMENT_EXT: &str = ".json";
const PREVIEW_PREFIX: &str = "preview_";
const PREVIEW_EXT: &str = ".png";
const TOKEN_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("favorite `{0}` not found")]
    NotFound(String),
    #[error("favorite `{filename}` is corrupt: {reason}")]
    CorruptRecord { filename: String, reason: String },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type FavoritesResult<T> = Result<T, FavoritesError>;

/// Reasons a preview could not be stored. These never fail a save; they are
/// logged and reported back as warnings.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview must be a data URL string")]
    NotAString,
    #[error("preview data URL has no `,` separator")]
    MissingSeparator,
    #[error("preview payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("preview could not be written: {0}")]
    Io(#[from] io::Error),
}

/// FavoritesService owns the favorites directory.
///
/// Saves and deletes are serialized through a single async mutex so that two
/// saves landing in the same second cannot pick the same filename. Listing
/// does not take the lock and sees whatever is on disk at the time.
#[derive(Clone)]
pub struct FavoritesService {
    /// Directory holding the favorite documents.
    pub base_path: PathBuf,

    /// `base_path/previews`, holding preview images.
    preview_path: PathBuf,

    write_lock: Arc<Mutex<()>>,
}

impl FavoritesService {
    /// Create a service rooted at `base_path`. Directories are not touched
    /// until [`FavoritesService::init`] is called.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let preview_path = base_path.join(PREVIEW_DIR_NAME);
        Self {
            base_path,
            preview_path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create the favorites and previews directories if missing.
    pub async fn init(&self) -> FavoritesResult<()> {
        fs::create_dir_all(&self.preview_path).await?;
        debug!("favorites directory ready at {}", self.base_path.display());
        Ok(())
    }

    fn document_path(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    /// Pick the first free token for `now`.
    ///
    /// The plain `YYYYMMDD_HHMMSS` token is used when free; otherwise `_1`,
    /// `_2`, ... is appended. Must be called with the write lock held.
    async fn next_token(&self, now: DateTime<Local>) -> FavoritesResult<String> {
        let base = now.format(TOKEN_FORMAT).to_string();
        let mut token = base.clone();
        let mut suffix = 0u32;
        loop {
            let document = self.document_path(&document_filename(&token));
            let preview = self.preview_path.join(preview_filename(&token));
            if !fs::try_exists(&document).await? && !fs::try_exists(&preview).await? {
                return Ok(token);
            }
            suffix += 1;
            token = format!("{}_{}", base, suffix);
        }
    }

    /// Save a favorite.
    ///
    /// - Strips `preview` from the payload.
    /// - Decodes and writes the preview (if any) as `preview_{token}.png`.
    /// - Stores the preview URL path, or `null` if the preview failed.
    /// - Writes the document as `favorite_{token}.json`.
    ///
    /// Preview failures are reported in [`SaveOutcome::warnings`] and never
    /// fail the save.
    pub async fn save_favorite(&self, payload: Map<String, Value>) -> FavoritesResult<SaveOutcome> {
        self.save_favorite_at(payload, Local::now()).await
    }

    async fn save_favorite_at(
        &self,
        mut payload: Map<String, Value>,
        now: DateTime<Local>,
    ) -> FavoritesResult<SaveOutcome> {
        if payload.is_empty() {
            return Err(FavoritesError::InvalidInput(
                "favorite must contain at least one field".into(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let token = self.next_token(now).await?;

        let mut preview = None;
        let mut warnings = Vec::new();
        match payload.shift_remove(PREVIEW_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::String(data)) if data.is_empty() => {}
            Some(data) => {
                match self.write_preview(&token, &data).await {
                    Ok(url) => preview = Some(url),
                    Err(err) => {
                        warn!("preview for favorite {} not saved: {}", token, err);
                        warnings.push(format!("preview not saved: {}", err));
                    }
                }
                let stored = preview.clone().map(Value::String).unwrap_or(Value::Null);
                payload.insert(PREVIEW_FIELD.into(), stored);
            }
        }

        let filename = document_filename(&token);
        let body = serde_json::to_vec_pretty(&payload)?;
        write_file_atomic(&self.document_path(&filename), &body).await?;
        info!("saved favorite {}", filename);

        Ok(SaveOutcome {
            filename,
            preview,
            warnings,
        })
    }

    /// Decode a `<header>,<base64>` data URL and write it as the preview for
    /// `token`, returning the public URL path.
    async fn write_preview(&self, token: &str, data: &Value) -> Result<String, PreviewError> {
        let data = data.as_str().ok_or(PreviewError::NotAString)?;
        let (_, encoded) = data.split_once(',').ok_or(PreviewError::MissingSeparator)?;
        let bytes = general_purpose::STANDARD.decode(encoded.trim())?;

        let name = preview_filename(token);
        let path = self.preview_path.join(&name);
        write_file_atomic(&path, &bytes).await?;
        debug!("wrote preview {} ({} bytes)", path.display(), bytes.len());

        Ok(format!("{}{}", PREVIEW_URL_PREFIX, name))
    }

    /// List every stored favorite, sorted by filename.
    ///
    /// Each record carries its document name in `filename`. One unreadable
    /// document fails the whole listing with `CorruptRecord`.
    pub async fn list_favorites(&self) -> FavoritesResult<Vec<Favorite>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(DOCUMENT_EXT) || !entry.file_type().await?.is_file() {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut favorites = Vec::with_capacity(names.len());
        for name in names {
            match self.read_document(&name).await {
                Ok(document) => favorites.push(Favorite::from_document(document, &name)),
                // Removed by a concurrent delete after the directory scan.
                Err(FavoritesError::NotFound(_)) => debug!("favorite {} vanished while listing", name),
                Err(err) => return Err(err),
            }
        }

        Ok(favorites)
    }

    /// Read and parse a stored document. The document must be a JSON object.
    /// Anything that is not a regular file counts as missing.
    async fn read_document(&self, filename: &str) -> FavoritesResult<Map<String, Value>> {
        let path = self.document_path(filename);
        let meta = fs::metadata(&path)
            .await
            .map_err(|err| map_not_found(err, filename))?;
        if !meta.is_file() {
            return Err(FavoritesError::NotFound(filename.to_string()));
        }

        let bytes = fs::read(&path)
            .await
            .map_err(|err| map_not_found(err, filename))?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(FavoritesError::CorruptRecord {
                filename: filename.to_string(),
                reason: "document is not a JSON object".into(),
            }),
            Err(err) => Err(FavoritesError::CorruptRecord {
                filename: filename.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    /// Delete a favorite and, best-effort, its preview image.
    ///
    /// A document that no longer parses is still removed; its preview (if any)
    /// is left behind since the reference cannot be read.
    pub async fn delete_favorite(&self, filename: &str) -> FavoritesResult<()> {
        ensure_document_name(filename)?;
        let _guard = self.write_lock.lock().await;

        let document = match self.read_document(filename).await {
            Ok(document) => Some(document),
            Err(FavoritesError::CorruptRecord { reason, .. }) => {
                warn!("deleting corrupt favorite {}: {}", filename, reason);
                None
            }
            Err(err) => return Err(err),
        };

        fs::remove_file(self.document_path(filename))
            .await
            .map_err(|err| map_not_found(err, filename))?;
        info!("deleted favorite {}", filename);

        let preview = document
            .as_ref()
            .and_then(|doc| doc.get(PREVIEW_FIELD))
            .and_then(Value::as_str);
        if let Some(reference) = preview {
            self.remove_preview(reference).await;
        }

        Ok(())
    }

    /// Remove the preview behind a stored URL path. Missing files and
    /// references outside the previews directory are skipped.
    async fn remove_preview(&self, reference: &str) {
        let Some(path) = self.resolve_preview(reference) else {
            warn!("ignoring preview reference outside {}: {}", PREVIEW_URL_PREFIX, reference);
            return;
        };

        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed preview {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("preview {} already missing", path.display());
            }
            Err(err) => warn!("failed to remove preview {}: {}", path.display(), err),
        }
    }

    /// Map a stored preview URL path back to its file.
    fn resolve_preview(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix(PREVIEW_URL_PREFIX)?;
        ensure_bare_name(name).ok()?;
        Some(self.preview_path.join(name))
    }

    /// Open a preview image by file name for streaming.
    pub async fn open_preview(&self, name: &str) -> FavoritesResult<(File, u64)> {
        ensure_bare_name(name)?;
        let path = self.preview_path.join(name);
        let file = File::open(&path)
            .await
            .map_err(|err| map_not_found(err, name))?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Location of the previews directory.
    pub fn previews_dir(&self) -> &Path {
        &self.preview_path
    }
}

/// Parse a request body into a favorite payload.
///
/// The body must be a JSON object; anything else is `InvalidInput`.
pub fn parse_favorite_payload(body: &[u8]) -> FavoritesResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FavoritesError::InvalidInput("request body is empty".into()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(_) => Err(FavoritesError::InvalidInput(
            "favorite must be a JSON object".into(),
        )),
        Err(err) => Err(FavoritesError::InvalidInput(format!("invalid JSON: {}", err))),
    }
}

fn document_filename(token: &str) -> String {
    format!("{}{}{}", DOCUMENT_PREFIX, token, DOCUMENT_EXT)
}

fn preview_filename(token: &str) -> String {
    format!("{}{}{}", PREVIEW_PREFIX, token, PREVIEW_EXT)
}

/// Write `bytes` to a `.tmp-{uuid}` sibling, fsync, then rename over `path`.
///
/// Listing only matches `*.json`, so a half-written temp file is never read.
/// The temp file is removed on any error.
async fn write_file_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("target path missing parent directory"))?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    let result = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

fn map_not_found(err: io::Error, name: &str) -> FavoritesError {
    if err.kind() == ErrorKind::NotFound {
        FavoritesError::NotFound(name.to_string())
    } else {
        FavoritesError::Io(err)
    }
}

/// Reject anything that is not a single plain path component.
fn ensure_bare_name(name: &str) -> FavoritesResult<()> {
    let invalid = |reason: &str| -> FavoritesResult<()> {
        Err(FavoritesError::InvalidInput(format!("filename {}", reason)))
    };
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return invalid("must be between 1 and 255 bytes");
    }
    if name == "." || name.contains("..") {
        return invalid("must not contain `..`");
    }
    if name
        .bytes()
        .any(|b| b == b'/' || b == b'\\' || b.is_ascii_control())
    {
        return invalid("must not contain path separators or control characters");
    }
    Ok(())
}

fn ensure_document_name(name: &str) -> FavoritesResult<()> {
    ensure_bare_name(name)?;
    if !name.ends_with(DOCUMENT_EXT) {
        return Err(FavoritesError::InvalidInput(format!(
            "filename must end with `{}`",
            DOCUMENT_EXT
        )));
    }
    Ok(())
}
