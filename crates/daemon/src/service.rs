// The seven annotator operations, independent of HTTP.
//
// All methods block on filesystem work; the API layer calls them from the
// blocking pool.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use annotator_common::image::{decode_png_payload, ImageError};
use annotator_common::metadata::MetadataRecord;
use annotator_common::protocol::{
    LocateScriptRequest, LocateScriptResponse, RefreshByFilenameRequest, SavedResponse,
    SetSourcePathRequest, SourceResponse,
};
use thiserror::Error;
use tracing::info;

use crate::config::SearchConfig;
use crate::locator::Locator;
use crate::search::SearchTools;
use crate::store::{PersistenceStore, Slot, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request itself is unusable: bad JSON, missing field, bad image.
    #[error("{0}")]
    InvalidInput(String),

    /// A path the request depends on does not exist.
    #[error("{0}")]
    Missing(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read source `{}`: {source}", .path.display())]
    SourceRead { path: PathBuf, source: io::Error },
}

#[derive(Clone)]
pub struct AnnotatorService {
    store: Arc<dyn PersistenceStore>,
    locator: Arc<Locator>,
}

impl AnnotatorService {
    pub fn new(store: Arc<dyn PersistenceStore>, tools: SearchTools, config: SearchConfig) -> Self {
        let locator = Arc::new(Locator::new(Arc::clone(&store), tools, config));
        Self { store, locator }
    }

    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Persist the annotation document exactly as received.
    pub fn save_annotations(&self, body: &[u8]) -> Result<SavedResponse, ServiceError> {
        serde_json::from_slice::<serde_json::Value>(body)
            .map_err(|error| ServiceError::InvalidInput(format!("invalid JSON body: {error}")))?;
        let path = self.store.write(Slot::Annotations, body)?;
        info!(path = %path.display(), "annotations saved");
        Ok(saved(path))
    }

    /// Persist a PNG (raw, base64 or data URI) into an image slot.
    pub fn save_image(&self, slot: Slot, body: &[u8]) -> Result<SavedResponse, ServiceError> {
        let png = decode_png_payload(body)?;
        let path = self.store.write(slot, &png)?;
        info!(path = %path.display(), bytes = png.len(), ?slot, "image saved");
        Ok(saved(path))
    }

    pub fn locate_script(
        &self,
        request: LocateScriptRequest,
    ) -> Result<LocateScriptResponse, ServiceError> {
        if request.filename.trim().is_empty() {
            return Err(ServiceError::InvalidInput("No filename provided".into()));
        }
        Ok(self.locator.locate_script(&request.filename)?)
    }

    /// Re-copy the image recorded as `source` in the current metadata.
    pub fn refresh_from_known_source(&self) -> Result<SourceResponse, ServiceError> {
        let record = self
            .store
            .load_metadata()?
            .ok_or_else(|| ServiceError::Missing("No metadata file".into()))?;

        let source = match record.source.filter(|source| !source.is_empty()) {
            Some(source) if Path::new(&source).is_file() => source,
            Some(source) => {
                return Err(ServiceError::Missing(format!("Source not found: {source}")));
            }
            None => return Err(ServiceError::Missing("Source not found: <none>".into())),
        };

        self.copy_into_background(Path::new(&source))?;
        info!(source, "refreshed from known source");
        Ok(SourceResponse { success: true, source })
    }

    /// Find `filename` on disk, load it as the background and start a fresh
    /// metadata record for it.
    pub fn refresh_by_filename(
        &self,
        request: RefreshByFilenameRequest,
    ) -> Result<SourceResponse, ServiceError> {
        let filename = request
            .filename
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("No filename provided".into()))?;

        let found = self
            .locator
            .find_file(&filename)
            .filter(|path| path.is_file())
            .ok_or_else(|| ServiceError::Missing(format!("File not found: {filename}")))?;

        let source = found.to_string_lossy().into_owned();
        self.adopt_source(&found, MetadataRecord::for_source(source.clone(), filename))?;
        info!(source, "found and refreshed");
        Ok(SourceResponse { success: true, source })
    }

    /// Point the annotator at an explicit image path.
    pub fn set_source_path(
        &self,
        request: SetSourcePathRequest,
    ) -> Result<SourceResponse, ServiceError> {
        let source = request
            .source
            .filter(|source| !source.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("No source path provided".into()))?;

        let path = PathBuf::from(&source);
        if !path.is_file() {
            return Err(ServiceError::Missing(format!("File not found: {source}")));
        }

        let name = request.name.unwrap_or_default();
        self.adopt_source(&path, MetadataRecord::for_source(source.clone(), name))?;
        info!(source, "source path set");
        Ok(SourceResponse { success: true, source })
    }

    /// Copy `path` into the background slot and replace the metadata record.
    fn adopt_source(&self, path: &Path, record: MetadataRecord) -> Result<(), ServiceError> {
        self.copy_into_background(path)?;
        self.store.store_metadata(&record)?;
        Ok(())
    }

    fn copy_into_background(&self, path: &Path) -> Result<PathBuf, ServiceError> {
        let bytes = fs::read(path)
            .map_err(|source| ServiceError::SourceRead { path: path.to_path_buf(), source })?;
        Ok(self.store.write(Slot::Background, &bytes)?)
    }
}

fn saved(path: PathBuf) -> SavedResponse {
    SavedResponse { success: true, path: path.to_string_lossy().into_owned() }
}
