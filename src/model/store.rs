//! Model store: owns the classifier for the lifetime of the process.
//!
//! # Responsibilities
//! - Read and validate the artifact once at startup
//! - Drive the readiness cell to Ready or Failed
//! - Hand out shared read-only references to request handlers

use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::health::{Readiness, ReadinessState};
use crate::model::artifact::ModelArtifact;
use crate::model::error::LoadError;
use crate::observability::metrics;

/// Holds the loaded artifact. Written once, read by every request.
#[derive(Debug)]
pub struct ModelStore {
    artifact: OnceLock<Arc<ModelArtifact>>,
    readiness: Arc<ReadinessState>,
}

impl ModelStore {
    /// Create an empty store reporting through `readiness`.
    pub fn new(readiness: Arc<ReadinessState>) -> Self {
        Self {
            artifact: OnceLock::new(),
            readiness,
        }
    }

    pub fn readiness(&self) -> &Arc<ReadinessState> {
        &self.readiness
    }

    /// Read the artifact at `path` and settle readiness.
    ///
    /// Any failure marks the store Failed permanently. Calling this after the
    /// state has settled returns `AlreadyInitialized` without side effects.
    pub fn load(&self, path: &Path) -> Result<Arc<ModelArtifact>, LoadError> {
        self.ensure_initializing()?;
        tracing::info!(path = %path.display(), "Attempting to load model");

        let result = std::fs::read(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LoadError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => LoadError::Io {
                    path: path.to_path_buf(),
                    source: e,
                },
            })
            .and_then(|bytes| ModelArtifact::from_json(&bytes));

        match result {
            Ok(artifact) => self.publish(artifact),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Install an already-parsed artifact, validating it first.
    pub fn install(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>, LoadError> {
        self.ensure_initializing()?;
        match artifact.validate() {
            Ok(()) => self.publish(artifact),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// The artifact, only once readiness is Ready.
    pub fn artifact(&self) -> Option<Arc<ModelArtifact>> {
        if self.readiness.is_ready() {
            self.artifact.get().cloned()
        } else {
            None
        }
    }

    fn ensure_initializing(&self) -> Result<(), LoadError> {
        match self.readiness.get() {
            Readiness::Initializing => Ok(()),
            settled => Err(LoadError::AlreadyInitialized(settled)),
        }
    }

    fn publish(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>, LoadError> {
        let artifact = Arc::new(artifact);
        if self.artifact.set(artifact.clone()).is_err() {
            return Err(LoadError::AlreadyInitialized(self.readiness.get()));
        }
        self.readiness
            .mark_ready()
            .map_err(|e| LoadError::AlreadyInitialized(e.current))?;
        metrics::record_readiness(Readiness::Ready);

        tracing::info!(
            model = artifact.display_name(),
            classes = ?artifact.classes,
            "Model loaded successfully. Service is ready."
        );
        Ok(artifact)
    }

    fn fail(&self, error: LoadError) -> LoadError {
        if self.readiness.mark_failed().is_ok() {
            metrics::record_readiness(Readiness::Failed);
        }
        tracing::error!(
            error_kind = error.kind(),
            error = %error,
            "Failed to load model on startup"
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store() -> ModelStore {
        ModelStore::new(Arc::new(ReadinessState::new()))
    }

    #[test]
    fn test_load_success_sets_ready() {
        let store = store();
        assert!(store.artifact().is_none());

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/iris_logreg.json");
        let artifact = store.load(&path).unwrap();

        assert_eq!(store.readiness().get(), Readiness::Ready);
        assert!(Arc::ptr_eq(&artifact, &store.artifact().unwrap()));
    }

    #[test]
    fn test_missing_file_sets_failed() {
        let store = store();
        let err = store.load(Path::new("/definitely/not/here.json")).unwrap_err();

        assert!(matches!(err, LoadError::NotFound { .. }));
        assert_eq!(store.readiness().get(), Readiness::Failed);
        assert!(store.artifact().is_none());
    }

    #[test]
    fn test_incompatible_schema_sets_failed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"format_version":1,"feature_names":["a","b","c","d"],"classes":["x"],
               "classifier":{{"kind":"logistic_regression","coefficients":[[0,0,0,0]],"intercepts":[0]}}}}"#
        )
        .unwrap();

        let store = store();
        let err = store.load(file.path()).unwrap_err();
        assert_eq!(err.kind(), "artifact_schema");
        assert_eq!(store.readiness().get(), Readiness::Failed);
    }

    #[test]
    fn test_garbage_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x80\x04joblib pickle").unwrap();

        let store = store();
        assert!(matches!(store.load(file.path()), Err(LoadError::Parse(_))));
        assert_eq!(store.readiness().get(), Readiness::Failed);
    }

    #[test]
    fn test_second_load_rejected_without_state_change() {
        let store = store();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/iris_logreg.json");
        store.load(&path).unwrap();

        let err = store.load(Path::new("/missing.json")).unwrap_err();
        assert!(matches!(err, LoadError::AlreadyInitialized(Readiness::Ready)));
        assert_eq!(store.readiness().get(), Readiness::Ready);

        let failed = self::store();
        let _ = failed.load(Path::new("/missing.json"));
        let err = failed.load(&path).unwrap_err();
        assert!(matches!(err, LoadError::AlreadyInitialized(Readiness::Failed)));
        assert!(failed.artifact().is_none());
    }
}
