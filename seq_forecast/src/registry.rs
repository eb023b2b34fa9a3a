//! Persistence of trained sequence models
//!
//! A model is stored as two files side by side: a JSON document holding the
//! architecture tag and bundle, the window length, the column layout and
//! the normalisation stats, and a burn record with the weights at full
//! precision. Loading checks the stored architecture against the bundle the
//! caller expects before any weight is read.

use crate::error::{ForecastError, Result};
use crate::nn::{LstmModel, ModelKind, ModelParams, SequenceModel};
use crate::trained::TrainedModel;
use crate::window::NormalizationStats;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// File extension of stored model metadata
pub const MODEL_EXTENSION: &str = "json";

/// File extension of the weight record next to the metadata
pub const WEIGHTS_EXTENSION: &str = "bin";

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    kind: ModelKind,
    params: ModelParams,
    n_in: usize,
    feature_columns: Vec<String>,
    target_column: String,
    stats: Option<NormalizationStats>,
}

/// Location of the weight record belonging to the metadata at `path`
pub fn weights_path<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().with_extension(WEIGHTS_EXTENSION)
}

/// Write `model` to `path`, creating parent directories
pub fn save_model<P: AsRef<Path>>(path: P, model: &TrainedModel) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let artifact = ModelArtifact {
        kind: ModelKind::Lstm,
        params: *model.model().params(),
        n_in: model.n_in(),
        feature_columns: model.feature_columns().to_vec(),
        target_column: model.target_column().to_string(),
        stats: model.stats().cloned(),
    };
    serde_json::to_writer(BufWriter::new(File::create(path)?), &artifact)?;
    model.model().save_weights(weights_path(path))?;

    tracing::debug!(path = %path.display(), "saved model");
    Ok(())
}

/// Read a model of `kind` with architecture `params` from `path`
pub fn load_model<P: AsRef<Path>>(
    path: P,
    kind: ModelKind,
    params: &ModelParams,
) -> Result<TrainedModel> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ForecastError::ModelNotFound(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let artifact: ModelArtifact = serde_json::from_reader(reader).map_err(|e| {
        ForecastError::SchemaMismatch(format!("{} is not a stored model: {}", path.display(), e))
    })?;

    if artifact.kind != kind {
        return Err(ForecastError::SchemaMismatch(format!(
            "{} holds a {} model, {} requested",
            path.display(),
            artifact.kind,
            kind
        )));
    }
    if artifact.params != *params {
        return Err(ForecastError::SchemaMismatch(format!(
            "{} was stored with {:?}, expected {:?}",
            path.display(),
            artifact.params,
            params
        )));
    }

    let weights = weights_path(path);
    if !weights.is_file() {
        return Err(ForecastError::ModelNotFound(weights.display().to_string()));
    }
    let model = LstmModel::load_weights(artifact.params, &weights)?;
    let trained = TrainedModel::new(
        model,
        artifact.n_in,
        artifact.feature_columns,
        artifact.target_column,
        artifact.stats,
    )?;

    tracing::info!(path = %path.display(), kind = %kind, "loaded model");
    Ok(trained)
}

/// Directory of named models
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    dir: PathBuf,
}

impl ModelRegistry {
    /// Use `dir` as the registry root; it is created on first save
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Registry root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the model stored under `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, MODEL_EXTENSION))
    }

    /// Whether a model is stored under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Store `model` under `name`, replacing any previous one
    pub fn save(&self, name: &str, model: &TrainedModel) -> Result<PathBuf> {
        if name.is_empty() || name.contains(&['/', '\\'][..]) {
            return Err(ForecastError::InvalidParameter(format!(
                "invalid model name '{}'",
                name
            )));
        }
        let path = self.path_for(name);
        save_model(&path, model)?;
        Ok(path)
    }

    /// Load the model stored under `name`
    pub fn load(
        &self,
        name: &str,
        kind: ModelKind,
        params: &ModelParams,
    ) -> Result<TrainedModel> {
        load_model(self.path_for(name), kind, params)
    }

    /// Names of stored models, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};
    use pretty_assertions::assert_eq;

    fn params() -> ModelParams {
        ModelParams {
            input_size: 2,
            hidden_size: 3,
            num_layers: 2,
            output_size: 2,
        }
    }

    fn trained() -> TrainedModel {
        let columns = vec!["a".to_string(), "b".to_string()];
        let raw = array![[1.0, 5.0], [2.0, 7.0], [4.0, 9.0]];
        let stats = NormalizationStats::fit(&columns, raw.view()).unwrap();
        let model = LstmModel::new(params(), 0.0, 3).unwrap();
        TrainedModel::new(model, 3, columns, "b".to_string(), Some(stats)).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path().join("models"));
        let mut original = trained();

        let path = registry.save("daily", &original).unwrap();
        assert!(path.ends_with("daily.json"));
        assert!(weights_path(&path).is_file());
        assert_eq!(registry.list().unwrap(), vec!["daily".to_string()]);

        let mut loaded = registry.load("daily", ModelKind::Lstm, &params()).unwrap();
        let block = Array3::from_shape_fn((2, 3, 2), |(b, t, f)| (b + t * f) as f64);
        assert_eq!(
            loaded.predict(block.clone().into()).unwrap(),
            original.predict(block.into()).unwrap()
        );
        assert_eq!(loaded.stats(), original.stats());
        assert_eq!(loaded.target_column(), "b");
        assert_eq!(loaded.n_in(), 3);
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        assert!(matches!(
            registry.load("absent", ModelKind::Lstm, &params()),
            Err(ForecastError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_architecture_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        registry.save("m", &trained()).unwrap();

        let wider = ModelParams {
            hidden_size: 16,
            ..params()
        };
        assert!(matches!(
            registry.load("m", ModelKind::Lstm, &wider),
            Err(ForecastError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"kind\": \"lstm\"}").unwrap();
        assert!(matches!(
            load_model(&path, ModelKind::Lstm, &params()),
            Err(ForecastError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_missing_weights_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        let path = registry.save("m", &trained()).unwrap();
        fs::remove_file(weights_path(&path)).unwrap();
        assert!(matches!(
            registry.load("m", ModelKind::Lstm, &params()),
            Err(ForecastError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        assert!(registry.save("../escape", &trained()).is_err());
    }
}
