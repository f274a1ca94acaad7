use std::path::{Path, PathBuf};

use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::domain::errors::TradingError;
use crate::domain::ports::PredictBinary;

/// Wraps a random-forest regressor trained to emit a probability in `[0,1]`,
/// deserialized from a JSON artifact. A missing artifact at construction is
/// `ArtifactMissing`, which is fatal at startup; a predictor that fails after
/// construction degrades to a neutral `0.5` rather than panicking.
pub struct SmartCorePredictorModel {
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
    name: String,
}

impl SmartCorePredictorModel {
    pub fn load(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, TradingError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(TradingError::ArtifactMissing(path.display().to_string()));
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| TradingError::ArtifactMissing(format!("{}: {e}", path.display())))?;
        let model = serde_json::from_slice(&bytes)
            .map_err(|e| TradingError::ArtifactMissing(format!("{}: {e}", path.display())))?;
        Ok(Self {
            model,
            name: name.into(),
        })
    }
}

impl PredictBinary for SmartCorePredictorModel {
    fn predict_proba(&self, features: &[f64]) -> Result<(f64, f64), TradingError> {
        let matrix = DenseMatrix::from_2d_vec(&vec![features.to_vec()])
            .map_err(|e| TradingError::InvalidConfig(e.to_string()))?;
        let prediction = self
            .model
            .predict(&matrix)
            .map_err(|e| TradingError::InvalidConfig(e.to_string()))?;
        let p1 = prediction.first().copied().unwrap_or(0.5).clamp(0.0, 1.0);
        Ok((1.0 - p1, p1))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
