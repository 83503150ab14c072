// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Errors
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QdError {
    /// Every configured solve method failed; `attempts` lists them in order.
    #[error("Linear solve failed after {attempts:?}: {message}")]
    SolverFailed {
        attempts: Vec<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid Eddington factor in group {group} at (iz={iz}, ir={ir}): {value}")]
    InvalidEddington {
        group: usize,
        iz: usize,
        ir: usize,
        value: f64,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),
}

pub type QdResult<T> = Result<T, QdError>;

impl QdError {
    /// Shape-check helper used by field setters.
    pub fn check_shape(what: &str, expected: &[usize], actual: &[usize]) -> QdResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(QdError::ShapeMismatch {
                what: what.to_string(),
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            })
        }
    }
}
