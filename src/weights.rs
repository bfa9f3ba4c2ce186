//! Signal weights with hot-reload from `data/signal_weights.json`.
//!
//! JSON shape (flat, every key optional):
//! {
//!   "cvr": 0.25,
//!   "benford": 0.1
//! }
//!
//! A key that is absent, non-numeric, negative or non-finite falls back to the
//! signal's built-in default. On each `current()` call we check the file's
//! modified time and reload if changed. A deleted file or a rewrite that fails
//! to parse drops back to the built-in defaults.

use serde_json::Value;
use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

pub const DEFAULT_WEIGHTS_PATH: &str = "data/signal_weights.json";
pub const WEIGHTS_PATH_ENV: &str = "SIGNAL_WEIGHTS_PATH";

/// Per-signal weight overrides. Lookups fall back to the caller's default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalWeights {
    overrides: BTreeMap<String, f64>,
}

impl SignalWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts only finite, non-negative weights; anything else is ignored.
    pub fn with(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.set(name, weight);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, weight: f64) {
        if weight.is_finite() && weight >= 0.0 {
            self.overrides.insert(name.into(), weight);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.overrides.get(name).copied()
    }

    pub fn weight_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Lenient parse: the document must be a JSON object, but individual
    /// entries that are not usable weights are dropped.
    pub fn from_json_slice(bytes: &[u8]) -> io::Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let Value::Object(map) = value else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "signal weights must be a JSON object",
            ));
        };
        let mut w = Self::new();
        for (name, v) in map {
            if let Some(x) = v.as_f64() {
                w.set(name, x);
            }
        }
        Ok(w)
    }
}

/// Load weights directly (no caching).
pub fn load_weights_file(path: &Path) -> io::Result<SignalWeights> {
    let bytes = fs::read(path)?;
    SignalWeights::from_json_slice(&bytes)
}

/// `$SIGNAL_WEIGHTS_PATH` if set and non-empty, else the default location.
pub fn weights_path_from_env() -> PathBuf {
    env::var(WEIGHTS_PATH_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS_PATH))
}

/// Hot-reload wrapper: reloads when the weights file mtime changes.
#[derive(Debug)]
pub struct HotReloadWeights {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: SignalWeights,
    last_modified: Option<SystemTime>,
}

impl HotReloadWeights {
    /// Create with a path (defaults to [`weights_path_from_env`] if `None`).
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(weights_path_from_env);
        Self {
            path,
            inner: RwLock::new(State {
                weights: SignalWeights::default(),
                last_modified: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the latest weights, reloading if the file changed.
    pub fn current(&self) -> SignalWeights {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => {
                // Missing file: back to built-in defaults.
                let mut guard = self.write_state();
                if guard.last_modified.is_some() || !guard.weights.is_empty() {
                    tracing::info!(
                        target: "analysis",
                        path = %self.path.display(),
                        "signal weights file gone, using defaults"
                    );
                    guard.weights = SignalWeights::default();
                    guard.last_modified = None;
                }
                return guard.weights.clone();
            }
        };

        {
            let guard = self.read_state();
            if guard.last_modified == Some(mtime) {
                return guard.weights.clone();
            }
        }

        let mut guard = self.write_state();
        if guard.last_modified != Some(mtime) {
            match load_weights_file(&self.path) {
                Ok(w) => {
                    tracing::info!(
                        target: "analysis",
                        path = %self.path.display(),
                        overrides = w.len(),
                        "signal weights reloaded"
                    );
                    guard.weights = w;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "analysis",
                        path = %self.path.display(),
                        error = %e,
                        "malformed signal weights, using defaults"
                    );
                    guard.weights = SignalWeights::default();
                }
            }
            // Remember the mtime either way so a bad file is not re-parsed every run.
            guard.last_modified = Some(mtime);
        }
        guard.weights.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
