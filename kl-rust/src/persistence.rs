//! Versioned persistence of decomposition engines
//!
//! An engine is stored as a set of named fields in a [`Storage`] backend:
//!
//! | field              | content                                   |
//! |--------------------|-------------------------------------------|
//! | `format_version`   | [`FORMAT_VERSION`]                        |
//! | `engine`           | engine name, checked on load              |
//! | `covariance_model` | serialized kernel                         |
//! | `threshold`        | truncation threshold τ                    |
//! | `max_modes`        | optional cap on the number of modes       |
//! | `config`           | remaining tolerances                      |
//! | `discretization`   | mesh (quadrature and P1 engines only)     |
//! | `result`           | last [`KarhunenLoeveResult`]              |
//!
//! Loading restores the stored result as is; nothing is recomputed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::algorithm::{AlgorithmState, KarhunenLoeveAlgorithm, KarhunenLoeveBase};
use crate::config::KarhunenLoeveConfig;
use crate::covariance::CovarianceKernel;
use crate::eigen::EigenSolver;
use crate::error::{KLError, KLResult};
use crate::mesh::{Discretization, P1Mesh, QuadratureMesh};
use crate::p1::KarhunenLoeveP1;
use crate::quadrature::KarhunenLoeveQuadrature;
use crate::result::KarhunenLoeveResult;

/// Version written by [`Persistent::save`] and required by [`Persistent::load`]
pub const FORMAT_VERSION: u32 = 1;

/// Backend holding named fields
pub trait Storage {
    fn write_field(&mut self, name: &str, value: Value) -> KLResult<()>;

    /// Fails with [`KLError::Persistence`] if the field is absent
    fn read_field(&self, name: &str) -> KLResult<Value>;
}

/// Serialize `value` into field `name`
pub fn save_attribute<T: Serialize + ?Sized>(
    storage: &mut dyn Storage,
    name: &str,
    value: &T,
) -> KLResult<()> {
    storage.write_field(name, serde_json::to_value(value)?)
}

/// Deserialize field `name`
pub fn load_attribute<T: DeserializeOwned>(storage: &dyn Storage, name: &str) -> KLResult<T> {
    let value = storage.read_field(name)?;
    serde_json::from_value(value)
        .map_err(|e| KLError::Persistence(format!("Field '{}' is malformed: {}", name, e)))
}

/// In-memory storage, convertible to and from a JSON document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonStorage {
    fields: BTreeMap<String, Value>,
}

impl JsonStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_json_string(&self) -> KLResult<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    pub fn from_json_str(json: &str) -> KLResult<Self> {
        Ok(Self {
            fields: serde_json::from_str(json)?,
        })
    }

    /// Write the document to a JSON file
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> KLResult<()> {
        let json = self.to_json_string()?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            KLError::Persistence(format!("Failed to write {:?}: {}", path.as_ref(), e))
        })
    }

    /// Read a document previously written with [`JsonStorage::write_to_path`]
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> KLResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            KLError::Persistence(format!("Failed to read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Storage for JsonStorage {
    fn write_field(&mut self, name: &str, value: Value) -> KLResult<()> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn read_field(&self, name: &str) -> KLResult<Value> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| KLError::Persistence(format!("Missing field '{}'", name)))
    }
}

/// Save/load contract of the decomposition engines
pub trait Persistent: Sized {
    fn save(&self, storage: &mut dyn Storage) -> KLResult<()>;

    fn load(storage: &dyn Storage) -> KLResult<Self>;
}

fn save_state<K>(storage: &mut dyn Storage, engine: &str, state: &AlgorithmState<K>) -> KLResult<()>
where
    K: CovarianceKernel + Serialize,
{
    let config = state.config();
    save_attribute(storage, "format_version", &FORMAT_VERSION)?;
    save_attribute(storage, "engine", engine)?;
    save_attribute(storage, "covariance_model", state.kernel())?;
    save_attribute(storage, "threshold", &config.threshold)?;
    save_attribute(storage, "max_modes", &config.max_modes)?;
    save_attribute(storage, "config", config)?;
    save_attribute(storage, "result", state.result())?;
    debug!(engine, modes = state.result().size(), "saved engine state");
    Ok(())
}

fn load_state<K>(storage: &dyn Storage, engine: &str) -> KLResult<AlgorithmState<K>>
where
    K: CovarianceKernel + DeserializeOwned,
{
    let version: u32 = load_attribute(storage, "format_version")?;
    if version != FORMAT_VERSION {
        return Err(KLError::Persistence(format!(
            "Unsupported format version {}, expected {}",
            version, FORMAT_VERSION
        )));
    }
    let stored_engine: String = load_attribute(storage, "engine")?;
    if stored_engine != engine {
        return Err(KLError::Persistence(format!(
            "Stored engine is '{}', cannot load as '{}'",
            stored_engine, engine
        )));
    }

    let kernel: K = load_attribute(storage, "covariance_model")?;
    let config = load_attribute::<KarhunenLoeveConfig>(storage, "config")?
        .with_threshold(load_attribute(storage, "threshold")?)
        .with_max_modes(load_attribute(storage, "max_modes")?);
    config
        .validate()
        .map_err(|e| KLError::Persistence(format!("Stored configuration is invalid: {}", e)))?;

    let result: KarhunenLoeveResult = load_attribute(storage, "result")?;
    result
        .validate()
        .map_err(|e| KLError::Persistence(format!("Stored result is inconsistent: {}", e)))?;

    debug!(engine, modes = result.size(), "loaded engine state");
    Ok(AlgorithmState::from_parts(kernel, config, result))
}

impl<K> Persistent for KarhunenLoeveBase<K>
where
    K: CovarianceKernel + Serialize + DeserializeOwned,
{
    fn save(&self, storage: &mut dyn Storage) -> KLResult<()> {
        save_state(storage, "KarhunenLoeveBase", self.state())
    }

    fn load(storage: &dyn Storage) -> KLResult<Self> {
        Ok(Self::from_state(load_state(storage, "KarhunenLoeveBase")?))
    }
}

impl<K, S> Persistent for KarhunenLoeveQuadrature<K, S>
where
    K: CovarianceKernel + Serialize + DeserializeOwned,
    S: EigenSolver + Default,
{
    fn save(&self, storage: &mut dyn Storage) -> KLResult<()> {
        save_state(storage, "KarhunenLoeveQuadrature", self.state())?;
        save_attribute(storage, "discretization", self.mesh())
    }

    fn load(storage: &dyn Storage) -> KLResult<Self> {
        let state = load_state(storage, "KarhunenLoeveQuadrature")?;
        let stored: QuadratureMesh = load_attribute(storage, "discretization")?;
        // Re-run the constructor checks on the stored nodes and weights
        let mesh = QuadratureMesh::new(stored.nodes().to_owned(), stored.weights().clone())
            .map_err(|e| KLError::Persistence(format!("Stored mesh is invalid: {}", e)))?;
        Ok(Self::from_parts(state, mesh, S::default()))
    }
}

impl<K, S> Persistent for KarhunenLoeveP1<K, S>
where
    K: CovarianceKernel + Serialize + DeserializeOwned,
    S: EigenSolver + Default,
{
    fn save(&self, storage: &mut dyn Storage) -> KLResult<()> {
        save_state(storage, "KarhunenLoeveP1", self.state())?;
        save_attribute(storage, "discretization", self.mesh())
    }

    fn load(storage: &dyn Storage) -> KLResult<Self> {
        let state = load_state(storage, "KarhunenLoeveP1")?;
        let stored: P1Mesh = load_attribute(storage, "discretization")?;
        let mesh = P1Mesh::new(stored.vertices().clone(), stored.simplices().to_vec())
            .map_err(|e| KLError::Persistence(format!("Stored mesh is invalid: {}", e)))?;
        Ok(Self::from_parts(state, mesh, S::default()))
    }
}
