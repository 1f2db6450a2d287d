use super::error::ConfigError;
use crate::core::models::ids::LjId;
use crate::core::models::molecule::MoleculeError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Lennard-Jones `sigma` (Angstroms) and `epsilon` (kcal/mol) of one atom type
/// or of one combined pair of types.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct LjParameter {
    pub sigma: f64,
    pub epsilon: f64,
}

impl LjParameter {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Self { sigma, epsilon }
    }

    /// A parameter that never contributes any Lennard-Jones energy.
    pub fn dummy() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.epsilon == 0.0
    }
}

/// How two per-type LJ parameters are mixed into a pair parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombiningRules {
    /// Lorentz-Berthelot: arithmetic mean of sigma, geometric mean of epsilon.
    #[default]
    Arithmetic,
    /// Geometric mean of both sigma and epsilon.
    Geometric,
}

impl CombiningRules {
    #[inline]
    pub fn combine(&self, a: &LjParameter, b: &LjParameter) -> LjParameter {
        let epsilon = (a.epsilon * b.epsilon).sqrt();
        let sigma = match self {
            CombiningRules::Arithmetic => 0.5 * (a.sigma + b.sigma),
            CombiningRules::Geometric => (a.sigma * b.sigma).sqrt(),
        };
        LjParameter { sigma, epsilon }
    }
}

impl FromStr for CombiningRules {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arithmetic" => Ok(CombiningRules::Arithmetic),
            "geometric" => Ok(CombiningRules::Geometric),
            _ => Err(ConfigError::UnknownCombiningRule(s.to_string())),
        }
    }
}

impl fmt::Display for CombiningRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombiningRules::Arithmetic => write!(f, "arithmetic"),
            CombiningRules::Geometric => write!(f, "geometric"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown LJ type '{name}' referenced in '{path}'")]
    UnknownLjType { path: String, name: String },
    #[error("Invalid LJ parameters for type '{name}' in '{path}': sigma and epsilon must be non-negative")]
    InvalidLjParameter { path: String, name: String },
    #[error("Molecule {molecule} referenced in '{path}' is not defined")]
    UnknownMolecule { path: String, molecule: u32 },
    #[error("Invalid bond in '{path}': {source}")]
    Topology {
        path: String,
        source: MoleculeError,
    },
}

#[derive(Debug, Deserialize)]
struct LjParameterFile {
    types: BTreeMap<String, LjParameter>,
}

/// The table of Lennard-Jones atom types, indexed by [`LjId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LjParameterDb {
    params: Vec<LjParameter>,
    names: Vec<String>,
    by_name: HashMap<String, LjId>,
}

impl LjParameterDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and returns its id. Re-adding a known name replaces its parameters.
    pub fn add(&mut self, name: &str, param: LjParameter) -> LjId {
        if let Some(&id) = self.by_name.get(name) {
            self.params[id.index()] = param;
            return id;
        }
        let id = LjId(self.params.len() as u32);
        self.params.push(param);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, id: LjId) -> Option<&LjParameter> {
        self.params.get(id.index())
    }

    pub fn contains(&self, id: LjId) -> bool {
        id.index() < self.params.len()
    }

    pub fn id_of(&self, name: &str) -> Option<LjId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: LjId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LjId, &str, &LjParameter)> {
        self.names
            .iter()
            .zip(&self.params)
            .enumerate()
            .map(|(i, (name, param))| (LjId(i as u32), name.as_str(), param))
    }

    /// Loads a parameter table from a TOML file of `[types.<name>]` sections.
    ///
    /// Types receive ids in name order so that the same file always yields the same ids.
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ParamLoadError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ParamLoadError> {
        let file: LjParameterFile = toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        let mut db = Self::new();
        for (name, param) in file.types {
            let valid = param.sigma.is_finite()
                && param.epsilon.is_finite()
                && param.sigma >= 0.0
                && param.epsilon >= 0.0;
            if !valid {
                return Err(ParamLoadError::InvalidLjParameter {
                    path: origin.to_string(),
                    name,
                });
            }
            db.add(&name, param);
        }
        Ok(db)
    }
}

/// Pre-combined pair parameters for every pair of types in an [`LjParameterDb`].
///
/// Rebuilt whenever the parameter table or the combining rules change, so the
/// kernels never evaluate a combining rule inside the pair loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LjPairMatrix {
    n_types: usize,
    pairs: Vec<LjParameter>,
}

impl LjPairMatrix {
    pub fn new(db: &LjParameterDb, rules: CombiningRules) -> Self {
        let n_types = db.len();
        let mut pairs = Vec::with_capacity(n_types * n_types);
        for a in &db.params {
            for b in &db.params {
                pairs.push(rules.combine(a, b));
            }
        }
        Self { n_types, pairs }
    }

    /// Pair parameter of types `a` and `b`; unknown types behave as dummies.
    #[inline]
    pub fn get(&self, a: LjId, b: LjId) -> LjParameter {
        let (i, j) = (a.index(), b.index());
        if i < self.n_types && j < self.n_types {
            self.pairs[i * self.n_types + j]
        } else {
            LjParameter::dummy()
        }
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }
}
