use crate::core::forcefield::cutoff::{CljCutoffFunction, CoulombMethod, DEFAULT_CUTOFF};
use crate::core::forcefield::error::ConfigError;
use crate::core::forcefield::function::CljFunction;
use crate::core::forcefield::intra::{CljIntraFunction, DEFAULT_SCALE_14};
use crate::core::forcefield::params::{CombiningRules, LjParameterDb, ParamLoadError};
use crate::core::forcefield::soft::{CljSoftFunction, SoftParameters};
use crate::core::models::space::{PeriodicBox, Space};
use nalgebra::Vector3;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Scaling of 1-4 pairs for the intramolecular term.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntraConfig {
    pub scale14_coulomb: f64,
    pub scale14_lj: f64,
}

impl Default for IntraConfig {
    fn default() -> Self {
        Self {
            scale14_coulomb: DEFAULT_SCALE_14.0,
            scale14_lj: DEFAULT_SCALE_14.1,
        }
    }
}

/// Settings of a CLJ forcefield, as read from a TOML run file.
///
/// ```toml
/// coulomb_cutoff = 12.0
/// lj_cutoff = 10.0
/// combining_rules = "geometric"
/// periodic_box = [30.0, 30.0, 30.0]
///
/// [coulomb_method]
/// kind = "reaction-field"
/// dielectric = 78.3
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CljConfig {
    pub coulomb_cutoff: f64,
    pub lj_cutoff: f64,
    pub coulomb_method: CoulombMethod,
    pub combining_rules: CombiningRules,
    /// Soft-core parameters; selects the soft kernel when present.
    pub soft: Option<SoftParameters>,
    /// Edge lengths of the periodic box; vacuum when absent.
    pub periodic_box: Option<[f64; 3]>,
    /// Enables the intramolecular term.
    pub intramolecular: Option<IntraConfig>,
    pub parallel: bool,
    pub reproducible: bool,
}

impl Default for CljConfig {
    fn default() -> Self {
        Self {
            coulomb_cutoff: DEFAULT_CUTOFF,
            lj_cutoff: DEFAULT_CUTOFF,
            coulomb_method: CoulombMethod::default(),
            combining_rules: CombiningRules::default(),
            soft: None,
            periodic_box: None,
            intramolecular: None,
            parallel: cfg!(feature = "parallel"),
            reproducible: false,
        }
    }
}

impl CljConfig {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ParamLoadError> {
        toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: "<string>".to_string(),
            source: e,
        })
    }

    pub fn space(&self) -> Result<Space, ConfigError> {
        match self.periodic_box {
            Some(dimensions) => Ok(Space::Periodic(PeriodicBox::new(Vector3::from(dimensions))?)),
            None => Ok(Space::Vacuum),
        }
    }

    /// Builds the intermolecular kernel described by this configuration.
    ///
    /// The soft kernel only supports the truncated Coulomb method.
    pub fn build_function(
        &self,
        lj_params: Arc<LjParameterDb>,
    ) -> Result<Box<dyn CljFunction>, ConfigError> {
        let space = self.space()?;
        match self.soft {
            Some(params) => {
                if self.coulomb_method != CoulombMethod::Truncated {
                    return Err(ConfigError::Unsupported {
                        function: "soft",
                        parameter: "coulomb method",
                    });
                }
                let mut function = CljSoftFunction::new(lj_params, self.combining_rules)
                    .with_cutoffs(self.coulomb_cutoff, self.lj_cutoff)?
                    .with_soft_parameters(params)?;
                function.set_space(space)?;
                Ok(Box::new(function))
            }
            None => {
                let function = CljCutoffFunction::new(lj_params, self.combining_rules)
                    .with_cutoffs(self.coulomb_cutoff, self.lj_cutoff)?
                    .with_coulomb_method(self.coulomb_method)?
                    .with_space(space)?;
                Ok(Box::new(function))
            }
        }
    }

    /// Builds the intramolecular kernel, if the term is enabled.
    pub fn build_intra_function(
        &self,
        lj_params: Arc<LjParameterDb>,
    ) -> Result<Option<CljIntraFunction>, ConfigError> {
        let Some(intra) = self.intramolecular else {
            return Ok(None);
        };
        let mut function = CljIntraFunction::new(lj_params, self.combining_rules)
            .with_cutoffs(self.coulomb_cutoff, self.lj_cutoff)?
            .with_scale14(intra.scale14_coulomb, intra.scale14_lj);
        function.set_space(self.space()?)?;
        Ok(Some(function))
    }
}

#[derive(Default)]
pub struct CljConfigBuilder {
    coulomb_cutoff: Option<f64>,
    lj_cutoff: Option<f64>,
    coulomb_method: Option<CoulombMethod>,
    combining_rules: Option<CombiningRules>,
    soft: Option<SoftParameters>,
    periodic_box: Option<[f64; 3]>,
    intramolecular: Option<IntraConfig>,
    parallel: Option<bool>,
    reproducible: Option<bool>,
}

impl CljConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets both cutoffs.
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.coulomb_cutoff = Some(cutoff);
        self.lj_cutoff = Some(cutoff);
        self
    }
    pub fn coulomb_cutoff(mut self, cutoff: f64) -> Self {
        self.coulomb_cutoff = Some(cutoff);
        self
    }
    pub fn lj_cutoff(mut self, cutoff: f64) -> Self {
        self.lj_cutoff = Some(cutoff);
        self
    }
    pub fn coulomb_method(mut self, method: CoulombMethod) -> Self {
        self.coulomb_method = Some(method);
        self
    }
    pub fn combining_rules(mut self, rules: CombiningRules) -> Self {
        self.combining_rules = Some(rules);
        self
    }
    pub fn soft(mut self, params: SoftParameters) -> Self {
        self.soft = Some(params);
        self
    }
    pub fn periodic_box(mut self, dimensions: [f64; 3]) -> Self {
        self.periodic_box = Some(dimensions);
        self
    }
    pub fn intramolecular(mut self, intra: IntraConfig) -> Self {
        self.intramolecular = Some(intra);
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
    pub fn reproducible(mut self, reproducible: bool) -> Self {
        self.reproducible = Some(reproducible);
        self
    }

    pub fn build(self) -> Result<CljConfig, ConfigError> {
        let defaults = CljConfig::default();
        Ok(CljConfig {
            coulomb_cutoff: self
                .coulomb_cutoff
                .ok_or(ConfigError::MissingParameter("coulomb_cutoff"))?,
            lj_cutoff: self
                .lj_cutoff
                .ok_or(ConfigError::MissingParameter("lj_cutoff"))?,
            coulomb_method: self.coulomb_method.unwrap_or(defaults.coulomb_method),
            combining_rules: self.combining_rules.unwrap_or(defaults.combining_rules),
            soft: self.soft,
            periodic_box: self.periodic_box,
            intramolecular: self.intramolecular,
            parallel: self.parallel.unwrap_or(defaults.parallel),
            reproducible: self.reproducible.unwrap_or(defaults.reproducible),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::LjParameter;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn db() -> Arc<LjParameterDb> {
        let mut db = LjParameterDb::new();
        db.add("OW", LjParameter::new(3.15, 0.152));
        Arc::new(db)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = CljConfig::from_toml_str("").unwrap();
        assert_eq!(config, CljConfig::default());
        assert_eq!(config.coulomb_cutoff, DEFAULT_CUTOFF);
        assert_eq!(config.space().unwrap(), Space::Vacuum);
    }

    #[test]
    fn full_file_is_parsed() {
        let config = CljConfig::from_toml_str(
            r#"
            coulomb_cutoff = 12.0
            lj_cutoff = 9.0
            combining_rules = "geometric"
            periodic_box = [30.0, 30.0, 40.0]
            reproducible = true

            [coulomb_method]
            kind = "reaction-field"
            dielectric = 78.3

            [intramolecular]
            scale14_lj = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.lj_cutoff, 9.0);
        assert_eq!(config.combining_rules, CombiningRules::Geometric);
        assert_eq!(
            config.coulomb_method,
            CoulombMethod::ReactionField { dielectric: 78.3 }
        );
        assert!(config.reproducible);
        let intra = config.intramolecular.unwrap();
        assert_eq!(intra.scale14_lj, 0.25);
        assert_eq!(intra.scale14_coulomb, DEFAULT_SCALE_14.0);
        assert!(config.space().unwrap().is_periodic());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = CljConfig::from_toml_str("cutof = 10.0");
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "coulomb_cutoff = 15.0\nlj_cutoff = 8.0").unwrap();
        let config = CljConfig::load(file.path()).unwrap();
        assert_eq!(config.coulomb_cutoff, 15.0);
        assert_eq!(config.lj_cutoff, 8.0);

        let missing = CljConfig::load(Path::new("/nonexistent/run.toml"));
        assert!(matches!(missing, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn builder_requires_both_cutoffs() {
        assert_eq!(
            CljConfigBuilder::new().lj_cutoff(8.0).build(),
            Err(ConfigError::MissingParameter("coulomb_cutoff"))
        );
        assert_eq!(
            CljConfigBuilder::new().coulomb_cutoff(8.0).build(),
            Err(ConfigError::MissingParameter("lj_cutoff"))
        );
        let config = CljConfigBuilder::new()
            .cutoff(8.0)
            .combining_rules(CombiningRules::Geometric)
            .parallel(false)
            .build()
            .unwrap();
        assert_eq!((config.coulomb_cutoff, config.lj_cutoff), (8.0, 8.0));
        assert!(!config.parallel);
    }

    #[test]
    fn build_function_selects_kernel() {
        let hard = CljConfigBuilder::new()
            .cutoff(9.0)
            .coulomb_method(CoulombMethod::ForceShifted)
            .build()
            .unwrap()
            .build_function(db())
            .unwrap();
        assert_eq!(hard.name(), "cutoff");
        assert_eq!(hard.max_cutoff(), 9.0);

        let soft = CljConfigBuilder::new()
            .cutoff(9.0)
            .soft(SoftParameters::new(0.2, 1.5, 1.0))
            .build()
            .unwrap()
            .build_function(db())
            .unwrap();
        assert_eq!(soft.name(), "soft");
        assert_eq!(soft.soft_parameters().map(|p| p.alpha), Some(0.2));
    }

    #[test]
    fn soft_kernel_rejects_shifted_coulomb() {
        let config = CljConfigBuilder::new()
            .cutoff(9.0)
            .coulomb_method(CoulombMethod::ForceShifted)
            .soft(SoftParameters::default())
            .build()
            .unwrap();
        assert!(matches!(
            config.build_function(db()),
            Err(ConfigError::Unsupported { function: "soft", .. })
        ));
    }

    #[test]
    fn periodic_box_must_hold_the_cutoff() {
        let config = CljConfigBuilder::new()
            .cutoff(12.0)
            .periodic_box([20.0, 30.0, 30.0])
            .build()
            .unwrap();
        assert!(matches!(
            config.build_function(db()),
            Err(ConfigError::CutoffExceedsBox { .. })
        ));
        assert!(matches!(
            CljConfigBuilder::new()
                .cutoff(5.0)
                .periodic_box([20.0, 0.0, 30.0])
                .build()
                .unwrap()
                .space(),
            Err(ConfigError::InvalidBox(_))
        ));
    }

    #[test]
    fn intra_function_is_built_only_when_enabled() {
        let config = CljConfigBuilder::new().cutoff(10.0).build().unwrap();
        assert!(config.build_intra_function(db()).unwrap().is_none());

        let config = CljConfigBuilder::new()
            .cutoff(10.0)
            .intramolecular(IntraConfig {
                scale14_coulomb: 0.5,
                scale14_lj: 0.5,
            })
            .build()
            .unwrap();
        let intra = config.build_intra_function(db()).unwrap().unwrap();
        assert_eq!(intra.scale14(), (0.5, 0.5));
        assert_eq!(intra.coulomb_cutoff(), 10.0);
    }
}
