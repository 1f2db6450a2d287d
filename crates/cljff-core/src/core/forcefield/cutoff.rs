use super::error::ConfigError;
use super::function::{CljFunction, CljFunctionBase};
use super::params::{CombiningRules, LjParameter, LjParameterDb};
use super::potentials::{
    coulomb, coulomb_force_shifted, coulomb_reaction_field, lennard_jones_12_6,
};
use super::term::CljEnergy;
use crate::core::models::space::Space;
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_CUTOFF: f64 = 10.0;

/// How the Coulomb term is brought to zero at the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CoulombMethod {
    /// Plain Coulomb, simply dropped beyond the cutoff.
    #[default]
    Truncated,
    ForceShifted,
    ReactionField { dielectric: f64 },
}

impl CoulombMethod {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            CoulombMethod::ReactionField { dielectric }
                if !dielectric.is_finite() || dielectric <= 0.0 =>
            {
                Err(ConfigError::InvalidDielectric(dielectric))
            }
            _ => Ok(()),
        }
    }

    #[inline]
    pub fn energy(&self, r: f64, qq: f64, cutoff: f64) -> f64 {
        match *self {
            CoulombMethod::Truncated => coulomb(r, qq),
            CoulombMethod::ForceShifted => coulomb_force_shifted(r, qq, cutoff),
            CoulombMethod::ReactionField { dielectric } => {
                coulomb_reaction_field(r, qq, cutoff, dielectric)
            }
        }
    }
}

/// Clamps a cutoff into `[0, f64::MAX]`; only NaN is rejected.
pub(crate) fn clamp_cutoff(cutoff: f64) -> Result<f64, ConfigError> {
    if cutoff.is_nan() {
        return Err(ConfigError::InvalidCutoff(cutoff));
    }
    Ok(cutoff.clamp(0.0, f64::MAX))
}

/// The standard hard-cutoff kernel with independent Coulomb and LJ cutoffs.
#[derive(Debug, Clone)]
pub struct CljCutoffFunction {
    base: CljFunctionBase,
    coulomb_cutoff: f64,
    lj_cutoff: f64,
    coulomb_method: CoulombMethod,
}

impl CljCutoffFunction {
    pub fn new(lj_params: Arc<LjParameterDb>, combining_rules: CombiningRules) -> Self {
        Self {
            base: CljFunctionBase::new(lj_params, combining_rules),
            coulomb_cutoff: DEFAULT_CUTOFF,
            lj_cutoff: DEFAULT_CUTOFF,
            coulomb_method: CoulombMethod::Truncated,
        }
    }

    pub fn with_cutoffs(mut self, coulomb: f64, lj: f64) -> Result<Self, ConfigError> {
        self.set_cutoffs(coulomb, lj)?;
        Ok(self)
    }

    pub fn with_coulomb_method(mut self, method: CoulombMethod) -> Result<Self, ConfigError> {
        self.set_coulomb_method(method)?;
        Ok(self)
    }

    pub fn with_space(mut self, space: Space) -> Result<Self, ConfigError> {
        self.set_space(space)?;
        Ok(self)
    }

    pub fn coulomb_method(&self) -> CoulombMethod {
        self.coulomb_method
    }

    pub fn set_coulomb_method(&mut self, method: CoulombMethod) -> Result<(), ConfigError> {
        method.validate()?;
        self.coulomb_method = method;
        Ok(())
    }

    /// Checks and clamps a cutoff pair without touching `self`.
    pub(crate) fn checked_cutoffs(&self, coulomb: f64, lj: f64) -> Result<(f64, f64), ConfigError> {
        let coulomb = clamp_cutoff(coulomb)?;
        let lj = clamp_cutoff(lj)?;
        self.base.space().validate_cutoff(coulomb.max(lj))?;
        Ok((coulomb, lj))
    }
}

impl CljFunction for CljCutoffFunction {
    fn name(&self) -> &'static str {
        "cutoff"
    }

    fn base(&self) -> &CljFunctionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CljFunctionBase {
        &mut self.base
    }

    fn box_clone(&self) -> Box<dyn CljFunction> {
        Box::new(self.clone())
    }

    fn coulomb_cutoff(&self) -> f64 {
        self.coulomb_cutoff
    }

    fn lj_cutoff(&self) -> f64 {
        self.lj_cutoff
    }

    #[inline]
    fn pair_energy(&self, r: f64, qq: f64, lj: &LjParameter) -> CljEnergy {
        let coulomb = if r < self.coulomb_cutoff {
            self.coulomb_method.energy(r, qq, self.coulomb_cutoff)
        } else {
            0.0
        };
        let lj = if r < self.lj_cutoff {
            lennard_jones_12_6(r, lj.sigma, lj.epsilon)
        } else {
            0.0
        };
        CljEnergy::new(coulomb, lj)
    }

    fn set_cutoffs(&mut self, coulomb: f64, lj: f64) -> Result<(), ConfigError> {
        let (coulomb, lj) = self.checked_cutoffs(coulomb, lj)?;
        self.coulomb_cutoff = coulomb;
        self.lj_cutoff = lj;
        Ok(())
    }
}
