use super::cutoff::CljCutoffFunction;
use super::error::ConfigError;
use super::function::{CljFunction, CljFunctionBase};
use super::params::{CombiningRules, LjParameter, LjParameterDb};
use super::potentials::{soft_coulomb, soft_lennard_jones};
use super::term::CljEnergy;
use serde::Deserialize;
use std::sync::Arc;

/// Softening applied by [`CljSoftFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SoftParameters {
    /// Softening strength; zero gives the hard potential.
    pub alpha: f64,
    /// LJ distance shift multiplier (delta).
    pub shift_delta: f64,
    /// Exponent `n` of the `(1 - alpha)^n` Coulomb scaling.
    pub coulomb_power: f64,
}

impl Default for SoftParameters {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            shift_delta: 1.5,
            coulomb_power: 1.0,
        }
    }
}

impl SoftParameters {
    pub fn new(alpha: f64, shift_delta: f64, coulomb_power: f64) -> Self {
        Self {
            alpha,
            shift_delta,
            coulomb_power,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            alpha,
            shift_delta,
            coulomb_power,
        } = *self;
        if !(alpha.is_finite() && shift_delta.is_finite() && coulomb_power.is_finite()) {
            return Err(ConfigError::SoftCore(format!(
                "parameters must be finite (alpha = {alpha}, shift_delta = {shift_delta}, coulomb_power = {coulomb_power})"
            )));
        }
        if alpha < 0.0 {
            return Err(ConfigError::SoftCore(format!(
                "alpha must be non-negative, got {alpha}"
            )));
        }
        if shift_delta < 0.0 {
            return Err(ConfigError::SoftCore(format!(
                "shift_delta must be non-negative, got {shift_delta}"
            )));
        }
        if coulomb_power < 0.0 {
            return Err(ConfigError::SoftCore(format!(
                "coulomb_power must be non-negative, got {coulomb_power}"
            )));
        }
        // (1 - alpha) is negative here, so only integer powers stay real.
        if alpha > 1.0 && coulomb_power.fract() != 0.0 {
            return Err(ConfigError::SoftCore(format!(
                "alpha = {alpha} > 1 requires an integer coulomb_power, got {coulomb_power}"
            )));
        }
        Ok(())
    }
}

/// Soft-core kernel for alchemical perturbations.
///
/// Cutoffs behave exactly as in [`CljCutoffFunction`]. The Coulomb term is always
/// truncated; with `alpha == 0` every pair is evaluated by the hard kernel.
#[derive(Debug, Clone)]
pub struct CljSoftFunction {
    hard: CljCutoffFunction,
    soft: SoftParameters,
}

impl CljSoftFunction {
    pub fn new(lj_params: Arc<LjParameterDb>, combining_rules: CombiningRules) -> Self {
        Self {
            hard: CljCutoffFunction::new(lj_params, combining_rules),
            soft: SoftParameters::default(),
        }
    }

    pub fn with_cutoffs(mut self, coulomb: f64, lj: f64) -> Result<Self, ConfigError> {
        self.hard.set_cutoffs(coulomb, lj)?;
        Ok(self)
    }

    pub fn with_soft_parameters(mut self, params: SoftParameters) -> Result<Self, ConfigError> {
        self.set_soft_parameters(params)?;
        Ok(self)
    }

    pub fn alpha(&self) -> f64 {
        self.soft.alpha
    }
}

impl CljFunction for CljSoftFunction {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn base(&self) -> &CljFunctionBase {
        self.hard.base()
    }

    fn base_mut(&mut self) -> &mut CljFunctionBase {
        self.hard.base_mut()
    }

    fn box_clone(&self) -> Box<dyn CljFunction> {
        Box::new(self.clone())
    }

    fn coulomb_cutoff(&self) -> f64 {
        self.hard.coulomb_cutoff()
    }

    fn lj_cutoff(&self) -> f64 {
        self.hard.lj_cutoff()
    }

    #[inline]
    fn pair_energy(&self, r: f64, qq: f64, lj: &LjParameter) -> CljEnergy {
        let SoftParameters {
            alpha,
            shift_delta,
            coulomb_power,
        } = self.soft;
        if alpha == 0.0 {
            return self.hard.pair_energy(r, qq, lj);
        }
        let coulomb = if r < self.hard.coulomb_cutoff() {
            soft_coulomb(r, qq, alpha, coulomb_power)
        } else {
            0.0
        };
        let lj = if r < self.hard.lj_cutoff() {
            soft_lennard_jones(r, lj.sigma, lj.epsilon, alpha, shift_delta)
        } else {
            0.0
        };
        CljEnergy::new(coulomb, lj)
    }

    fn set_cutoffs(&mut self, coulomb: f64, lj: f64) -> Result<(), ConfigError> {
        self.hard.set_cutoffs(coulomb, lj)
    }

    fn soft_parameters(&self) -> Option<SoftParameters> {
        Some(self.soft)
    }

    fn set_soft_parameters(&mut self, params: SoftParameters) -> Result<(), ConfigError> {
        params.validate()?;
        self.soft = params;
        Ok(())
    }
}
