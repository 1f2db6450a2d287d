use super::load_system;
use crate::cli::McArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::StepProgress;
use cljff::core::forcefield::term::CljEnergy;
use cljff::engine::forcefield::InterFF;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Boltzmann constant in kcal/(mol K).
const BOLTZMANN: f64 = 0.001_987_204_1;

/// Largest tolerated relative gap between the running and the recalculated energy.
const DRIFT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McSummary {
    pub attempted: usize,
    pub accepted: usize,
    pub energy: CljEnergy,
    /// Gap between the running energy and a full recalculation at the end of the run.
    pub drift: f64,
}

impl McSummary {
    pub fn acceptance(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

fn drift_of(forcefield: &InterFF, running: CljEnergy) -> Result<f64> {
    let mut reference = forcefield.clone();
    reference.must_recalculate_from_scratch();
    let full = reference.energy()?;
    Ok((full.total() - running.total()).abs())
}

fn validate(args: &McArgs) -> Result<()> {
    if !(args.temperature.is_finite() && args.temperature > 0.0) {
        return Err(CliError::Argument(format!(
            "Temperature must be positive, got {}",
            args.temperature
        )));
    }
    if !(args.max_displacement.is_finite() && args.max_displacement > 0.0) {
        return Err(CliError::Argument(format!(
            "Maximum displacement must be positive, got {}",
            args.max_displacement
        )));
    }
    Ok(())
}

pub fn run(args: McArgs, show_progress: bool) -> Result<McSummary> {
    validate(&args)?;
    let (mut forcefield, mut molecules) = load_system(&args.system)?;
    if molecules.is_empty() {
        return Err(CliError::Argument(
            "The molecule table contains no molecules to move".to_string(),
        ));
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let kt = BOLTZMANN * args.temperature;
    let d = args.max_displacement;

    let mut current = forcefield.energy()?;
    println!("Initial energy: {:.6} kcal/mol", current.total());
    info!(
        "Starting {} Monte Carlo steps at {} K (kT = {:.6} kcal/mol)",
        args.steps, args.temperature, kt
    );

    let progress = StepProgress::new(args.steps as u64, !show_progress);
    let mut accepted = 0usize;
    for step in 1..=args.steps {
        let i = rng.gen_range(0..molecules.len());
        let shift = Vector3::from_fn(|_, _| rng.gen_range(-d..=d));
        let trial = molecules[i].translated(&shift);

        forcefield.update(&trial)?;
        let energy = forcefield.energy()?;
        let delta = energy.total() - current.total();
        if delta <= 0.0 || rng.r#gen::<f64>() < (-delta / kt).exp() {
            forcefield.accept()?;
            molecules[i] = trial;
            current = energy;
            accepted += 1;
            debug!("Step {}: accepted move of molecule {} (dE = {:.6})", step, i, delta);
        } else {
            forcefield.reject();
        }

        if args.check_every > 0 && step % args.check_every == 0 {
            let drift = drift_of(&forcefield, current)?;
            if drift > DRIFT_TOLERANCE * current.total().abs().max(1.0) {
                warn!("Energy drift of {:.3e} kcal/mol at step {}", drift, step);
            }
            progress.println(format!("step {step}: E = {:.6}, drift = {:.3e}", current.total(), drift));
        }
        progress.inc(accepted as f64 / step as f64);
    }
    progress.finish();

    let summary = McSummary {
        attempted: args.steps,
        accepted,
        energy: current,
        drift: drift_of(&forcefield, current)?,
    };
    info!(
        "Monte Carlo finished: {}/{} moves accepted, drift {:.3e}",
        summary.accepted, summary.attempted, summary.drift
    );

    for (name, value) in forcefield.components()? {
        println!("{:<20} {:>16.6} kcal/mol", name, value);
    }
    println!(
        "Final energy: {:.6} kcal/mol ({:.1}% of moves accepted)",
        summary.energy.total(),
        100.0 * summary.acceptance()
    );
    Ok(summary)
}
