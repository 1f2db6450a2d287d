use super::load_system;
use crate::cli::EnergyArgs;
use crate::error::Result;
use cljff::core::forcefield::term::CljEnergy;
use tracing::info;

pub fn run(args: EnergyArgs) -> Result<CljEnergy> {
    let (mut forcefield, _) = load_system(&args.system)?;

    info!("Evaluating the full energy...");
    let energy = forcefield.energy()?;

    for (name, value) in forcefield.components()? {
        println!("{:<20} {:>16.6} kcal/mol", name, value);
    }
    println!("{:<20} {:>16.6} kcal/mol", "total", energy.total());
    Ok(energy)
}
