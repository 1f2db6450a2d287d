pub mod energy;
pub mod mc;

use crate::cli::SystemArgs;
use crate::config;
use crate::error::Result;
use cljff::core::forcefield::params::LjParameterDb;
use cljff::core::io;
use cljff::core::models::molecule::Molecule;
use cljff::engine::forcefield::InterFF;
use std::sync::Arc;
use tracing::info;

/// Name under which the CLI reports the energy components.
pub const FORCEFIELD_NAME: &str = "system";

/// Loads parameters, molecules and configuration, and builds a forcefield holding every molecule.
pub fn load_system(args: &SystemArgs) -> Result<(InterFF, Vec<Molecule>)> {
    let config = config::resolve(args)?;

    info!("Loading LJ parameters from {:?}", &args.params);
    let lj_params = Arc::new(LjParameterDb::load(&args.params)?);

    info!("Loading molecules from {:?}", &args.molecules);
    let mut molecules = io::read_molecules_csv(&args.molecules, &lj_params)?;
    if let Some(bonds) = &args.bonds {
        info!("Loading bonds from {:?}", bonds);
        io::read_bonds_csv(bonds, &mut molecules)?;
    }

    let mut forcefield = InterFF::from_config(FORCEFIELD_NAME, &config, lj_params)?;
    for molecule in &molecules {
        forcefield.add(molecule)?;
    }
    info!(
        "Built forcefield with {} molecules and {} atoms ({} kernel, coulomb cutoff {}, lj cutoff {})",
        molecules.len(),
        forcefield.group().boxes().n_atoms(),
        forcefield.function().name(),
        forcefield.coulomb_cutoff(),
        forcefield.lj_cutoff()
    );
    Ok((forcefield, molecules))
}
