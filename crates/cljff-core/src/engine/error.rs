use thiserror::Error;

use crate::core::boxes::BoxError;
use crate::core::forcefield::error::ConfigError;
use crate::core::models::ids::{LjId, MolNum};
use crate::core::models::molecule::MoleculeError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CljError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Box bookkeeping error: {source}")]
    Box {
        #[from]
        source: BoxError,
    },

    #[error("Invalid molecule topology: {source}")]
    Topology {
        #[from]
        source: MoleculeError,
    },

    #[error("Molecule {0} is not part of this group")]
    MoleculeNotFound(MolNum),

    #[error("Molecule {0} is already part of this group")]
    DuplicateMolecule(MolNum),

    #[error("Molecule {0} already belongs to the other group of this forcefield")]
    MoleculeInOtherGroup(MolNum),

    #[error("Molecule {molecule} is incompatible with its tracked version: {reason}")]
    Incompatible { molecule: MolNum, reason: String },

    #[error("Atom {atom} of molecule {molecule} uses {lj_id}, which has no LJ parameters")]
    MissingLjParameter {
        molecule: MolNum,
        atom: usize,
        lj_id: LjId,
    },
}
