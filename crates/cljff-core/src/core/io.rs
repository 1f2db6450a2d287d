use crate::core::forcefield::params::{LjParameterDb, ParamLoadError};
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::{Connectivity, Molecule, MoleculeView};
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AtomRecord {
    molecule: MolNum,
    x: f64,
    y: f64,
    z: f64,
    charge: f64,
    lj_type: String,
}

#[derive(Debug, Deserialize)]
struct BondRecord {
    molecule: MolNum,
    atom1: usize,
    atom2: usize,
}

fn csv_error(origin: &str) -> impl Fn(csv::Error) -> ParamLoadError + '_ {
    move |e| ParamLoadError::Csv {
        path: origin.to_string(),
        source: e,
    }
}

/// Reads molecules from a CSV table with columns `molecule,x,y,z,charge,lj_type`.
///
/// Rows of the same molecule need not be contiguous; atoms keep their row order.
/// Molecules are returned sorted by number. Charges are in elementary charge units.
pub fn read_molecules_csv(path: &Path, lj_params: &LjParameterDb) -> Result<Vec<Molecule>, ParamLoadError> {
    let origin = path.to_string_lossy();
    let reader = csv::Reader::from_path(path).map_err(csv_error(&origin))?;
    collect_molecules(reader, &origin, lj_params)
}

/// Same as [`read_molecules_csv`] but from any reader.
pub fn read_molecules(
    input: impl Read,
    lj_params: &LjParameterDb,
) -> Result<Vec<Molecule>, ParamLoadError> {
    collect_molecules(csv::Reader::from_reader(input), "<reader>", lj_params)
}

fn collect_molecules<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
    lj_params: &LjParameterDb,
) -> Result<Vec<Molecule>, ParamLoadError> {
    let mut molecules: BTreeMap<MolNum, Molecule> = BTreeMap::new();
    for result in reader.deserialize::<AtomRecord>() {
        let record = result.map_err(csv_error(origin))?;
        let lj_type = lj_params
            .id_of(&record.lj_type)
            .ok_or_else(|| ParamLoadError::UnknownLjType {
                path: origin.to_string(),
                name: record.lj_type.clone(),
            })?;
        molecules
            .entry(record.molecule)
            .or_insert_with(|| Molecule::new(record.molecule))
            .push_atom(
                Point3::new(record.x, record.y, record.z),
                record.charge,
                lj_type,
            );
    }
    Ok(molecules.into_values().collect())
}

/// Reads a bond table with columns `molecule,atom1,atom2` and attaches the
/// resulting connectivity to the matching molecules.
///
/// Atom indices are zero-based positions within each molecule. Molecules
/// without any bond rows are left untouched.
pub fn read_bonds_csv(path: &Path, molecules: &mut [Molecule]) -> Result<(), ParamLoadError> {
    let origin = path.to_string_lossy();
    let reader = csv::Reader::from_path(path).map_err(csv_error(&origin))?;
    attach_bonds(reader, &origin, molecules)
}

pub fn read_bonds(input: impl Read, molecules: &mut [Molecule]) -> Result<(), ParamLoadError> {
    attach_bonds(csv::Reader::from_reader(input), "<reader>", molecules)
}

fn attach_bonds<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
    molecules: &mut [Molecule],
) -> Result<(), ParamLoadError> {
    let mut connectivities: BTreeMap<MolNum, Connectivity> = BTreeMap::new();
    for result in reader.deserialize::<BondRecord>() {
        let record = result.map_err(csv_error(origin))?;
        let n_atoms = molecules
            .iter()
            .find(|m| m.number() == record.molecule)
            .map(|m| m.n_atoms())
            .ok_or_else(|| ParamLoadError::UnknownMolecule {
                path: origin.to_string(),
                molecule: record.molecule.0,
            })?;
        connectivities
            .entry(record.molecule)
            .or_insert_with(|| Connectivity::new(n_atoms))
            .add_bond(record.atom1, record.atom2)
            .map_err(|e| ParamLoadError::Topology {
                path: origin.to_string(),
                source: e,
            })?;
    }

    for molecule in molecules.iter_mut() {
        if let Some(connectivity) = connectivities.remove(&molecule.number()) {
            molecule.set_connectivity(Some(connectivity));
        }
    }
    Ok(())
}
