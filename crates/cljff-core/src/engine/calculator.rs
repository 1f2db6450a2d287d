use super::group::CljGroup;
use crate::core::boxes::{BoxPair, CljBoxes, box_length_for};
use crate::core::forcefield::function::CljFunction;
use crate::core::forcefield::term::CljEnergy;
use crate::core::models::atoms::{CljAtom, CljAtoms};
use tracing::{instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Drives a [`CljFunction`] over the box pairs of one or two [`CljBoxes`].
///
/// In parallel mode each box pair is evaluated as an independent task. With
/// `reproducible` set, the per-pair results are collected in enumeration order and
/// summed sequentially, which gives bit-identical totals to the sequential mode
/// for any number of threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CljCalculator {
    parallel: bool,
    reproducible: bool,
}

impl Default for CljCalculator {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            reproducible: false,
        }
    }
}

impl CljCalculator {
    pub fn new(parallel: bool, reproducible: bool) -> Self {
        Self {
            parallel,
            reproducible,
        }
    }

    pub fn sequential() -> Self {
        Self::new(false, false)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_reproducible(&self) -> bool {
        self.reproducible
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn set_reproducible(&mut self, reproducible: bool) {
        self.reproducible = reproducible;
    }

    /// Total energy of all interacting pairs stored in `boxes`.
    #[instrument(skip_all, fields(atoms = boxes.n_atoms()))]
    pub fn calculate(&self, function: &dyn CljFunction, boxes: &CljBoxes) -> CljEnergy {
        let pairs = boxes.box_pairs_within(function.max_cutoff(), function.space());
        trace!("Evaluating {} box pairs", pairs.len());
        self.sum(&pairs, |pair| match *pair {
            BoxPair::Within(bucket) => function.calculate(bucket.atoms()),
            BoxPair::Between(a, b) => function.calculate_between(a.atoms(), b.atoms()),
        })
    }

    /// Energy between the atoms of `a` and the atoms of `b`.
    #[instrument(skip_all, fields(a = a.n_atoms(), b = b.n_atoms()))]
    pub fn calculate_between(
        &self,
        function: &dyn CljFunction,
        a: &CljBoxes,
        b: &CljBoxes,
    ) -> CljEnergy {
        let pairs = a.box_pairs_between(b, function.max_cutoff(), function.space());
        trace!("Evaluating {} box pairs", pairs.len());
        self.sum(&pairs, |(x, y)| function.calculate_between(x.atoms(), y.atoms()))
    }

    /// Energy between loose `atoms` and everything stored in `boxes`.
    pub fn calculate_against(
        &self,
        function: &dyn CljFunction,
        atoms: &[CljAtom],
        boxes: &CljBoxes,
    ) -> CljEnergy {
        if atoms.is_empty() || boxes.is_empty() {
            return CljEnergy::ZERO;
        }
        let probe = Self::probe(atoms, boxes.box_length());
        self.calculate_between(function, &probe, boxes)
    }

    /// Energy of all interacting pairs within loose `atoms`.
    pub fn calculate_atoms(&self, function: &dyn CljFunction, atoms: &[CljAtom]) -> CljEnergy {
        if atoms.len() < 2 {
            return CljEnergy::ZERO;
        }
        let probe = Self::probe(atoms, box_length_for(function.max_cutoff()));
        self.calculate(function, &probe)
    }

    /// Energy change of a group's pending changes against the group itself.
    ///
    /// With `A` the atoms being replaced and `A'` their replacements:
    /// `dE = E(A', boxes) - E(A', A) + E_self(A') - E(A, boxes) + E(A, A) - E_self(A)`,
    /// where the boxes still hold `A`.
    #[instrument(skip_all, fields(changed = group.workspace().len()))]
    pub fn delta(&self, function: &dyn CljFunction, group: &CljGroup) -> CljEnergy {
        if !group.needs_accepting() {
            return CljEnergy::ZERO;
        }
        let new = group.changed_atoms();
        let old = group.old_changed_atoms();
        let boxes = group.boxes();

        let new_side = self.calculate_against(function, new.as_slice(), boxes)
            - function.calculate_between(new.as_slice(), old.as_slice())
            + self.calculate_atoms(function, new.as_slice());
        let old_side = self.calculate_against(function, old.as_slice(), boxes)
            - function.calculate_between(old.as_slice(), old.as_slice())
            + self.calculate_atoms(function, old.as_slice());
        let delta = new_side - old_side;
        trace!(
            "dE = {:.6} (coulomb {:.6}, lj {:.6})",
            delta.total(),
            delta.coulomb,
            delta.lj
        );
        delta
    }

    /// Energy change of the pending changes of two groups, counting only pairs
    /// with one atom in each group.
    #[instrument(skip_all)]
    pub fn delta_between(&self, function: &dyn CljFunction, a: &CljGroup, b: &CljGroup) -> CljEnergy {
        if !a.needs_accepting() && !b.needs_accepting() {
            return CljEnergy::ZERO;
        }
        let (new_a, old_a) = (a.changed_atoms(), a.old_changed_atoms());
        let (new_b, old_b) = (b.changed_atoms(), b.old_changed_atoms());

        let against = self.calculate_against(function, new_a.as_slice(), b.boxes())
            - self.calculate_against(function, old_a.as_slice(), b.boxes())
            + self.calculate_against(function, new_b.as_slice(), a.boxes())
            - self.calculate_against(function, old_b.as_slice(), a.boxes());
        let changed = pairwise(function, &new_a, &new_b) - pairwise(function, &new_a, &old_b)
            - pairwise(function, &old_a, &new_b)
            + pairwise(function, &old_a, &old_b);
        against + changed
    }

    fn probe(atoms: &[CljAtom], box_length: f64) -> CljBoxes {
        let mut probe = CljBoxes::with_box_length(box_length);
        for atom in atoms {
            probe.add_atom(*atom);
        }
        probe
    }

    #[cfg(feature = "parallel")]
    fn sum<T, F>(&self, items: &[T], eval: F) -> CljEnergy
    where
        T: Sync,
        F: Fn(&T) -> CljEnergy + Sync + Send,
    {
        if !self.parallel || items.len() < 2 {
            return items.iter().map(eval).sum();
        }
        if self.reproducible {
            let partials: Vec<CljEnergy> = items.par_iter().map(&eval).collect();
            partials.into_iter().sum()
        } else {
            items
                .par_iter()
                .map(&eval)
                .reduce(|| CljEnergy::ZERO, |acc, e| acc + e)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn sum<T, F>(&self, items: &[T], eval: F) -> CljEnergy
    where
        F: Fn(&T) -> CljEnergy,
    {
        items.iter().map(eval).sum()
    }
}

fn pairwise(function: &dyn CljFunction, a: &CljAtoms, b: &CljAtoms) -> CljEnergy {
    if a.is_empty() || b.is_empty() {
        return CljEnergy::ZERO;
    }
    function.calculate_between(a.as_slice(), b.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::cutoff::CljCutoffFunction;
    use crate::core::forcefield::params::{CombiningRules, LjParameter, LjParameterDb};
    use crate::core::models::ids::{LjId, MolNum};
    use crate::core::models::molecule::Molecule;
    use nalgebra::Point3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    const TOLERANCE: f64 = 1e-9;

    /// Random placements can produce close contacts with large energies, so the
    /// tolerance is relative to the magnitude of the energies involved.
    fn close(a: f64, b: f64, scale: f64) -> bool {
        (a - b).abs() <= TOLERANCE * scale.abs().max(1.0)
    }

    fn magnitude(energies: &[CljEnergy]) -> f64 {
        energies.iter().map(|e| e.coulomb.abs() + e.lj.abs()).sum()
    }

    fn db() -> Arc<LjParameterDb> {
        let mut db = LjParameterDb::new();
        db.add("A", LjParameter::new(3.0, 0.1));
        db.add("B", LjParameter::new(3.5, 0.2));
        Arc::new(db)
    }

    fn function() -> CljCutoffFunction {
        CljCutoffFunction::new(db(), CombiningRules::Arithmetic)
            .with_cutoffs(8.0, 8.0)
            .unwrap()
    }

    fn random_atoms(rng: &mut StdRng, n: usize, extent: f64) -> CljAtoms {
        (0..n)
            .map(|i| {
                CljAtom::new(
                    Point3::new(
                        rng.r#gen::<f64>() * extent,
                        rng.r#gen::<f64>() * extent,
                        rng.r#gen::<f64>() * extent,
                    ),
                    rng.r#gen::<f64>() - 0.5,
                    LjId((i % 2) as u32),
                    MolNum((i / 3) as u32),
                    (i % 3) as u32,
                )
            })
            .collect()
    }

    fn random_molecule(rng: &mut StdRng, number: u32, extent: f64) -> Molecule {
        let mut molecule = Molecule::new(MolNum(number));
        for i in 0..3 {
            molecule.push_atom(
                Point3::new(
                    rng.r#gen::<f64>() * extent,
                    rng.r#gen::<f64>() * extent,
                    rng.r#gen::<f64>() * extent,
                ),
                rng.r#gen::<f64>() - 0.5,
                LjId(i % 2),
            );
        }
        molecule
    }

    #[test]
    fn boxed_energy_matches_direct_double_loop() {
        let mut rng = StdRng::seed_from_u64(7);
        let atoms = random_atoms(&mut rng, 90, 30.0);
        let function = function();

        let (boxes, _) = CljBoxes::from_atoms(&atoms, function.max_cutoff());
        let boxed = CljCalculator::sequential().calculate(&function, &boxes);
        let direct = function.calculate(atoms.as_slice());

        let scale = magnitude(&[direct]);
        assert!(close(boxed.coulomb, direct.coulomb, scale));
        assert!(close(boxed.lj, direct.lj, scale));
    }

    #[test]
    fn empty_boxes_give_exactly_zero() {
        let boxes = CljBoxes::for_cutoff(8.0);
        assert_eq!(CljCalculator::default().calculate(&function(), &boxes), CljEnergy::ZERO);
        assert_eq!(
            CljCalculator::default().calculate_between(&function(), &boxes, &boxes),
            CljEnergy::ZERO
        );
    }

    #[test]
    fn calculate_between_matches_direct_cross_loop() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = random_atoms(&mut rng, 30, 25.0);
        // Shift molecule numbers so the two sets never share a molecule.
        let b: CljAtoms = random_atoms(&mut rng, 30, 25.0)
            .iter()
            .map(|atom| CljAtom {
                molecule: MolNum(atom.molecule.0 + 1000),
                ..*atom
            })
            .collect();
        let function = function();

        let (boxes_a, _) = CljBoxes::from_atoms(&a, 8.0);
        let (boxes_b, _) = CljBoxes::from_atoms(&b, 8.0);
        let boxed = CljCalculator::sequential().calculate_between(&function, &boxes_a, &boxes_b);
        let direct = function.calculate_between(a.as_slice(), b.as_slice());
        assert!(close(boxed.total(), direct.total(), magnitude(&[direct])));
    }

    #[test]
    fn delta_matches_difference_of_full_energies() {
        let mut rng = StdRng::seed_from_u64(3);
        let function = function();
        let calculator = CljCalculator::sequential();
        let mut group = CljGroup::new(db(), function.max_cutoff());
        for number in 0..25 {
            group.add(&random_molecule(&mut rng, number, 25.0)).unwrap();
        }
        let before = calculator.calculate(&function, group.boxes());

        group.update(&random_molecule(&mut rng, 4, 25.0)).unwrap();
        group.update(&random_molecule(&mut rng, 17, 25.0)).unwrap();
        let delta = calculator.delta(&function, &group);

        group.accept().unwrap();
        let after = calculator.calculate(&function, group.boxes());
        let scale = magnitude(&[before, after]);
        assert!(close((after - before).coulomb, delta.coulomb, scale));
        assert!(close((after - before).lj, delta.lj, scale));
    }

    #[test]
    fn delta_between_matches_difference_of_full_energies() {
        let mut rng = StdRng::seed_from_u64(5);
        let function = function();
        let calculator = CljCalculator::sequential();
        let mut a = CljGroup::new(db(), 8.0);
        let mut b = CljGroup::new(db(), 8.0);
        for number in 0..12 {
            a.add(&random_molecule(&mut rng, number, 20.0)).unwrap();
            b.add(&random_molecule(&mut rng, 100 + number, 20.0)).unwrap();
        }
        let before = calculator.calculate_between(&function, a.boxes(), b.boxes());

        a.update(&random_molecule(&mut rng, 3, 20.0)).unwrap();
        b.update(&random_molecule(&mut rng, 105, 20.0)).unwrap();
        b.update(&random_molecule(&mut rng, 110, 20.0)).unwrap();
        let delta = calculator.delta_between(&function, &a, &b);

        a.accept().unwrap();
        b.accept().unwrap();
        let after = calculator.calculate_between(&function, a.boxes(), b.boxes());
        assert!(close((after - before).total(), delta.total(), magnitude(&[before, after])));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn reproducible_parallel_sum_is_bit_identical_for_any_pool_size() {
        let mut rng = StdRng::seed_from_u64(42);
        let atoms = random_atoms(&mut rng, 400, 40.0);
        let function = function();
        let (boxes, _) = CljBoxes::from_atoms(&atoms, 8.0);

        let sequential = CljCalculator::sequential().calculate(&function, &boxes);
        for threads in [1, 2, 3, 8] {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            let parallel = pool.install(|| CljCalculator::new(true, true).calculate(&function, &boxes));
            assert_eq!(parallel.coulomb.to_bits(), sequential.coulomb.to_bits());
            assert_eq!(parallel.lj.to_bits(), sequential.lj.to_bits());
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn non_reproducible_parallel_sum_agrees_within_rounding() {
        let mut rng = StdRng::seed_from_u64(43);
        let atoms = random_atoms(&mut rng, 200, 30.0);
        let function = function();
        let (boxes, _) = CljBoxes::from_atoms(&atoms, 8.0);

        let sequential = CljCalculator::sequential().calculate(&function, &boxes);
        let parallel = CljCalculator::new(true, false).calculate(&function, &boxes);
        assert!(close(parallel.total(), sequential.total(), magnitude(&[sequential])));
    }
}
