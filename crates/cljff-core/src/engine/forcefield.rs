use super::calculator::CljCalculator;
use super::config::CljConfig;
use super::error::CljError;
use super::group::CljGroup;
use super::state::EnergyState;
use crate::core::boxes::box_length_for;
use crate::core::forcefield::error::ConfigError;
use crate::core::forcefield::function::CljFunction;
use crate::core::forcefield::intra::CljIntraFunction;
use crate::core::forcefield::params::{CombiningRules, LjParameterDb};
use crate::core::forcefield::soft::SoftParameters;
use crate::core::forcefield::term::CljEnergy;
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::{Molecule, MoleculeView};
use crate::core::models::space::Space;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Cached energy of a forcefield together with the state that says whether it can be trusted.
#[derive(Debug, Clone, Default)]
struct EnergyCache {
    energy: CljEnergy,
    previous: CljEnergy,
    state: EnergyState,
}

impl EnergyCache {
    fn set_full(&mut self, energy: CljEnergy) {
        self.energy = energy;
        self.previous = energy;
        self.state.on_recalculated();
    }

    fn apply_delta(&mut self, delta: CljEnergy) {
        self.previous = self.energy;
        self.energy += delta;
        self.state.on_recalculated();
    }

    fn reject(&mut self) {
        if self.state.needs_accepting() {
            self.energy = self.previous;
        }
        self.state.on_reject();
    }
}

fn same_lj_params(a: &Arc<LjParameterDb>, b: &Arc<LjParameterDb>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

fn component_names(name: &str, energy: CljEnergy) -> Vec<(String, f64)> {
    vec![
        (format!("coulomb({name})"), energy.coulomb),
        (format!("lj({name})"), energy.lj),
    ]
}

/// The kernels of an [`InterFF`]. Replaced as a whole by the setters.
#[derive(Debug, Clone)]
struct Kernels {
    function: Box<dyn CljFunction>,
    intra: Option<CljIntraFunction>,
}

impl Kernels {
    fn check(&self) -> Result<(), ConfigError> {
        match &self.intra {
            Some(intra) if !same_lj_params(intra.lj_params(), self.function.lj_params()) => {
                Err(ConfigError::MismatchedLjParameters)
            }
            _ => Ok(()),
        }
    }

    fn intra_energy(&self, group: &CljGroup) -> CljEnergy {
        self.intra
            .as_ref()
            .map(|intra| group.intra_energy(intra))
            .unwrap_or_default()
    }

    fn intra_delta(&self, group: &CljGroup) -> CljEnergy {
        self.intra
            .as_ref()
            .map(|intra| group.intra_delta(intra))
            .unwrap_or_default()
    }
}

/// Non-bonded energy of one group of molecules with itself.
///
/// `InterFF` drives the accept/reject cycle of a Monte Carlo simulation: an
/// [`update`](InterFF::update) followed by [`energy`](InterFF::energy) only evaluates the
/// change caused by the moved molecules, [`accept`](InterFF::accept) makes the move
/// permanent and [`reject`](InterFF::reject) throws it away without touching the boxes.
#[derive(Debug, Clone)]
pub struct InterFF {
    name: String,
    kernels: Kernels,
    calculator: CljCalculator,
    group: CljGroup,
    cache: EnergyCache,
}

impl InterFF {
    pub fn new(name: impl Into<String>, function: Box<dyn CljFunction>) -> Self {
        let group = CljGroup::new(function.lj_params().clone(), function.max_cutoff());
        Self {
            name: name.into(),
            kernels: Kernels {
                function,
                intra: None,
            },
            calculator: CljCalculator::default(),
            group,
            cache: EnergyCache::default(),
        }
    }

    /// Builds a forcefield with the kernels and calculator settings of `config`.
    pub fn from_config(
        name: impl Into<String>,
        config: &CljConfig,
        lj_params: Arc<LjParameterDb>,
    ) -> Result<Self, CljError> {
        let function = config.build_function(lj_params.clone())?;
        let intra = config.build_intra_function(lj_params)?;
        let mut forcefield = Self::new(name, function);
        forcefield.kernels.intra = intra;
        forcefield.calculator = CljCalculator::new(config.parallel, config.reproducible);
        Ok(forcefield)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &dyn CljFunction {
        self.kernels.function.as_ref()
    }

    pub fn intra_function(&self) -> Option<&CljIntraFunction> {
        self.kernels.intra.as_ref()
    }

    pub fn calculator(&self) -> &CljCalculator {
        &self.calculator
    }

    pub fn group(&self) -> &CljGroup {
        &self.group
    }

    pub fn state(&self) -> EnergyState {
        self.cache.state
    }

    pub fn needs_accepting(&self) -> bool {
        self.cache.state.needs_accepting()
    }

    pub fn contains(&self, number: MolNum) -> bool {
        self.group.contains(number)
    }

    /// The newest version of a molecule, pending or accepted.
    pub fn molecule(&self, number: MolNum) -> Option<&Molecule> {
        self.group.current_molecule(number)
    }

    pub fn coulomb_cutoff(&self) -> f64 {
        self.kernels.function.coulomb_cutoff()
    }

    pub fn lj_cutoff(&self) -> f64 {
        self.kernels.function.lj_cutoff()
    }

    pub fn space(&self) -> &Space {
        self.kernels.function.space()
    }

    pub fn combining_rules(&self) -> CombiningRules {
        self.kernels.function.combining_rules()
    }

    pub fn soft_parameters(&self) -> Option<SoftParameters> {
        self.kernels.function.soft_parameters()
    }

    pub fn is_parallel(&self) -> bool {
        self.calculator.is_parallel()
    }

    pub fn is_reproducible(&self) -> bool {
        self.calculator.is_reproducible()
    }

    /// Adds a molecule. Pending changes are accepted first, but only once the
    /// molecule is known to be valid.
    pub fn add(&mut self, molecule: &(impl MoleculeView + ?Sized)) -> Result<(), CljError> {
        let atoms = self.group.prepare_add(molecule)?;
        self.accept()?;
        self.group.insert(molecule, atoms);
        self.cache.state.on_structural_change();
        Ok(())
    }

    /// Stages a new version of a molecule.
    ///
    /// A change whose energy has already been evaluated is accepted before the
    /// new one is recorded. A new version that fails to extract leaves the
    /// evaluated change pending.
    pub fn update(&mut self, molecule: &(impl MoleculeView + ?Sized)) -> Result<(), CljError> {
        if self.cache.state.needs_accepting() {
            self.group.stage(molecule)?;
            debug!("Implicitly accepting pending change of '{}'", self.name);
            self.accept()?;
        }
        self.group.update(molecule)?;
        self.cache.state.on_update();
        Ok(())
    }

    /// Removes a molecule and reports whether it was present.
    pub fn remove(&mut self, number: MolNum) -> Result<bool, CljError> {
        if !self.group.contains(number) {
            return Ok(false);
        }
        self.accept()?;
        let removed = self.group.remove(number)?;
        if removed {
            self.cache.state.on_structural_change();
        }
        Ok(removed)
    }

    /// The current energy, recalculated only if the cache is stale.
    pub fn energy(&mut self) -> Result<CljEnergy, CljError> {
        if self.cache.state.needs_recalculation() {
            self.recalculate_energy()
        } else {
            Ok(self.cache.energy)
        }
    }

    /// Brings the cached energy up to date.
    ///
    /// After a structural change the whole group is summed; otherwise only the
    /// energy change of the pending molecule updates is evaluated and the boxes
    /// are left untouched until [`accept`](Self::accept).
    pub fn recalculate_energy(&mut self) -> Result<CljEnergy, CljError> {
        match self.cache.state {
            EnergyState::DirtyFull => {
                self.group.accept()?;
                let energy = self
                    .calculator
                    .calculate(self.kernels.function.as_ref(), self.group.boxes())
                    + self.kernels.intra_energy(&self.group);
                self.group.mark_calculated();
                self.cache.set_full(energy);
                info!(
                    "Full recalculation of '{}': coulomb {:.6}, lj {:.6}",
                    self.name, energy.coulomb, energy.lj
                );
            }
            EnergyState::DirtyDelta => {
                let delta = self
                    .calculator
                    .delta(self.kernels.function.as_ref(), &self.group)
                    + self.kernels.intra_delta(&self.group);
                self.cache.apply_delta(delta);
                debug!(
                    "Delta of '{}' over {} molecule(s): {:.6}",
                    self.name,
                    self.group.workspace().len(),
                    delta.total()
                );
            }
            EnergyState::Clean | EnergyState::NeedsAccepting => {}
        }
        Ok(self.cache.energy)
    }

    /// Moves all pending changes into the boxes.
    pub fn accept(&mut self) -> Result<(), CljError> {
        if self.group.needs_accepting() {
            self.group.accept()?;
        }
        self.cache.state.on_accept();
        Ok(())
    }

    /// Drops all pending changes and restores the energy from before them.
    pub fn reject(&mut self) {
        self.group.discard_pending();
        self.cache.reject();
    }

    /// Drops all pending changes and forces the next evaluation to start from scratch.
    pub fn must_recalculate_from_scratch(&mut self) {
        self.group.must_recalculate_from_scratch();
        self.cache.state.on_structural_change();
    }

    /// Energy components named `coulomb(<name>)` and `lj(<name>)`.
    pub fn components(&mut self) -> Result<Vec<(String, f64)>, CljError> {
        let energy = self.energy()?;
        Ok(component_names(&self.name, energy))
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.calculator.set_parallel(parallel);
    }

    pub fn set_reproducible(&mut self, reproducible: bool) {
        self.calculator.set_reproducible(reproducible);
    }

    pub fn set_cutoffs(&mut self, coulomb: f64, lj: f64) -> Result<(), CljError> {
        let mut kernels = self.kernels.clone();
        kernels.function.set_cutoffs(coulomb, lj)?;
        if let Some(intra) = kernels.intra.as_mut() {
            intra.set_cutoffs(coulomb, lj)?;
        }
        self.install(kernels)
    }

    pub fn set_space(&mut self, space: Space) -> Result<(), CljError> {
        let mut kernels = self.kernels.clone();
        kernels.function.set_space(space)?;
        if let Some(intra) = kernels.intra.as_mut() {
            intra.set_space(space)?;
        }
        self.install(kernels)
    }

    pub fn set_combining_rules(&mut self, rules: CombiningRules) -> Result<(), CljError> {
        let mut kernels = self.kernels.clone();
        kernels.function.set_combining_rules(rules);
        if let Some(intra) = kernels.intra.as_mut() {
            intra.set_combining_rules(rules);
        }
        self.install(kernels)
    }

    pub fn set_soft_parameters(&mut self, params: SoftParameters) -> Result<(), CljError> {
        let mut kernels = self.kernels.clone();
        kernels.function.set_soft_parameters(params)?;
        self.install(kernels)
    }

    /// Replaces the LJ parameter table of every kernel and of the group.
    pub fn set_lj_parameters(&mut self, lj_params: Arc<LjParameterDb>) -> Result<(), CljError> {
        let mut kernels = self.kernels.clone();
        kernels.function.set_lj_params(lj_params.clone());
        if let Some(intra) = kernels.intra.as_mut() {
            intra.set_lj_params(lj_params);
        }
        self.install(kernels)
    }

    pub fn set_function(&mut self, function: Box<dyn CljFunction>) -> Result<(), CljError> {
        self.install(Kernels {
            function,
            intra: self.kernels.intra.clone(),
        })
    }

    /// Sets or clears the intramolecular kernel.
    ///
    /// Fails with [`ConfigError::MismatchedLjParameters`] if the kernel uses another
    /// LJ parameter table than the intermolecular one.
    pub fn set_intra_function(&mut self, intra: Option<CljIntraFunction>) -> Result<(), CljError> {
        self.install(Kernels {
            function: self.kernels.function.clone(),
            intra,
        })
    }

    /// Swaps in fully validated kernels and invalidates the cached energy.
    fn install(&mut self, kernels: Kernels) -> Result<(), CljError> {
        kernels.check()?;
        let lj_params = kernels.function.lj_params();
        if !same_lj_params(lj_params, self.group.lj_params()) {
            let mut group = self.group.clone();
            group.set_lj_params(lj_params.clone())?;
            self.group = group;
        }
        self.accept()?;

        let cutoff = kernels.function.max_cutoff();
        if box_length_for(cutoff) != self.group.boxes().box_length() {
            self.group.rebox(cutoff);
        } else {
            self.group.must_recalculate_from_scratch();
        }
        debug!(
            "Installed {} kernel on '{}' (coulomb cutoff {}, lj cutoff {})",
            kernels.function.name(),
            self.name,
            kernels.function.coulomb_cutoff(),
            kernels.function.lj_cutoff()
        );
        self.kernels = kernels;
        self.cache.state.on_structural_change();
        Ok(())
    }
}

/// Which of the two groups of an [`InterGroupFF`] a molecule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupIndex {
    A,
    B,
}

impl GroupIndex {
    pub fn other(self) -> Self {
        match self {
            GroupIndex::A => GroupIndex::B,
            GroupIndex::B => GroupIndex::A,
        }
    }
}

impl fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupIndex::A => write!(f, "A"),
            GroupIndex::B => write!(f, "B"),
        }
    }
}

/// Non-bonded energy between two groups of molecules.
///
/// Only pairs with one atom in each group are counted. The accept/reject cycle
/// is the same as for [`InterFF`].
#[derive(Debug, Clone)]
pub struct InterGroupFF {
    name: String,
    function: Box<dyn CljFunction>,
    calculator: CljCalculator,
    groups: [CljGroup; 2],
    cache: EnergyCache,
}

impl InterGroupFF {
    pub fn new(name: impl Into<String>, function: Box<dyn CljFunction>) -> Self {
        let group = CljGroup::new(function.lj_params().clone(), function.max_cutoff());
        Self {
            name: name.into(),
            function,
            calculator: CljCalculator::default(),
            groups: [group.clone(), group],
            cache: EnergyCache::default(),
        }
    }

    pub fn from_config(
        name: impl Into<String>,
        config: &CljConfig,
        lj_params: Arc<LjParameterDb>,
    ) -> Result<Self, CljError> {
        let function = config.build_function(lj_params)?;
        let mut forcefield = Self::new(name, function);
        forcefield.calculator = CljCalculator::new(config.parallel, config.reproducible);
        Ok(forcefield)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &dyn CljFunction {
        self.function.as_ref()
    }

    pub fn calculator(&self) -> &CljCalculator {
        &self.calculator
    }

    pub fn group(&self, index: GroupIndex) -> &CljGroup {
        &self.groups[Self::slot(index)]
    }

    pub fn state(&self) -> EnergyState {
        self.cache.state
    }

    pub fn needs_accepting(&self) -> bool {
        self.cache.state.needs_accepting()
    }

    /// The group holding a molecule, if any.
    pub fn group_of(&self, number: MolNum) -> Option<GroupIndex> {
        [GroupIndex::A, GroupIndex::B]
            .into_iter()
            .find(|&index| self.group(index).contains(number))
    }

    pub fn molecule(&self, number: MolNum) -> Option<&Molecule> {
        self.group_of(number)
            .and_then(|index| self.group(index).current_molecule(number))
    }

    pub fn coulomb_cutoff(&self) -> f64 {
        self.function.coulomb_cutoff()
    }

    pub fn lj_cutoff(&self) -> f64 {
        self.function.lj_cutoff()
    }

    pub fn space(&self) -> &Space {
        self.function.space()
    }

    pub fn combining_rules(&self) -> CombiningRules {
        self.function.combining_rules()
    }

    pub fn soft_parameters(&self) -> Option<SoftParameters> {
        self.function.soft_parameters()
    }

    pub fn is_parallel(&self) -> bool {
        self.calculator.is_parallel()
    }

    pub fn is_reproducible(&self) -> bool {
        self.calculator.is_reproducible()
    }

    fn slot(index: GroupIndex) -> usize {
        match index {
            GroupIndex::A => 0,
            GroupIndex::B => 1,
        }
    }

    fn group_mut(&mut self, index: GroupIndex) -> &mut CljGroup {
        &mut self.groups[Self::slot(index)]
    }

    fn check_not_in(&self, index: GroupIndex, number: MolNum) -> Result<(), CljError> {
        if self.group(index.other()).contains(number) {
            Err(CljError::MoleculeInOtherGroup(number))
        } else {
            Ok(())
        }
    }

    pub fn add(
        &mut self,
        index: GroupIndex,
        molecule: &(impl MoleculeView + ?Sized),
    ) -> Result<(), CljError> {
        self.check_not_in(index, molecule.number())?;
        let atoms = self.group(index).prepare_add(molecule)?;
        self.accept()?;
        self.group_mut(index).insert(molecule, atoms);
        self.cache.state.on_structural_change();
        Ok(())
    }

    pub fn update(
        &mut self,
        index: GroupIndex,
        molecule: &(impl MoleculeView + ?Sized),
    ) -> Result<(), CljError> {
        self.check_not_in(index, molecule.number())?;
        if self.cache.state.needs_accepting() {
            self.group(index).stage(molecule)?;
            debug!("Implicitly accepting pending change of '{}'", self.name);
            self.accept()?;
        }
        self.group_mut(index).update(molecule)?;
        self.cache.state.on_update();
        Ok(())
    }

    pub fn remove(&mut self, index: GroupIndex, number: MolNum) -> Result<bool, CljError> {
        if !self.group(index).contains(number) {
            return Ok(false);
        }
        self.accept()?;
        let removed = self.group_mut(index).remove(number)?;
        if removed {
            self.cache.state.on_structural_change();
        }
        Ok(removed)
    }

    pub fn energy(&mut self) -> Result<CljEnergy, CljError> {
        if self.cache.state.needs_recalculation() {
            self.recalculate_energy()
        } else {
            Ok(self.cache.energy)
        }
    }

    pub fn recalculate_energy(&mut self) -> Result<CljEnergy, CljError> {
        match self.cache.state {
            EnergyState::DirtyFull => {
                self.accept_groups()?;
                let [a, b] = &mut self.groups;
                let energy =
                    self.calculator
                        .calculate_between(self.function.as_ref(), a.boxes(), b.boxes());
                a.mark_calculated();
                b.mark_calculated();
                self.cache.set_full(energy);
                info!(
                    "Full recalculation of '{}': coulomb {:.6}, lj {:.6}",
                    self.name, energy.coulomb, energy.lj
                );
            }
            EnergyState::DirtyDelta => {
                let [a, b] = &self.groups;
                let delta = self.calculator.delta_between(self.function.as_ref(), a, b);
                self.cache.apply_delta(delta);
                debug!("Delta of '{}': {:.6}", self.name, delta.total());
            }
            EnergyState::Clean | EnergyState::NeedsAccepting => {}
        }
        Ok(self.cache.energy)
    }

    fn accept_groups(&mut self) -> Result<(), CljError> {
        for group in &mut self.groups {
            if group.needs_accepting() {
                group.accept()?;
            }
        }
        Ok(())
    }

    pub fn accept(&mut self) -> Result<(), CljError> {
        self.accept_groups()?;
        self.cache.state.on_accept();
        Ok(())
    }

    pub fn reject(&mut self) {
        for group in &mut self.groups {
            group.discard_pending();
        }
        self.cache.reject();
    }

    pub fn must_recalculate_from_scratch(&mut self) {
        for group in &mut self.groups {
            group.must_recalculate_from_scratch();
        }
        self.cache.state.on_structural_change();
    }

    pub fn components(&mut self) -> Result<Vec<(String, f64)>, CljError> {
        let energy = self.energy()?;
        Ok(component_names(&self.name, energy))
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.calculator.set_parallel(parallel);
    }

    pub fn set_reproducible(&mut self, reproducible: bool) {
        self.calculator.set_reproducible(reproducible);
    }

    pub fn set_cutoffs(&mut self, coulomb: f64, lj: f64) -> Result<(), CljError> {
        let mut function = self.function.box_clone();
        function.set_cutoffs(coulomb, lj)?;
        self.install(function)
    }

    pub fn set_space(&mut self, space: Space) -> Result<(), CljError> {
        let mut function = self.function.box_clone();
        function.set_space(space)?;
        self.install(function)
    }

    pub fn set_combining_rules(&mut self, rules: CombiningRules) -> Result<(), CljError> {
        let mut function = self.function.box_clone();
        function.set_combining_rules(rules);
        self.install(function)
    }

    pub fn set_soft_parameters(&mut self, params: SoftParameters) -> Result<(), CljError> {
        let mut function = self.function.box_clone();
        function.set_soft_parameters(params)?;
        self.install(function)
    }

    pub fn set_lj_parameters(&mut self, lj_params: Arc<LjParameterDb>) -> Result<(), CljError> {
        let mut function = self.function.box_clone();
        function.set_lj_params(lj_params);
        self.install(function)
    }

    pub fn set_function(&mut self, function: Box<dyn CljFunction>) -> Result<(), CljError> {
        self.install(function)
    }

    fn install(&mut self, function: Box<dyn CljFunction>) -> Result<(), CljError> {
        let lj_params = function.lj_params();
        if !same_lj_params(lj_params, self.groups[0].lj_params()) {
            let mut groups = self.groups.clone();
            for group in &mut groups {
                group.set_lj_params(lj_params.clone())?;
            }
            self.groups = groups;
        }
        self.accept()?;

        let cutoff = function.max_cutoff();
        let rebox = box_length_for(cutoff) != self.groups[0].boxes().box_length();
        for group in &mut self.groups {
            if rebox {
                group.rebox(cutoff);
            } else {
                group.must_recalculate_from_scratch();
            }
        }
        debug!("Installed {} kernel on '{}'", function.name(), self.name);
        self.function = function;
        self.cache.state.on_structural_change();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::cutoff::CljCutoffFunction;
    use crate::core::forcefield::params::LjParameter;
    use crate::core::forcefield::potentials::COULOMB_CONSTANT;
    use crate::core::forcefield::soft::CljSoftFunction;
    use crate::core::models::ids::LjId;
    use crate::core::models::molecule::Connectivity;
    use crate::core::models::space::PeriodicBox;
    use nalgebra::{Point3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f64 = 1e-6;

    fn close(a: CljEnergy, b: CljEnergy) -> bool {
        let scale = (a.coulomb.abs() + a.lj.abs()).max(1.0);
        (a.coulomb - b.coulomb).abs() <= TOLERANCE * scale && (a.lj - b.lj).abs() <= TOLERANCE * scale
    }

    fn db() -> Arc<LjParameterDb> {
        let mut db = LjParameterDb::new();
        db.add("A", LjParameter::new(3.0, 0.1));
        db.add("B", LjParameter::new(3.4, 0.15));
        Arc::new(db)
    }

    fn cutoff_function(cutoff: f64) -> Box<dyn CljFunction> {
        Box::new(
            CljCutoffFunction::new(db(), CombiningRules::Arithmetic)
                .with_cutoffs(cutoff, cutoff)
                .unwrap(),
        )
    }

    fn forcefield() -> InterFF {
        let mut ff = InterFF::new("solvent", cutoff_function(10.0));
        ff.set_parallel(false);
        ff
    }

    fn triatomic(number: u32, centre: Point3<f64>) -> Molecule {
        Molecule::new(MolNum(number))
            .with_atom(centre, -0.8, LjId(0))
            .with_atom(centre + Vector3::new(1.0, 0.0, 0.0), 0.4, LjId(1))
            .with_atom(centre + Vector3::new(0.0, 1.0, 0.0), 0.4, LjId(1))
            .with_connectivity(Connectivity::from_bonds(3, [(0, 1), (0, 2)]).unwrap())
    }

    fn random_point(rng: &mut StdRng, extent: f64) -> Point3<f64> {
        Point3::new(
            rng.r#gen::<f64>() * extent,
            rng.r#gen::<f64>() * extent,
            rng.r#gen::<f64>() * extent,
        )
    }

    /// Molecules on a loose lattice, so random moves rarely produce overlaps.
    fn populate(ff: &mut InterFF, n: u32) -> Vec<Molecule> {
        let molecules: Vec<Molecule> = (0..n)
            .map(|i| {
                let centre = Point3::new(
                    (i % 4) as f64 * 4.5,
                    ((i / 4) % 4) as f64 * 4.5,
                    (i / 16) as f64 * 4.5,
                );
                triatomic(i, centre)
            })
            .collect();
        for molecule in &molecules {
            ff.add(molecule).unwrap();
        }
        molecules
    }

    fn jiggle(rng: &mut StdRng, molecule: &Molecule) -> Molecule {
        let shift = Vector3::new(
            rng.r#gen::<f64>() - 0.5,
            rng.r#gen::<f64>() - 0.5,
            rng.r#gen::<f64>() - 0.5,
        );
        molecule.translated(&shift)
    }

    fn from_scratch(ff: &InterFF) -> CljEnergy {
        let mut fresh = ff.clone();
        fresh.must_recalculate_from_scratch();
        fresh.energy().unwrap()
    }

    #[test]
    fn two_atoms_in_vacuum_match_analytic_energy() {
        let mut ff = forcefield();
        let unit = 1.0 / COULOMB_CONSTANT.sqrt();
        ff.add(&Molecule::new(MolNum(1)).with_atom(Point3::origin(), unit, LjId(0)))
            .unwrap();
        let far = Molecule::new(MolNum(2)).with_atom(Point3::new(5.0, 0.0, 0.0), -unit, LjId(0));
        ff.add(&far).unwrap();

        let energy = ff.energy().unwrap();
        let expected_lj = 4.0 * 0.1 * (0.6_f64.powi(12) - 0.6_f64.powi(6));
        assert!((energy.coulomb + 0.2).abs() < 1e-12);
        assert!((energy.lj - expected_lj).abs() < 1e-12);

        ff.update(&far.translated(&Vector3::new(6.0, 0.0, 0.0))).unwrap();
        ff.accept().unwrap();
        let energy = ff.energy().unwrap();
        assert_eq!(energy, CljEnergy::ZERO);
    }

    #[test]
    fn empty_forcefield_has_exactly_zero_energy() {
        let mut ff = forcefield();
        assert_eq!(ff.recalculate_energy().unwrap(), CljEnergy::ZERO);
        assert_eq!(ff.state(), EnergyState::Clean);
        assert!(ff.group().boxes().is_empty());
    }

    #[test]
    fn incremental_energy_tracks_full_recalculation() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut ff = forcefield();
        let mut molecules = populate(&mut ff, 20);
        ff.energy().unwrap();

        for step in 0..60 {
            let i = rng.gen_range(0..molecules.len());
            let moved = jiggle(&mut rng, &molecules[i]);
            ff.update(&moved).unwrap();
            let energy = ff.energy().unwrap();
            assert_eq!(ff.state(), EnergyState::NeedsAccepting);

            if rng.gen_bool(0.5) {
                ff.accept().unwrap();
                molecules[i] = moved;
                assert!(close(energy, from_scratch(&ff)), "diverged at step {step}");
            } else {
                ff.reject();
            }
            assert_eq!(ff.state(), EnergyState::Clean);
        }
        assert!(close(ff.energy().unwrap(), from_scratch(&ff)));
    }

    #[test]
    fn reject_is_free() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut ff = forcefield();
        let molecules = populate(&mut ff, 8);
        let before = ff.energy().unwrap();
        let boxes = ff.group().boxes().clone();

        ff.update(&jiggle(&mut rng, &molecules[3])).unwrap();
        let after = ff.energy().unwrap();
        assert_ne!(after, before);

        ff.reject();
        assert_eq!(ff.energy().unwrap(), before);
        assert_eq!(ff.group().boxes(), &boxes);

        ff.update(&jiggle(&mut rng, &molecules[3])).unwrap();
        ff.energy().unwrap();
        ff.must_recalculate_from_scratch();
        assert!(close(ff.energy().unwrap(), before));
        assert_eq!(ff.molecule(MolNum(3)), Some(&molecules[3]));
    }

    #[test]
    fn update_after_evaluated_delta_accepts_it_implicitly() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut ff = forcefield();
        let molecules = populate(&mut ff, 6);
        ff.energy().unwrap();

        let first = jiggle(&mut rng, &molecules[1]);
        ff.update(&first).unwrap();
        ff.energy().unwrap();
        assert!(ff.needs_accepting());

        ff.update(&jiggle(&mut rng, &molecules[4])).unwrap();
        assert_eq!(ff.state(), EnergyState::DirtyDelta);
        assert_eq!(ff.group().molecule(MolNum(1)), Some(&first));
        let energy = ff.energy().unwrap();
        ff.accept().unwrap();
        assert!(close(energy, from_scratch(&ff)));
    }

    #[test]
    fn repeated_updates_of_one_molecule_merge() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut ff = forcefield();
        let molecules = populate(&mut ff, 6);
        ff.energy().unwrap();

        let once = jiggle(&mut rng, &molecules[2]);
        let twice = jiggle(&mut rng, &once);
        ff.update(&once).unwrap();
        ff.update(&twice).unwrap();
        assert_eq!(ff.group().workspace().len(), 1);

        let energy = ff.energy().unwrap();
        ff.accept().unwrap();
        assert_eq!(ff.molecule(MolNum(2)), Some(&twice));
        assert!(close(energy, from_scratch(&ff)));
    }

    #[test]
    fn failed_update_leaves_forcefield_unchanged() {
        let mut ff = forcefield();
        populate(&mut ff, 4);
        let energy = ff.energy().unwrap();
        let boxes = ff.group().boxes().clone();

        let wrong_size = Molecule::new(MolNum(1)).with_atom(Point3::origin(), 0.0, LjId(0));
        assert!(matches!(ff.update(&wrong_size), Err(CljError::Incompatible { .. })));
        let unknown = triatomic(99, Point3::origin());
        assert_eq!(ff.update(&unknown), Err(CljError::MoleculeNotFound(MolNum(99))));

        assert_eq!(ff.state(), EnergyState::Clean);
        assert_eq!(ff.energy().unwrap(), energy);
        assert_eq!(ff.group().boxes(), &boxes);
        assert!(!ff.group().needs_accepting());
    }

    fn point_charge(number: u32, x: f64, lj_id: LjId) -> Molecule {
        Molecule::new(MolNum(number)).with_atom(Point3::new(x, 0.0, 0.0), 1.0, lj_id)
    }

    #[test]
    fn failed_mutation_keeps_evaluated_change_rejectable() {
        let mut ff = forcefield();
        ff.add(&point_charge(1, 0.0, LjId(0))).unwrap();
        ff.add(&point_charge(2, 5.0, LjId(0))).unwrap();
        let before = ff.energy().unwrap();
        let boxes = ff.group().boxes().clone();

        ff.update(&point_charge(2, 4.0, LjId(0))).unwrap();
        let moved = ff.energy().unwrap();
        assert_ne!(moved, before);
        assert!(ff.needs_accepting());

        assert!(matches!(
            ff.update(&point_charge(1, 0.0, LjId(7))),
            Err(CljError::MissingLjParameter { .. })
        ));
        assert_eq!(
            ff.update(&point_charge(9, 0.0, LjId(0))),
            Err(CljError::MoleculeNotFound(MolNum(9)))
        );
        assert_eq!(
            ff.add(&point_charge(2, 9.0, LjId(0))),
            Err(CljError::DuplicateMolecule(MolNum(2)))
        );
        assert!(matches!(
            ff.add(&point_charge(3, 9.0, LjId(7))),
            Err(CljError::MissingLjParameter { .. })
        ));
        assert_eq!(ff.remove(MolNum(42)), Ok(false));

        assert_eq!(ff.state(), EnergyState::NeedsAccepting);
        assert_eq!(ff.energy().unwrap(), moved);
        assert_eq!(ff.group().boxes(), &boxes);

        ff.reject();
        assert_eq!(ff.state(), EnergyState::Clean);
        assert_eq!(ff.energy().unwrap(), before);
        assert_eq!(ff.molecule(MolNum(2)), Some(&point_charge(2, 5.0, LjId(0))));
        assert_eq!(ff.group().boxes(), &boxes);
    }

    #[test]
    fn add_and_remove_force_full_recalculation() {
        let mut ff = forcefield();
        populate(&mut ff, 4);
        ff.energy().unwrap();

        ff.add(&triatomic(10, Point3::new(2.0, 2.0, 2.0))).unwrap();
        assert_eq!(ff.state(), EnergyState::DirtyFull);
        assert_eq!(
            ff.add(&triatomic(10, Point3::origin())),
            Err(CljError::DuplicateMolecule(MolNum(10)))
        );
        let with = ff.energy().unwrap();

        assert_eq!(ff.remove(MolNum(10)), Ok(true));
        assert_eq!(ff.remove(MolNum(10)), Ok(false));
        let without = ff.energy().unwrap();
        assert_ne!(with, without);
        assert!(close(without, from_scratch(&ff)));
    }

    #[test]
    fn invalid_setters_leave_state_untouched() {
        let mut ff = forcefield();
        populate(&mut ff, 4);
        let energy = ff.energy().unwrap();

        assert!(matches!(
            ff.set_cutoffs(f64::NAN, 8.0),
            Err(CljError::Config { .. })
        ));
        assert!(matches!(
            ff.set_soft_parameters(SoftParameters::new(0.5, 1.5, 1.0)),
            Err(CljError::Config {
                source: ConfigError::Unsupported { .. }
            })
        ));
        let small_box = Space::Periodic(PeriodicBox::cubic(12.0).unwrap());
        assert!(matches!(ff.set_space(small_box), Err(CljError::Config { .. })));

        assert_eq!(ff.coulomb_cutoff(), 10.0);
        assert_eq!(ff.space(), &Space::Vacuum);
        assert_eq!(ff.state(), EnergyState::Clean);
        assert_eq!(ff.energy().unwrap(), energy);
    }

    #[test]
    fn changing_cutoffs_reboxes_and_recalculates() {
        let mut ff = forcefield();
        populate(&mut ff, 16);
        let long = ff.energy().unwrap();

        ff.set_cutoffs(4.0, 4.0).unwrap();
        assert_eq!(ff.state(), EnergyState::DirtyFull);
        assert_eq!(ff.group().boxes().box_length(), 4.0);
        let short = ff.energy().unwrap();
        assert_ne!(long, short);

        let mut reference = InterFF::new("reference", cutoff_function(4.0));
        reference.set_parallel(false);
        populate(&mut reference, 16);
        assert!(close(short, reference.energy().unwrap()));
    }

    #[test]
    fn soft_kernel_accepts_soft_parameters() {
        let soft = CljSoftFunction::new(db(), CombiningRules::Arithmetic)
            .with_cutoffs(10.0, 10.0)
            .unwrap();
        let mut ff = InterFF::new("soft", Box::new(soft));
        ff.set_parallel(false);
        populate(&mut ff, 6);
        let hard = ff.energy().unwrap();

        ff.set_soft_parameters(SoftParameters::new(0.3, 1.5, 1.0)).unwrap();
        assert_eq!(ff.soft_parameters().map(|p| p.alpha), Some(0.3));
        let softened = ff.energy().unwrap();
        assert_ne!(hard, softened);
    }

    #[test]
    fn intramolecular_term_is_included_and_updated_incrementally() {
        let mut rng = StdRng::seed_from_u64(33);
        let mut ff = forcefield();
        let intra = CljIntraFunction::new(db(), CombiningRules::Arithmetic)
            .with_cutoffs(10.0, 10.0)
            .unwrap();
        ff.set_intra_function(Some(intra.clone())).unwrap();

        let chain = Molecule::new(MolNum(0))
            .with_atom(Point3::new(0.0, 0.0, 0.0), 0.3, LjId(0))
            .with_atom(Point3::new(1.5, 0.0, 0.0), -0.3, LjId(1))
            .with_atom(Point3::new(3.0, 0.0, 0.0), 0.3, LjId(0))
            .with_atom(Point3::new(4.5, 0.5, 0.0), -0.3, LjId(1))
            .with_atom(Point3::new(6.0, 1.0, 0.0), 0.2, LjId(0))
            .with_connectivity(Connectivity::from_bonds(5, [(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap());
        ff.add(&chain).unwrap();
        let only_intra = ff.energy().unwrap();
        assert!(only_intra.total() != 0.0);
        assert!(close(only_intra, ff.group().intra_energy(&intra)));

        let mut bent = chain.clone();
        bent.coordinates_mut()[4] = Point3::new(5.0, 2.5, 1.0);
        ff.update(&bent).unwrap();
        let energy = ff.energy().unwrap();
        ff.accept().unwrap();
        assert!(close(energy, from_scratch(&ff)));

        let other = triatomic(1, random_point(&mut rng, 3.0) + Vector3::new(0.0, 6.0, 0.0));
        ff.add(&other).unwrap();
        assert!(close(ff.energy().unwrap(), from_scratch(&ff)));
    }

    #[test]
    fn intra_function_with_other_lj_table_is_rejected() {
        let mut ff = forcefield();
        let foreign = CljIntraFunction::new(Arc::new(LjParameterDb::new()), CombiningRules::Arithmetic);
        assert_eq!(
            ff.set_intra_function(Some(foreign)),
            Err(CljError::Config {
                source: ConfigError::MismatchedLjParameters
            })
        );
        assert!(ff.intra_function().is_none());
    }

    #[test]
    fn intra_kernel_can_be_installed_as_the_main_function() {
        let chain = |number: u32, y: f64| {
            Molecule::new(MolNum(number))
                .with_atom(Point3::new(0.0, y, 0.0), 0.3, LjId(0))
                .with_atom(Point3::new(1.5, y, 0.0), -0.3, LjId(1))
                .with_atom(Point3::new(3.0, y, 0.0), 0.3, LjId(0))
                .with_atom(Point3::new(4.5, y + 0.5, 0.0), -0.3, LjId(1))
                .with_atom(Point3::new(6.0, y + 1.0, 0.0), 0.2, LjId(0))
                .with_connectivity(
                    Connectivity::from_bonds(5, [(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap(),
                )
        };
        let mut ff = forcefield();
        for (i, y) in [0.0, 8.0, 16.0].into_iter().enumerate() {
            ff.add(&chain(i as u32, y)).unwrap();
        }
        let mut intra = CljIntraFunction::new(db(), CombiningRules::Arithmetic)
            .with_cutoffs(10.0, 10.0)
            .unwrap();
        ff.group().register_exclusions(&mut intra);
        ff.set_function(Box::new(intra.clone())).unwrap();
        assert_eq!(ff.function().name(), "intra");

        let full = ff.energy().unwrap();
        assert!(full.total() != 0.0);
        assert!(close(full, ff.group().intra_energy(&intra)));

        let mut bent = chain(1, 8.0);
        bent.coordinates_mut()[4] = Point3::new(5.0, 10.5, 1.0);
        ff.update(&bent).unwrap();
        let energy = ff.energy().unwrap();
        ff.accept().unwrap();
        assert_ne!(energy, full);
        assert!(close(energy, ff.group().intra_energy(&intra)));
        assert!(close(energy, from_scratch(&ff)));
    }

    #[test]
    fn periodic_incremental_energy_tracks_full_recalculation() {
        let mut rng = StdRng::seed_from_u64(77);
        let mut ff = InterFF::new("periodic", cutoff_function(6.0));
        ff.set_parallel(false);
        ff.set_space(Space::Periodic(PeriodicBox::cubic(18.0).unwrap()))
            .unwrap();
        let mut molecules = populate(&mut ff, 16);
        ff.energy().unwrap();

        for _ in 0..20 {
            let i = rng.gen_range(0..molecules.len());
            let moved = jiggle(&mut rng, &molecules[i]);
            ff.update(&moved).unwrap();
            ff.energy().unwrap();
            ff.accept().unwrap();
            molecules[i] = moved;
        }
        assert!(close(ff.energy().unwrap(), from_scratch(&ff)));
    }

    #[test]
    fn components_are_named_after_the_forcefield() {
        let mut ff = forcefield();
        populate(&mut ff, 3);
        let energy = ff.energy().unwrap();
        let components = ff.components().unwrap();
        assert_eq!(
            components,
            vec![
                ("coulomb(solvent)".to_string(), energy.coulomb),
                ("lj(solvent)".to_string(), energy.lj),
            ]
        );
    }

    fn group_forcefield() -> InterGroupFF {
        let mut ff = InterGroupFF::new("solute:solvent", cutoff_function(10.0));
        ff.set_parallel(false);
        ff
    }

    fn group_from_scratch(ff: &InterGroupFF) -> CljEnergy {
        let mut fresh = ff.clone();
        fresh.must_recalculate_from_scratch();
        fresh.energy().unwrap()
    }

    #[test]
    fn molecule_may_belong_to_only_one_group() {
        let mut ff = group_forcefield();
        ff.add(GroupIndex::A, &triatomic(1, Point3::origin())).unwrap();
        assert_eq!(
            ff.add(GroupIndex::B, &triatomic(1, Point3::origin())),
            Err(CljError::MoleculeInOtherGroup(MolNum(1)))
        );
        assert_eq!(
            ff.update(GroupIndex::B, &triatomic(1, Point3::origin())),
            Err(CljError::MoleculeInOtherGroup(MolNum(1)))
        );
        assert_eq!(ff.group_of(MolNum(1)), Some(GroupIndex::A));
    }

    #[test]
    fn failed_group_mutation_keeps_evaluated_change_rejectable() {
        let mut ff = group_forcefield();
        ff.add(GroupIndex::A, &point_charge(1, 0.0, LjId(0))).unwrap();
        ff.add(GroupIndex::B, &point_charge(2, 5.0, LjId(0))).unwrap();
        let before = ff.energy().unwrap();

        ff.update(GroupIndex::B, &point_charge(2, 4.0, LjId(0))).unwrap();
        let moved = ff.energy().unwrap();
        assert!(ff.needs_accepting());

        assert!(matches!(
            ff.update(GroupIndex::A, &point_charge(1, 0.0, LjId(7))),
            Err(CljError::MissingLjParameter { .. })
        ));
        assert_eq!(
            ff.add(GroupIndex::A, &point_charge(1, 3.0, LjId(0))),
            Err(CljError::DuplicateMolecule(MolNum(1)))
        );
        assert!(matches!(
            ff.add(GroupIndex::A, &point_charge(3, 3.0, LjId(7))),
            Err(CljError::MissingLjParameter { .. })
        ));
        assert_eq!(ff.remove(GroupIndex::A, MolNum(2)), Ok(false));
        assert_eq!(ff.energy().unwrap(), moved);

        ff.reject();
        assert_eq!(ff.energy().unwrap(), before);
        assert_eq!(
            ff.group(GroupIndex::B).molecule(MolNum(2)),
            Some(&point_charge(2, 5.0, LjId(0)))
        );
        assert!(close(ff.energy().unwrap(), group_from_scratch(&ff)));
    }

    #[test]
    fn group_energy_counts_only_cross_pairs() {
        let mut ff = group_forcefield();
        ff.add(GroupIndex::A, &triatomic(1, Point3::origin())).unwrap();
        ff.add(GroupIndex::A, &triatomic(2, Point3::new(3.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(ff.energy().unwrap(), CljEnergy::ZERO);

        ff.add(GroupIndex::B, &triatomic(3, Point3::new(0.0, 4.0, 0.0)))
            .unwrap();
        let energy = ff.energy().unwrap();
        let a = ff.group(GroupIndex::A).atoms();
        let b = ff.group(GroupIndex::B).atoms();
        let direct = ff.function().calculate_between(a.as_slice(), b.as_slice());
        assert!(close(energy, direct));
    }

    #[test]
    fn group_incremental_energy_tracks_full_recalculation() {
        let mut rng = StdRng::seed_from_u64(101);
        let mut ff = group_forcefield();
        let mut molecules = Vec::new();
        for i in 0..12u32 {
            let index = if i % 3 == 0 { GroupIndex::A } else { GroupIndex::B };
            let molecule = triatomic(i, Point3::new((i % 4) as f64 * 4.5, (i / 4) as f64 * 4.5, 0.0));
            ff.add(index, &molecule).unwrap();
            molecules.push((index, molecule));
        }
        let start = ff.energy().unwrap();

        for _ in 0..30 {
            let i = rng.gen_range(0..molecules.len());
            let (index, ref molecule) = molecules[i];
            let moved = jiggle(&mut rng, molecule);
            ff.update(index, &moved).unwrap();
            let energy = ff.energy().unwrap();
            if rng.gen_bool(0.6) {
                ff.accept().unwrap();
                molecules[i].1 = moved;
                assert!(close(energy, group_from_scratch(&ff)));
            } else {
                ff.reject();
            }
        }

        ff.reject();
        for (index, molecule) in &molecules {
            assert_eq!(ff.group(*index).molecule(molecule.number()), Some(molecule));
        }
        assert!(start.is_finite());
        assert!(close(ff.energy().unwrap(), group_from_scratch(&ff)));
    }
}
