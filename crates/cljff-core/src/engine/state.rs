/// Validity of a forcefield's cached energy.
///
/// The forcefield owns exactly one of these and only changes it through the
/// transition methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyState {
    /// The cached energy matches the accepted molecules.
    Clean,
    /// The energy must be recomputed from scratch.
    #[default]
    DirtyFull,
    /// A pending change exists whose energy has not been computed yet.
    DirtyDelta,
    /// The energy includes a pending change that the boxes do not hold yet.
    NeedsAccepting,
}

impl EnergyState {
    pub fn needs_recalculation(self) -> bool {
        matches!(self, EnergyState::DirtyFull | EnergyState::DirtyDelta)
    }

    pub fn needs_accepting(self) -> bool {
        self == EnergyState::NeedsAccepting
    }

    /// Molecules added or removed, or the kernel, cutoff or space changed.
    pub fn on_structural_change(&mut self) {
        *self = EnergyState::DirtyFull;
    }

    /// A molecule was updated. A pending full recalculation absorbs the update.
    pub fn on_update(&mut self) {
        if *self != EnergyState::DirtyFull {
            *self = EnergyState::DirtyDelta;
        }
    }

    pub fn on_recalculated(&mut self) {
        *self = match *self {
            EnergyState::DirtyFull => EnergyState::Clean,
            EnergyState::DirtyDelta => EnergyState::NeedsAccepting,
            other => other,
        };
    }

    /// Pending changes were moved into the boxes.
    ///
    /// Accepting a change whose energy was never computed leaves the cache stale.
    pub fn on_accept(&mut self) {
        *self = match *self {
            EnergyState::NeedsAccepting => EnergyState::Clean,
            EnergyState::DirtyDelta => EnergyState::DirtyFull,
            other => other,
        };
    }

    /// Pending changes were dropped and the previous energy restored.
    pub fn on_reject(&mut self) {
        *self = match *self {
            EnergyState::NeedsAccepting | EnergyState::DirtyDelta => EnergyState::Clean,
            other => other,
        };
    }
}
