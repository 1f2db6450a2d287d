pub const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

const MIN_DISTANCE: f64 = 1e-6;
const CLASH_ENERGY: f64 = 1e10;

// All charges below are reduced charges, so the Coulomb constant is already folded in.

#[inline]
pub fn coulomb(dist: f64, qq: f64) -> f64 {
    if qq == 0.0 {
        return 0.0;
    }
    if dist < MIN_DISTANCE {
        return qq.signum() * CLASH_ENERGY;
    }
    qq / dist
}

/// Force-shifted Coulomb: both energy and force vanish at `cutoff`.
#[inline]
pub fn coulomb_force_shifted(dist: f64, qq: f64, cutoff: f64) -> f64 {
    if qq == 0.0 {
        return 0.0;
    }
    if dist < MIN_DISTANCE {
        return qq.signum() * CLASH_ENERGY;
    }
    qq * (1.0 / dist - 1.0 / cutoff + (dist / cutoff - 1.0) / cutoff)
}

/// Reaction-field Coulomb with a continuum of the given dielectric beyond `cutoff`.
#[inline]
pub fn coulomb_reaction_field(dist: f64, qq: f64, cutoff: f64, dielectric: f64) -> f64 {
    if qq == 0.0 {
        return 0.0;
    }
    if dist < MIN_DISTANCE {
        return qq.signum() * CLASH_ENERGY;
    }
    let ratio = (dielectric - 1.0) / (2.0 * dielectric + 1.0);
    let k_rf = ratio / (cutoff * cutoff * cutoff);
    let c_rf = (1.0 + ratio) / cutoff;
    qq * (1.0 / dist + k_rf * dist * dist - c_rf)
}

#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if epsilon == 0.0 {
        return 0.0;
    }
    if dist < MIN_DISTANCE {
        return CLASH_ENERGY;
    }
    let sr = sigma / dist;
    let sr6 = sr.powi(6);
    let sr12 = sr6 * sr6;
    4.0 * epsilon * (sr12 - sr6)
}

/// Soft-core Coulomb term: `(1 - alpha)^n * qq / sqrt(alpha + r^2)`.
#[inline]
pub fn soft_coulomb(dist: f64, qq: f64, alpha: f64, coulomb_power: f64) -> f64 {
    if qq == 0.0 {
        return 0.0;
    }
    let denom = (alpha + dist * dist).sqrt();
    if denom < MIN_DISTANCE {
        return qq.signum() * CLASH_ENERGY;
    }
    (1.0 - alpha).powf(coulomb_power) * qq / denom
}

/// Soft-core Lennard-Jones term with the distance replaced by
/// `r^2 + sigma^2 * alpha * shift_delta`.
#[inline]
pub fn soft_lennard_jones(dist: f64, sigma: f64, epsilon: f64, alpha: f64, shift_delta: f64) -> f64 {
    if epsilon == 0.0 {
        return 0.0;
    }
    let sigma2 = sigma * sigma;
    let denom = dist * dist + sigma2 * alpha * shift_delta;
    if denom < MIN_DISTANCE * MIN_DISTANCE {
        return CLASH_ENERGY;
    }
    let sig6_over_denom3 = (sigma2 / denom).powi(3);
    4.0 * epsilon * (sig6_over_denom3 * sig6_over_denom3 - sig6_over_denom3)
}
