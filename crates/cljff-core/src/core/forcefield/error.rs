use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Cutoff distance must be a number, got {0}")]
    InvalidCutoff(f64),

    #[error("Unknown combining rule '{0}' (expected 'arithmetic' or 'geometric')")]
    UnknownCombiningRule(String),

    #[error("Periodic box dimensions must be positive and finite, got {0:?}")]
    InvalidBox([f64; 3]),

    #[error("Cutoff {cutoff} exceeds half the shortest periodic box edge ({half_edge})")]
    CutoffExceedsBox { cutoff: f64, half_edge: f64 },

    #[error("Invalid soft-core parameters: {0}")]
    SoftCore(String),

    #[error("Reaction-field dielectric must be positive, got {0}")]
    InvalidDielectric(f64),

    #[error("The {function} kernel does not support setting the {parameter}")]
    Unsupported {
        function: &'static str,
        parameter: &'static str,
    },

    #[error("The intramolecular kernel uses a different LJ parameter set than the forcefield")]
    MismatchedLjParameters,
}
