use crate::cli::SystemArgs;
use crate::error::{CliError, Result};
use cljff::core::forcefield::cutoff::CoulombMethod;
use cljff::engine::config::{CljConfig, IntraConfig};
use std::str::FromStr;
use tracing::debug;

/// Loads the forcefield configuration and applies the command-line overrides on top.
pub fn resolve(args: &SystemArgs) -> Result<CljConfig> {
    let mut config = match &args.config {
        Some(path) => {
            debug!("Loading configuration from file: {:?}", path);
            CljConfig::load(path)?
        }
        None => CljConfig::default(),
    };

    if let Some(cutoff) = args.cutoff {
        config.coulomb_cutoff = cutoff;
        config.lj_cutoff = cutoff;
    }
    if let Some(rules) = &args.combining_rules {
        config.combining_rules = rules.parse()?;
    }
    if args.reproducible {
        config.reproducible = true;
    }
    apply_set_values(&mut config, &args.set_values)?;

    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value))
    })
}

fn apply_set_values(config: &mut CljConfig, set_values: &[String]) -> Result<()> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "coulomb_cutoff" => config.coulomb_cutoff = parse_value(key, value)?,
            "lj_cutoff" => config.lj_cutoff = parse_value(key, value)?,
            "combining_rules" => config.combining_rules = value.parse()?,
            "parallel" => config.parallel = parse_value(key, value)?,
            "reproducible" => config.reproducible = parse_value(key, value)?,
            "coulomb_method" => {
                config.coulomb_method = match value.trim() {
                    "truncated" => CoulombMethod::Truncated,
                    "force-shifted" => CoulombMethod::ForceShifted,
                    other => {
                        return Err(CliError::Config(format!(
                            "Unknown coulomb method '{}'. Use coulomb_method.dielectric=<FLOAT> for reaction-field.",
                            other
                        )));
                    }
                }
            }
            "coulomb_method.dielectric" => {
                config.coulomb_method = CoulombMethod::ReactionField {
                    dielectric: parse_value(key, value)?,
                }
            }
            "soft.alpha" => {
                config.soft.get_or_insert_with(Default::default).alpha = parse_value(key, value)?
            }
            "soft.shift_delta" => {
                config.soft.get_or_insert_with(Default::default).shift_delta =
                    parse_value(key, value)?
            }
            "soft.coulomb_power" => {
                config.soft.get_or_insert_with(Default::default).coulomb_power =
                    parse_value(key, value)?
            }
            "intramolecular.scale14_coulomb" => {
                config
                    .intramolecular
                    .get_or_insert_with(IntraConfig::default)
                    .scale14_coulomb = parse_value(key, value)?
            }
            "intramolecular.scale14_lj" => {
                config
                    .intramolecular
                    .get_or_insert_with(IntraConfig::default)
                    .scale14_lj = parse_value(key, value)?
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use cljff::core::forcefield::params::CombiningRules;
    use std::fs;
    use tempfile::tempdir;

    fn system_args(extra: &[&str]) -> SystemArgs {
        let mut argv = vec!["cljff", "energy", "-m", "molecules.csv", "-p", "lj.toml"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Energy(args) => args.system,
            Commands::Mc(args) => args.system,
        }
    }

    #[test]
    fn defaults_are_used_without_config_file() {
        let config = resolve(&system_args(&[])).unwrap();
        assert_eq!(config, CljConfig::default());
    }

    #[test]
    fn cli_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "coulomb_cutoff = 15.0\nlj_cutoff = 12.0\ncombining_rules = \"arithmetic\"\n",
        )
        .unwrap();

        let config = resolve(&system_args(&[
            "-c",
            path.to_str().unwrap(),
            "--cutoff",
            "9.0",
            "--combining-rules",
            "Geometric",
            "--reproducible",
        ]))
        .unwrap();
        assert_eq!((config.coulomb_cutoff, config.lj_cutoff), (9.0, 9.0));
        assert_eq!(config.combining_rules, CombiningRules::Geometric);
        assert!(config.reproducible);
    }

    #[test]
    fn set_values_reach_nested_sections() {
        let config = resolve(&system_args(&[
            "-S",
            "soft.alpha=0.4",
            "-S",
            "coulomb_method.dielectric=78.3",
            "-S",
            "intramolecular.scale14_lj=0.25",
            "-S",
            "lj_cutoff=8",
        ]))
        .unwrap();
        assert_eq!(config.soft.map(|s| s.alpha), Some(0.4));
        assert_eq!(
            config.coulomb_method,
            CoulombMethod::ReactionField { dielectric: 78.3 }
        );
        assert_eq!(config.intramolecular.map(|i| i.scale14_lj), Some(0.25));
        assert_eq!(config.lj_cutoff, 8.0);
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        assert!(matches!(
            resolve(&system_args(&["-S", "lj_cutoff"])),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            resolve(&system_args(&["-S", "lj_cutoff=far"])),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            resolve(&system_args(&["-S", "box=30"])),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            resolve(&system_args(&["--combining-rules", "harmonic"])),
            Err(CliError::Forcefield(_))
        ));
    }
}
