//! Config validation CLI tool
//!
//! Validates a regrouper configuration file and reports any errors and warnings.

use regrouper_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a regrouper configuration file (YAML or TOML).");
            eprintln!();
            eprintln!("Default location: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config regrouper.toml");
            return ExitCode::from(2);
        }
    };

    // Check file exists
    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    // Try to load and validate
    match regrouper_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", regrouper_config::CURRENT_CONFIG_VERSION);
            println!("  Server: {}", policy.server.server_name);
            println!("  Interval: {}s", policy.assignment.interval.as_secs());
            println!("  Audit log: {}", policy.assignment.output_file.display());
            if policy.assignment.simulation_mode {
                println!("  Simulation mode: on");
            }
            if let Some(groups) = &policy.assignment.source_groups {
                println!("  Moves restricted to agents in {} group(s)", groups.len());
            }

            println!();
            println!("Categories (evaluated in this order):");
            for (index, rule) in policy.rules.iter().enumerate() {
                println!(
                    "  {}. {} [{}] -> {} ({} valid group(s))",
                    index + 1,
                    rule.name,
                    rule.predicate,
                    rule.target_group,
                    rule.accepted_groups.len()
                );
            }

            if !policy.warnings.is_empty() {
                println!();
                println!("Warnings ({}):", policy.warnings.len());
                for warning in &policy.warnings {
                    println!("  - {}", warning);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                regrouper_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                regrouper_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                regrouper_config::ConfigError::YamlError(parse_err) => {
                    eprintln!("YAML parse error:");
                    eprintln!("  {}", parse_err);
                }
                regrouper_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                regrouper_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        regrouper_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
