use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_supervisor_options(&config.supervisor)?;
    validate_process_spec(&config.process)?;

    Ok(())
}

/// Validate supervisor options
fn validate_supervisor_options(options: &SupervisorOptions) -> Result<()> {
    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

/// Validate the process declaration
fn validate_process_spec(spec: &ProcessSpec) -> Result<()> {
    if spec.name.is_empty() {
        return Err(anyhow!("Process name cannot be empty"));
    }

    if spec.name.len() > 64 {
        return Err(anyhow!("Process name too long (max 64 characters): {}", spec.name));
    }

    // Validate name contains only safe characters
    if !spec.name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(anyhow!(
            "Process name can only contain alphanumeric characters, hyphens, and underscores: {}",
            spec.name
        ));
    }

    if spec.script.as_os_str().is_empty() {
        return Err(anyhow!("Script path cannot be empty"));
    }

    if let Some(ref interpreter) = spec.interpreter {
        if interpreter.is_empty() {
            return Err(anyhow!("Interpreter cannot be empty when set"));
        }
    }

    if spec.watch {
        return Err(anyhow!("File watching is not supported, set watch to false"));
    }

    if spec.max_restarts > 100 {
        return Err(anyhow!("Max restarts too high (max 100): {}", spec.max_restarts));
    }

    validate_environment(&spec.env)?;
    validate_log_files(spec)?;

    Ok(())
}

/// Validate environment variable names
fn validate_environment(env: &HashMap<String, String>) -> Result<()> {
    for key in env.keys() {
        if key.is_empty() {
            return Err(anyhow!("Environment variable name cannot be empty"));
        }

        if !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(anyhow!(
                "Environment variable name can only contain alphanumeric characters and underscores: {}",
                key
            ));
        }
    }

    Ok(())
}

/// Validate log file declarations
fn validate_log_files(spec: &ProcessSpec) -> Result<()> {
    if spec.merge_logs && spec.out_file.is_none() {
        return Err(anyhow!("merge_logs requires out_file to be set"));
    }

    Ok(())
}
