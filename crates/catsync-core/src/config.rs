use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so tests can drive it
/// with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(
                var,
                "expected one of true, false, 1, 0, yes, no".to_string(),
            )
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("CATSYNC_ENV", "development"))?;
    let log_level = or_default("CATSYNC_LOG_LEVEL", "info");

    let category_rules_path = lookup("CATSYNC_CATEGORY_RULES_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let report_dir = PathBuf::from(or_default("CATSYNC_REPORT_DIR", "./reports"));
    let reassign_relations = parse_bool("CATSYNC_REASSIGN_RELATIONS", "false")?;

    let db_max_connections = parse_u32("CATSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CATSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CATSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let image_check_timeout_secs = parse_u64("CATSYNC_IMAGE_CHECK_TIMEOUT_SECS", "12")?;
    let image_check_user_agent =
        or_default("CATSYNC_IMAGE_CHECK_USER_AGENT", "catsync-verifier/0.1");
    let image_check_concurrency = parse_usize("CATSYNC_IMAGE_CHECK_CONCURRENCY", "12")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        category_rules_path,
        report_dir,
        reassign_relations,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        image_check_timeout_secs,
        image_check_user_agent,
        image_check_concurrency,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CATSYNC_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
