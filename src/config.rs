use crate::cli::RunArgs;
use crate::error::ConfigError;
use crate::types::{LoadConfig, TargetSpec};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_WORKERS: u32 = 10;
const DEFAULT_RPS: u32 = 10;
const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub load: LoadSettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub method: Option<String>,
    pub body: Option<String>,
    pub body_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoadSettings {
    #[serde(default, with = "humantime_serde::option")]
    pub duration: Option<Duration>,
    pub workers: Option<u32>,
    pub rps: Option<u32>,
}

pub fn load_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let content = interpolate_env_vars(&content)?;
    Ok(toml::from_str(&content)?)
}

/// Expands `${VAR}` and `${VAR:-default}`.
fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_expr = var_expr.as_str();

        let (var_name, default) = match var_expr.find(":-") {
            Some(pos) => (&var_expr[..pos], Some(&var_expr[pos + 2..])),
            None => (var_expr, None),
        };

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => return Err(ConfigError::MissingEnv(var_name.to_string())),
            },
        };

        result.push_str(&content[last..full_match.start()]);
        result.push_str(&value);
        last = full_match.end();
    }

    result.push_str(&content[last..]);
    Ok(result)
}

fn read_body_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::BodyFile {
        path: path.to_path_buf(),
        source,
    })
}

/// CLI value > config file > built-in default.
pub fn merge_config(cli: &RunArgs, toml: Option<TomlConfig>) -> Result<LoadConfig, ConfigError> {
    let toml = toml.unwrap_or_default();

    let url = cli
        .url
        .clone()
        .or(toml.target.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ConfigError::Invalid("URL is required. Provide via argument or config file.".into())
        })?;
    reqwest::Url::parse(&url)
        .map_err(|e| ConfigError::Invalid(format!("Invalid URL '{}': {}", url, e)))?;

    let method_str = if cli.method.trim().is_empty() {
        toml.target.method.unwrap_or_default()
    } else {
        cli.method.clone()
    };
    let method = normalize_method(&method_str)?;

    let body = if let Some(body) = &cli.body {
        Some(body.clone())
    } else if let Some(path) = &cli.body_file {
        Some(read_body_file(path)?)
    } else if let Some(body) = toml.target.body {
        Some(body)
    } else if let Some(path) = toml.target.body_file {
        Some(read_body_file(Path::new(&path))?)
    } else {
        None
    };

    let duration = cli
        .duration
        .or(toml.load.duration)
        .unwrap_or(DEFAULT_DURATION);
    let workers = cli.workers.or(toml.load.workers).unwrap_or(DEFAULT_WORKERS);
    let rps = cli.rps.or(toml.load.rps).unwrap_or(DEFAULT_RPS);

    if duration.is_zero() {
        return Err(ConfigError::Invalid("Duration must be greater than zero".into()));
    }
    if duration > MAX_DURATION {
        return Err(ConfigError::Invalid(format!(
            "Duration must be at most {}",
            humantime::format_duration(MAX_DURATION)
        )));
    }
    if workers == 0 {
        return Err(ConfigError::Invalid("Workers must be at least 1".into()));
    }
    if rps == 0 {
        return Err(ConfigError::Invalid("RPS must be at least 1".into()));
    }

    Ok(LoadConfig {
        target: TargetSpec { url, method, body },
        duration,
        workers,
        rps,
    })
}

/// Empty means auto-detect. Anything else must be a valid HTTP token.
fn normalize_method(raw: &str) -> Result<Option<String>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let upper = trimmed.to_ascii_uppercase();
    reqwest::Method::from_bytes(upper.as_bytes())
        .map_err(|_| ConfigError::Invalid(format!("Invalid HTTP method: {}", trimmed)))?;
    Ok(Some(upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(url: Option<&str>) -> RunArgs {
        RunArgs {
            url: url.map(str::to_string),
            ..RunArgs::default()
        }
    }

    fn parse(content: &str) -> TomlConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn defaults_apply_without_file() {
        let config = merge_config(&cli(Some("http://localhost:8080")), None).unwrap();

        assert_eq!(config.target.url, "http://localhost:8080");
        assert_eq!(config.target.method, None);
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.workers, 10);
        assert_eq!(config.rps, 10);
    }

    #[test]
    fn file_values_fill_gaps_and_cli_wins() {
        let toml = parse(
            r#"
            [target]
            url = "http://from-file/"
            method = "put"
            body = '{"a":1}'

            [load]
            duration = "2m"
            workers = 4
            rps = 50
            "#,
        );

        let mut args = cli(None);
        args.rps = Some(5);
        let config = merge_config(&args, Some(toml)).unwrap();

        assert_eq!(config.target.url, "http://from-file/");
        assert_eq!(config.target.method.as_deref(), Some("PUT"));
        assert_eq!(config.target.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(config.duration, Duration::from_secs(120));
        assert_eq!(config.workers, 4);
        assert_eq!(config.rps, 5);
    }

    #[test]
    fn explicit_cli_method_overrides_file() {
        let toml = parse("[target]\nmethod = \"PUT\"\n");
        let mut args = cli(Some("http://x/"));
        args.method = "delete".into();

        let config = merge_config(&args, Some(toml)).unwrap();
        assert_eq!(config.target.method.as_deref(), Some("DELETE"));
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(merge_config(&cli(None), None).is_err());
        assert!(merge_config(&cli(Some("   ")), None).is_err());
        assert!(merge_config(&cli(Some("not a url")), None).is_err());

        let mut args = cli(Some("http://x/"));
        args.workers = Some(0);
        assert!(merge_config(&args, None).is_err());

        let mut args = cli(Some("http://x/"));
        args.rps = Some(0);
        assert!(merge_config(&args, None).is_err());

        let mut args = cli(Some("http://x/"));
        args.duration = Some(Duration::ZERO);
        assert!(merge_config(&args, None).is_err());

        let mut args = cli(Some("http://x/"));
        args.method = "GE T".into();
        assert!(matches!(
            merge_config(&args, None),
            Err(ConfigError::Invalid(msg)) if msg.contains("Invalid HTTP method")
        ));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        let parsed =
            Cli::try_parse_from(["surge", "run", "http://x/", "-d", "18446744073709551615"])
                .unwrap();
        let Commands::Run(args) = parsed.command else {
            panic!("expected run subcommand");
        };

        assert!(matches!(
            merge_config(&args, None),
            Err(ConfigError::Invalid(msg)) if msg.contains("at most")
        ));

        let mut args = cli(Some("http://x/"));
        args.duration = Some(MAX_DURATION);
        assert_eq!(merge_config(&args, None).unwrap().duration, MAX_DURATION);

        let toml = parse("[load]\nduration = \"30days\"\n");
        assert!(merge_config(&cli(Some("http://x/")), Some(toml)).is_err());
    }

    #[test]
    fn body_file_is_read() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"id":7}}"#).unwrap();

        let mut args = cli(Some("http://x/"));
        args.body_file = Some(file.path().to_path_buf());
        let config = merge_config(&args, None).unwrap();

        assert_eq!(config.target.body.as_deref(), Some(r#"{"id":7}"#));
    }

    #[test]
    fn missing_body_file_is_reported() {
        let mut args = cli(Some("http://x/"));
        args.body_file = Some("/nonexistent/surge-body.json".into());

        assert!(matches!(
            merge_config(&args, None),
            Err(ConfigError::BodyFile { .. })
        ));
    }

    #[test]
    fn env_interpolation_with_defaults() {
        // SAFETY: test-local variable name, not read by other tests.
        unsafe { std::env::set_var("SURGE_TEST_HOST", "api.internal") };

        let out = interpolate_env_vars(
            "url = \"http://${SURGE_TEST_HOST}/${SURGE_TEST_UNSET_PATH:-health}\"",
        )
        .unwrap();
        assert_eq!(out, "url = \"http://api.internal/health\"");

        let err = interpolate_env_vars("${SURGE_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEnv(name) if name == "SURGE_TEST_DEFINITELY_UNSET"
        ));
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[target]\nurl = \"http://file/\"\n[load]\nworkers = 2").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.target.url.as_deref(), Some("http://file/"));
        assert_eq!(config.load.workers, Some(2));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<TomlConfig, _> = toml::from_str("[load]\nconcurrency = 5\n");
        assert!(result.is_err());
    }
}
