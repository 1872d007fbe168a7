//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`LOCO_BASE_URL`, `LOCO_MODEL`, `LOCO_API_KEY`,
//!    `LOCO_TEMPERATURE`, `LOCO_SAFE_MODE`, `LOCO_AUTO_APPROVE`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./loco.toml in the current directory
//! 4. $XDG_CONFIG_HOME/loco/loco.toml (or ~/.config/loco/loco.toml)
//! 5. Built-in defaults
//!
//! CLI flags are applied on top by the binary after loading.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

mod defaults;
mod init;
mod types;

pub use init::{config_root_dir, default_global_config_path, initialize_default_global_config};
pub use types::{
    AgentConfig, Config, DisplayConfig, GlobalConfigInitResult, LoadedConfig, McpConfig,
    McpServerConfig, ModelConfig, SafetyConfig, ToolsConfig,
};

const LOCAL_CONFIG_FILE: &str = "loco.toml";

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_source(path_override)?.config)
}

/// Load configuration and report which file (if any) it came from.
pub fn load_config_with_source(path_override: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&config_text)?;
    resolve_api_key_env(&mut config, &env_lookup);
    apply_runtime_env_overrides(&mut config, &env_lookup)?;
    validate(&config)?;
    Ok(LoadedConfig { config, source })
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, Option<PathBuf>), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, Some(path)));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if let Ok(text) = read_file(&local) {
        return Ok((text, Some(local)));
    }
    if let Some(dir) = config_root() {
        let global = init::global_config_path_under(&dir);
        if let Ok(text) = read_file(&global) {
            return Ok((text, Some(global)));
        }
    }

    Ok((String::new(), None))
}

/// Fill an empty `api_key` from the variable named by `api_key_env`.
fn resolve_api_key_env<FEnv>(config: &mut Config, env_lookup: &FEnv)
where
    FEnv: Fn(&str) -> Option<String>,
{
    if !config.model.api_key.trim().is_empty() {
        return;
    }
    let Some(var) = config.model.api_key_env.as_deref() else {
        return;
    };
    if let Some(key) = non_empty_env(env_lookup, var) {
        config.model.api_key = key;
    }
}

fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty_env(env_lookup, "LOCO_BASE_URL") {
        config.model.base_url = url;
    }
    if let Some(model) = non_empty_env(env_lookup, "LOCO_MODEL") {
        config.model.name = model;
    }
    if let Some(key) = non_empty_env(env_lookup, "LOCO_API_KEY") {
        config.model.api_key = key;
    }
    if let Some(raw) = non_empty_env(env_lookup, "LOCO_TEMPERATURE") {
        let parsed = raw.parse::<f64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid LOCO_TEMPERATURE value `{raw}`: expected a number"
            ))
        })?;
        config.model.temperature = Some(parsed);
    }
    if let Some(raw) = non_empty_env(env_lookup, "LOCO_SAFE_MODE") {
        config.safety.safe_mode = parse_bool("LOCO_SAFE_MODE", &raw)?;
    }
    if let Some(raw) = non_empty_env(env_lookup, "LOCO_AUTO_APPROVE") {
        config.safety.auto_approve = parse_bool("LOCO_AUTO_APPROVE", &raw)?;
    }
    Ok(())
}

fn non_empty_env<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected true/false"
        ))),
    }
}

/// Reject configurations the agent cannot run with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.model.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("model.base_url must not be empty".into()));
    }
    if config.model.name.trim().is_empty() {
        return Err(ConfigError::Invalid("model.name must not be empty".into()));
    }
    if config.agent.max_tool_iterations == 0 {
        return Err(ConfigError::Invalid(
            "agent.max_tool_iterations must be at least 1".into(),
        ));
    }
    if let Some(t) = config.model.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be between 0 and 2, got {t}"
            )));
        }
    }
    if config.tools.shell.trim().is_empty() {
        return Err(ConfigError::Invalid("tools.shell must not be empty".into()));
    }
    if config.tools.backup_suffix.is_empty() {
        return Err(ConfigError::Invalid(
            "tools.backup_suffix must not be empty; edits would overwrite their own backup".into(),
        ));
    }
    for (name, server) in &config.mcp.servers {
        if name.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "mcp server name `{name}` must not contain `.`"
            )));
        }
        if server.enabled && server.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "mcp server `{name}` has no command"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_sensible() {
        let c = Config::default();
        assert_eq!(c.model.base_url, "http://localhost:11434/v1");
        assert_eq!(c.agent.max_tool_iterations, 10);
        assert!(c.safety.safe_mode);
        assert!(!c.safety.auto_approve);
        assert!(c.safety.allowed_commands.iter().any(|cmd| cmd == "git"));
        assert_eq!(c.tools.shell, "sh");
        assert_eq!(c.tools.backup_suffix, ".bak");
        assert!(c.mcp.servers.is_empty());
        validate(&c).unwrap();
    }

    #[test]
    fn parse_partial_toml() {
        let toml = r#"
            [model]
            name = "llama3.1:8b"
            max_retries = 0

            [safety]
            allowed_commands = ["ls", "make"]

            [mcp.servers.fs]
            command = "mcp-fs"
            args = ["--root", "."]
        "#;
        let loaded = load_with(None, &[("loco.toml", toml)], &[], None).unwrap();
        let c = loaded.config;
        assert_eq!(c.model.name, "llama3.1:8b");
        assert_eq!(c.model.base_url, "http://localhost:11434/v1");
        assert_eq!(c.model.max_retries, 0);
        assert_eq!(c.model.retry_backoff_ms, 500);
        assert_eq!(c.safety.allowed_commands, vec!["ls", "make"]);
        assert!(c.safety.safe_mode);
        assert_eq!(c.mcp.servers["fs"].args, vec!["--root", "."]);
        assert!(c.mcp.servers["fs"].enabled);
        assert_eq!(loaded.source, Some(PathBuf::from("loco.toml")));
    }

    #[test]
    fn local_file_beats_global_file() {
        let loaded = load_with(
            None,
            &[
                ("loco.toml", "[model]\nname = \"local\"\n"),
                ("/cfg/loco/loco.toml", "[model]\nname = \"global\"\n"),
            ],
            &[],
            Some("/cfg"),
        )
        .unwrap();
        assert_eq!(loaded.config.model.name, "local");
    }

    #[test]
    fn global_file_used_when_no_local() {
        let loaded = load_with(
            None,
            &[("/cfg/loco/loco.toml", "[model]\nname = \"global\"\n")],
            &[],
            Some("/cfg"),
        )
        .unwrap();
        assert_eq!(loaded.config.model.name, "global");
        assert_eq!(loaded.source, Some(PathBuf::from("/cfg/loco/loco.toml")));
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let loaded = load_with(None, &[], &[], Some("/cfg")).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.model.name, Config::default().model.name);
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_with(Some("/nope/loco.toml"), &[], &[], None).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "got: {err}");
    }

    #[test]
    fn env_overrides_file_values() {
        let loaded = load_with(
            None,
            &[("loco.toml", "[model]\nname = \"file\"\n[safety]\nsafe_mode = true\n")],
            &[
                ("LOCO_MODEL", "env-model"),
                ("LOCO_BASE_URL", "http://gpu-box:8080/v1"),
                ("LOCO_SAFE_MODE", "off"),
                ("LOCO_AUTO_APPROVE", "1"),
                ("LOCO_TEMPERATURE", "0.2"),
            ],
            None,
        )
        .unwrap();
        let c = loaded.config;
        assert_eq!(c.model.name, "env-model");
        assert_eq!(c.model.base_url, "http://gpu-box:8080/v1");
        assert!(!c.safety.safe_mode);
        assert!(c.safety.auto_approve);
        assert_eq!(c.model.temperature, Some(0.2));
    }

    #[test]
    fn invalid_bool_env_is_rejected() {
        let err = load_with(None, &[], &[("LOCO_SAFE_MODE", "maybe")], None).unwrap_err();
        assert!(err.to_string().contains("LOCO_SAFE_MODE"), "got: {err}");
    }

    #[test]
    fn api_key_env_is_resolved_and_explicit_env_wins() {
        let toml = "[model]\napi_key_env = \"MY_KEY\"\n";
        let loaded = load_with(None, &[("loco.toml", toml)], &[("MY_KEY", "k1")], None).unwrap();
        assert_eq!(loaded.config.model.api_key, "k1");

        let loaded = load_with(
            None,
            &[("loco.toml", toml)],
            &[("MY_KEY", "k1"), ("LOCO_API_KEY", "k2")],
            None,
        )
        .unwrap();
        assert_eq!(loaded.config.model.api_key, "k2");
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let err = load_with(
            None,
            &[("loco.toml", "[agent]\nmax_tool_iterations = 0\n")],
            &[],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_tool_iterations"), "got: {err}");
    }

    #[test]
    fn empty_backup_suffix_is_invalid() {
        let err = load_with(
            None,
            &[("loco.toml", "[tools]\nbackup_suffix = \"\"\n")],
            &[],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("backup_suffix"), "got: {err}");
    }

    #[test]
    fn dotted_server_name_is_invalid() {
        let toml = "[mcp.servers.\"a.b\"]\ncommand = \"x\"\n";
        let err = load_with(None, &[("loco.toml", toml)], &[], None).unwrap_err();
        assert!(err.to_string().contains("a.b"), "got: {err}");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_with(None, &[("loco.toml", "[model\n")], &[], None).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "got: {err}");
    }

    fn load_with(
        path_override: Option<&str>,
        files: &[(&str, &str)],
        env: &[(&str, &str)],
        config_root: Option<&str>,
    ) -> Result<LoadedConfig, ConfigError> {
        let files: HashMap<String, String> = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config_root = config_root.map(PathBuf::from);
        load_config_from_sources(
            path_override,
            move |path| {
                let key = path.to_string_lossy().into_owned();
                files
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, key))
            },
            move |name| env.get(name).cloned(),
            move || config_root.clone(),
        )
    }
}
