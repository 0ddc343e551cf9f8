//! Configuration file management for plansmith.
//!
//! Provides a TOML-based config file at `~/.config/plansmith/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use plansmith_core::generate::ChatConfig;
use plansmith_core::graph::GraphConfig;

pub const ENV_TENANT_ID: &str = "PLANSMITH_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "PLANSMITH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PLANSMITH_CLIENT_SECRET";
pub const ENV_PLAN_ID: &str = "PLANSMITH_PLAN_ID";
pub const ENV_GRAPH_URL: &str = "PLANSMITH_GRAPH_URL";
pub const ENV_OPENAI_ENDPOINT: &str = "PLANSMITH_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "PLANSMITH_OPENAI_API_KEY";
pub const ENV_OPENAI_DEPLOYMENT: &str = "PLANSMITH_OPENAI_DEPLOYMENT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub planner: PlannerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GraphSection {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Graph API root; defaults to the public cloud.
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OpenAiSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlannerSection {
    /// Plan that `materialize` targets when `--plan-id` is not given.
    pub plan_id: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plansmith config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plansmith` or
/// `~/.config/plansmith`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plansmith");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plansmith")
}

/// Return the path to the plansmith config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix; the file holds client secrets.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve one value: CLI flag > env var > config file.
fn pick(cli: Option<&str>, env: &str, file: Option<&String>) -> Option<String> {
    cli.map(str::to_string)
        .or_else(|| env_value(env))
        .or_else(|| file.cloned())
}

fn require(value: Option<String>, env: &str, what: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => bail!("{what} not found; set {env} or run `plansmith init` to create a config file"),
    }
}

/// Configuration sources, resolved lazily per component so that commands
/// only demand the credentials they use.
#[derive(Debug, Default)]
pub struct PlansmithConfig {
    file: ConfigFile,
}

impl PlansmithConfig {
    /// Read the config file if there is one. A missing file is not an error;
    /// a malformed one is.
    pub fn load() -> Result<Self> {
        if !config_path().exists() {
            return Ok(Self::default());
        }
        Ok(Self {
            file: load_config()?,
        })
    }

    /// Graph credentials and endpoint.
    ///
    /// - Graph URL: `cli_graph_url` > `PLANSMITH_GRAPH_URL` > `graph.base_url` > public cloud
    /// - Tenant, client id, secret: env > config file > error
    pub fn graph(&self, cli_graph_url: Option<&str>) -> Result<GraphConfig> {
        let section = &self.file.graph;
        let tenant_id = require(
            pick(None, ENV_TENANT_ID, section.tenant_id.as_ref()),
            ENV_TENANT_ID,
            "tenant id",
        )?;
        let client_id = require(
            pick(None, ENV_CLIENT_ID, section.client_id.as_ref()),
            ENV_CLIENT_ID,
            "client id",
        )?;
        let client_secret = require(
            pick(None, ENV_CLIENT_SECRET, section.client_secret.as_ref()),
            ENV_CLIENT_SECRET,
            "client secret",
        )?;

        let mut config = GraphConfig::new(tenant_id, client_id, client_secret);
        if let Some(url) = pick(cli_graph_url, ENV_GRAPH_URL, section.base_url.as_ref()) {
            config = config.with_base_url(url);
        }
        Ok(config)
    }

    /// Chat-completions deployment used for plan generation.
    pub fn chat(&self) -> Result<ChatConfig> {
        let section = &self.file.openai;
        let endpoint = require(
            pick(None, ENV_OPENAI_ENDPOINT, section.endpoint.as_ref()),
            ENV_OPENAI_ENDPOINT,
            "OpenAI endpoint",
        )?;
        let api_key = require(
            pick(None, ENV_OPENAI_API_KEY, section.api_key.as_ref()),
            ENV_OPENAI_API_KEY,
            "OpenAI API key",
        )?;
        let deployment = require(
            pick(None, ENV_OPENAI_DEPLOYMENT, section.deployment.as_ref()),
            ENV_OPENAI_DEPLOYMENT,
            "OpenAI deployment",
        )?;

        let mut config = ChatConfig::new(endpoint, api_key, deployment);
        if let Some(version) = &section.api_version {
            config.api_version = version.clone();
        }
        Ok(config)
    }

    /// Target plan: `cli_plan_id` > `PLANSMITH_PLAN_ID` > `planner.plan_id` > error.
    pub fn plan_id(&self, cli_plan_id: Option<&str>) -> Result<String> {
        require(
            pick(cli_plan_id, ENV_PLAN_ID, self.file.planner.plan_id.as_ref()),
            ENV_PLAN_ID,
            "plan id",
        )
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
