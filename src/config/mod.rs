use crate::data::TickGrain;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `LOBBYWATCH_GATEWAY_URL`
pub const ENV_PREFIX: &str = "LOBBYWATCH_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base URL of the account inventory, watch list and sighting API
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Base URL of the matchmaking session gateway
    #[serde(default)]
    pub gateway_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub search_tick: TickGrain,
    #[serde(default = "default_watchlist_refresh_ms")]
    pub watchlist_refresh_ms: u64,
    #[serde(default = "default_session_retry_ms")]
    pub session_retry_ms: u64,
}

fn default_watchlist_refresh_ms() -> u64 {
    3_600_000
}

fn default_session_retry_ms() -> u64 {
    60_000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            search_tick: TickGrain::default(),
            watchlist_refresh_ms: default_watchlist_refresh_ms(),
            session_retry_ms: default_session_retry_ms(),
        }
    }
}

impl ScheduleConfig {
    pub fn watchlist_refresh(&self) -> Duration {
        Duration::from_millis(self.watchlist_refresh_ms)
    }

    pub fn session_retry(&self) -> Duration {
        Duration::from_millis(self.session_retry_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_min_rank")]
    pub min_rank: u32,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
    /// Whether a search that finds nobody at all counts toward reacquisition
    #[serde(default = "default_true")]
    pub count_empty_as_failure: bool,
}

fn default_search_timeout_ms() -> u64 {
    60_000
}

fn default_failure_threshold() -> u32 {
    30
}

fn default_min_rank() -> u32 {
    15
}

fn default_game_mode() -> String {
    "competitive".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_search_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            min_rank: default_min_rank(),
            game_mode: default_game_mode(),
            count_empty_as_failure: true,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    300_000
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl NotifyConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    20
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Config {
    /// Apply `LOBBYWATCH_*` overrides using `lookup` to read variables.
    ///
    /// Takes a lookup function rather than reading the process environment
    /// directly so tests don't have to mutate global state.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("API_BASE_URL") {
            self.endpoints.api_base_url = v;
        }
        if let Some(v) = var("API_TOKEN") {
            self.endpoints.api_token = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = var("GATEWAY_URL") {
            self.endpoints.gateway_url = v;
        }
        if let Some(v) = var("SEARCH_TICK") {
            self.schedule.search_tick = TickGrain::parse(&v).with_context(|| {
                format!("{ENV_PREFIX}SEARCH_TICK must be `minute` or `hour`, got `{v}`")
            })?;
        }
        if let Some(v) = var("GAME_MODE") {
            self.search.game_mode = v;
        }

        override_number(&var, "WATCHLIST_REFRESH_MS", &mut self.schedule.watchlist_refresh_ms)?;
        override_number(&var, "SESSION_RETRY_MS", &mut self.schedule.session_retry_ms)?;
        override_number(&var, "SEARCH_TIMEOUT_MS", &mut self.search.timeout_ms)?;
        override_number(&var, "FAILURE_THRESHOLD", &mut self.search.failure_threshold)?;
        override_number(&var, "MIN_RANK", &mut self.search.min_rank)?;
        override_number(&var, "NOTIFY_COOLDOWN_MS", &mut self.notify.cooldown_ms)?;
        override_number(&var, "CREDENTIAL_BATCH_SIZE", &mut self.credentials.batch_size)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.api_base_url.trim().is_empty() {
            anyhow::bail!("endpoints.api_base_url is not set (or {ENV_PREFIX}API_BASE_URL)");
        }
        if self.endpoints.gateway_url.trim().is_empty() {
            anyhow::bail!("endpoints.gateway_url is not set (or {ENV_PREFIX}GATEWAY_URL)");
        }
        if self.credentials.batch_size == 0 {
            anyhow::bail!("credentials.batch_size must be greater than zero");
        }
        if self.search.failure_threshold == 0 {
            anyhow::bail!("search.failure_threshold must be greater than zero");
        }
        if self.search.timeout_ms == 0
            || self.schedule.watchlist_refresh_ms == 0
            || self.schedule.session_retry_ms == 0
        {
            anyhow::bail!("timeouts and intervals must be greater than zero");
        }
        Ok(())
    }
}

fn override_number<T, V>(var: &V, name: &str, slot: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    V: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(name) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value `{raw}` for {ENV_PREFIX}{name}"))?;
    }
    Ok(())
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = directories::ProjectDirs::from("", "", "lobbywatch")
        .context("Could not determine config directory")?
        .config_dir()
        .to_path_buf();
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from `path` (or the default location), then apply the
/// process environment and validate.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = load_file(path)?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Read the TOML file only. A missing explicit path is an error; a missing
/// default file yields defaults.
pub fn load_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file not found at {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = default_config_path()?;
            if !p.exists() {
                tracing::debug!("No config file at {}, using defaults", p.display());
                return Ok(Config::default());
            }
            p
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(config)
}

pub async fn init_wizard() -> Result<()> {
    use std::io::{self, Write};

    println!("lobbywatch Configuration Wizard");
    println!("===============================\n");

    let config_path = default_config_path()?;
    if config_path.exists() {
        print!("Config already exists at {}. Overwrite? [y/N] ", config_path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    print!("Account/watch-list API base URL: ");
    io::stdout().flush()?;
    let mut api_base_url = String::new();
    io::stdin().read_line(&mut api_base_url)?;

    print!("API token (optional, press Enter to skip): ");
    io::stdout().flush()?;
    let mut api_token = String::new();
    io::stdin().read_line(&mut api_token)?;

    print!("Matchmaking session gateway URL: ");
    io::stdout().flush()?;
    let mut gateway_url = String::new();
    io::stdin().read_line(&mut gateway_url)?;

    let config = Config {
        endpoints: Endpoints {
            api_base_url: api_base_url.trim().to_string(),
            api_token: if api_token.trim().is_empty() {
                None
            } else {
                Some(api_token.trim().to_string())
            },
            gateway_url: gateway_url.trim().to_string(),
        },
        ..Config::default()
    };
    config.validate()?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, content)?;

    // The file holds an API token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("\nConfig saved to {}", config_path.display());
    println!("Run `lobbywatch` to start watching.");

    Ok(())
}
