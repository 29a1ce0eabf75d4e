// Startup configuration from environment variables.
//
// Anything credential-shaped that is missing is a fatal error: the process
// must not start serving traffic half-configured. Tunables that varied
// across deployments (dedup threshold, history size, moderation strategy)
// are plain variables with conservative defaults.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Which moderation strategy handles incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationStrategy {
    /// The built-in rule-based filter.
    Rules,
    /// Delegate judgment to the external language model.
    Model,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_id: i64,
    pub ymot_token: String,
    pub ymot_path: String,
    pub google_credentials_b64: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub moderation_strategy: ModerationStrategy,
    pub dedup_threshold: f64,
    pub history_size: usize,
    pub geoname_id: u32,
    pub station_name: String,
    pub rules_file: PathBuf,
    pub recency_file: PathBuf,
    pub work_dir: PathBuf,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not valid: '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let admin_id = std::env::var("ADMIN_ID")
            .context("ADMIN_ID is not set")?
            .parse()
            .context("ADMIN_ID is not a number")?;
        let ymot_token = std::env::var("YMOT_TOKEN").context("YMOT_TOKEN is not set")?;
        let ymot_path = std::env::var("YMOT_PATH").unwrap_or_else(|_| "ivr2:90/".to_string());
        let google_credentials_b64 = std::env::var("GOOGLE_SERVICE_ACCOUNT_B64")
            .context("GOOGLE_SERVICE_ACCOUNT_B64 is not set")?;

        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY").ok();
        let moderation_strategy = match std::env::var("MODERATION_STRATEGY").as_deref() {
            Ok("model") => {
                if openrouter_api_key.is_none() {
                    bail!("MODERATION_STRATEGY=model requires OPENROUTER_API_KEY");
                }
                ModerationStrategy::Model
            }
            Ok("rules") | Err(_) => ModerationStrategy::Rules,
            Ok(other) => bail!("MODERATION_STRATEGY must be rules or model, got '{}'", other),
        };

        Ok(Self {
            bot_token,
            admin_id,
            ymot_token,
            ymot_path,
            google_credentials_b64,
            openrouter_api_key,
            openrouter_model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            moderation_strategy,
            dedup_threshold: var_or("DEDUP_THRESHOLD", 0.55)?,
            history_size: var_or("HISTORY_SIZE", 16)?,
            geoname_id: var_or("GEONAME_ID", 293_397)?,
            station_name: std::env::var("STATION_NAME")
                .unwrap_or_else(|_| "מבזקים-פלוס".to_string()),
            rules_file: var_or("RULES_FILE", PathBuf::from("filters_config.json"))?,
            recency_file: var_or("RECENCY_FILE", PathBuf::from("last_messages.json"))?,
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("hotline_announcer")),
        })
    }
}
