use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub wit: WitConfig,
    pub wolfram: WolframConfig,
    pub bot: BotConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct WitConfig {
    pub token: SecretString,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WolframConfig {
    pub app_id: SecretString,
    pub base_url: String,
    pub units: UnitSystem,
    pub spoken_timeout: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub reply_policy: ReplyPolicy,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

/// How the bot replies when an upstream call fails mid-pipeline.
///
/// `FailOpen` preserves the original behavior: whatever answer text exists
/// (possibly empty) is sent anyway. `FailClosed` short-circuits and sends an
/// apology instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    FailOpen,
    FailClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_base_url: Option<String>,
    pub wit_token: Option<String>,
    pub wit_base_url: Option<String>,
    pub wolfram_app_id: Option<String>,
    pub wolfram_base_url: Option<String>,
    pub reply_policy: Option<ReplyPolicy>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                base_url: "https://slack.com/api".to_string(),
            },
            wit: WitConfig {
                token: String::new().into(),
                base_url: "https://api.wit.ai".to_string(),
                api_version: "20240304".to_string(),
                timeout_secs: 15,
            },
            wolfram: WolframConfig {
                app_id: String::new().into(),
                base_url: "https://api.wolframalpha.com".to_string(),
                units: UnitSystem::Metric,
                spoken_timeout: 1000,
                timeout_secs: 15,
            },
            bot: BotConfig { reply_policy: ReplyPolicy::FailOpen },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for UnitSystem {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(ConfigError::Validation(format!(
                "unsupported unit system `{other}` (expected metric|imperial)"
            ))),
        }
    }
}

impl std::str::FromStr for ReplyPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "fail-open" => Ok(Self::FailOpen),
            "fail_closed" | "fail-closed" => Ok(Self::FailClosed),
            other => Err(ConfigError::Validation(format!(
                "unsupported reply policy `{other}` (expected fail_open|fail_closed)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("askwolf.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(app_token_value);
            }
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
            if let Some(base_url) = slack.base_url {
                self.slack.base_url = base_url;
            }
        }

        if let Some(wit) = patch.wit {
            if let Some(token_value) = wit.token {
                self.wit.token = secret_value(token_value);
            }
            if let Some(base_url) = wit.base_url {
                self.wit.base_url = base_url;
            }
            if let Some(api_version) = wit.api_version {
                self.wit.api_version = api_version;
            }
            if let Some(timeout_secs) = wit.timeout_secs {
                self.wit.timeout_secs = timeout_secs;
            }
        }

        if let Some(wolfram) = patch.wolfram {
            if let Some(app_id_value) = wolfram.app_id {
                self.wolfram.app_id = secret_value(app_id_value);
            }
            if let Some(base_url) = wolfram.base_url {
                self.wolfram.base_url = base_url;
            }
            if let Some(units) = wolfram.units {
                self.wolfram.units = units;
            }
            if let Some(spoken_timeout) = wolfram.spoken_timeout {
                self.wolfram.spoken_timeout = spoken_timeout;
            }
            if let Some(timeout_secs) = wolfram.timeout_secs {
                self.wolfram.timeout_secs = timeout_secs;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(reply_policy) = bot.reply_policy {
                self.bot.reply_policy = reply_policy;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ASKWOLF_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("ASKWOLF_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("ASKWOLF_SLACK_BASE_URL") {
            self.slack.base_url = value;
        }

        if let Some(value) = read_env("ASKWOLF_WIT_TOKEN") {
            self.wit.token = secret_value(value);
        }
        if let Some(value) = read_env("ASKWOLF_WIT_BASE_URL") {
            self.wit.base_url = value;
        }
        if let Some(value) = read_env("ASKWOLF_WIT_API_VERSION") {
            self.wit.api_version = value;
        }
        if let Some(value) = read_env("ASKWOLF_WIT_TIMEOUT_SECS") {
            self.wit.timeout_secs = parse_u64("ASKWOLF_WIT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKWOLF_WOLFRAM_APP_ID") {
            self.wolfram.app_id = secret_value(value);
        }
        if let Some(value) = read_env("ASKWOLF_WOLFRAM_BASE_URL") {
            self.wolfram.base_url = value;
        }
        if let Some(value) = read_env("ASKWOLF_WOLFRAM_UNITS") {
            self.wolfram.units = value.parse()?;
        }
        if let Some(value) = read_env("ASKWOLF_WOLFRAM_SPOKEN_TIMEOUT") {
            self.wolfram.spoken_timeout = parse_u32("ASKWOLF_WOLFRAM_SPOKEN_TIMEOUT", &value)?;
        }
        if let Some(value) = read_env("ASKWOLF_WOLFRAM_TIMEOUT_SECS") {
            self.wolfram.timeout_secs = parse_u64("ASKWOLF_WOLFRAM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKWOLF_REPLY_POLICY") {
            self.bot.reply_policy = value.parse()?;
        }

        let log_level = read_env("ASKWOLF_LOGGING_LEVEL").or_else(|| read_env("ASKWOLF_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ASKWOLF_LOGGING_FORMAT").or_else(|| read_env("ASKWOLF_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(slack_base_url) = overrides.slack_base_url {
            self.slack.base_url = slack_base_url;
        }
        if let Some(wit_token) = overrides.wit_token {
            self.wit.token = secret_value(wit_token);
        }
        if let Some(wit_base_url) = overrides.wit_base_url {
            self.wit.base_url = wit_base_url;
        }
        if let Some(wolfram_app_id) = overrides.wolfram_app_id {
            self.wolfram.app_id = secret_value(wolfram_app_id);
        }
        if let Some(wolfram_base_url) = overrides.wolfram_base_url {
            self.wolfram.base_url = wolfram_base_url;
        }
        if let Some(reply_policy) = overrides.reply_policy {
            self.bot.reply_policy = reply_policy;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_wit(&self.wit)?;
        validate_wolfram(&self.wolfram)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("askwolf.toml"), PathBuf::from("config/askwolf.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if !slack.base_url.starts_with("http://") && !slack.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_wit(wit: &WitConfig) -> Result<(), ConfigError> {
    if wit.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "wit.token is required. Get it from https://wit.ai > Your App > Settings > Server Access Token".to_string(),
        ));
    }

    if !wit.base_url.starts_with("http://") && !wit.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "wit.base_url must start with http:// or https://".to_string(),
        ));
    }

    if wit.timeout_secs == 0 || wit.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "wit.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_wolfram(wolfram: &WolframConfig) -> Result<(), ConfigError> {
    if wolfram.app_id.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "wolfram.app_id is required. Get it from https://developer.wolframalpha.com".to_string(),
        ));
    }

    if !wolfram.base_url.starts_with("http://") && !wolfram.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "wolfram.base_url must start with http:// or https://".to_string(),
        ));
    }

    if wolfram.spoken_timeout == 0 {
        return Err(ConfigError::Validation(
            "wolfram.spoken_timeout must be greater than zero".to_string(),
        ));
    }

    if wolfram.timeout_secs == 0 || wolfram.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "wolfram.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    wit: Option<WitPatch>,
    wolfram: Option<WolframPatch>,
    bot: Option<BotPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WitPatch {
    token: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WolframPatch {
    app_id: Option<String>,
    base_url: Option<String>,
    units: Option<UnitSystem>,
    spoken_timeout: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    reply_policy: Option<ReplyPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
