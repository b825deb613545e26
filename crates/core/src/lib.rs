pub mod config;

pub use config::{
    AppConfig, BotConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig,
    ReplyPolicy, SlackConfig, UnitSystem, WitConfig, WolframConfig,
};
