use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::services::event_source::{HookFlags, HookOptions};
use crate::services::relay::{RelayConfig, TitlePolicy};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub hook: HookConfig,
    pub relay: RelaySettings,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookConfig {
    pub skip_own_thread: bool,
    pub skip_own_process: bool,
    pub out_of_context: bool,
    /// "foreground" - только заголовок активного окна, "all" - любого окна
    pub title_changes: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelaySettings {
    pub capacity: usize,
    pub output_capacity: usize,
    pub prefetch: bool,
    pub resolve_process_name: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// 0 - ждать событий бесконечно
    pub idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            hook: HookConfig {
                skip_own_thread: true,
                skip_own_process: false,
                out_of_context: true,
                title_changes: "foreground".to_string(),
            },
            relay: RelaySettings {
                capacity: 10,
                output_capacity: 3,
                prefetch: true,
                resolve_process_name: false,
            },
            watch: WatchConfig {
                idle_timeout_secs: 0,
            },
        }
    }
}

impl Config {
    /// Загрузка: значения по умолчанию -> TOML файл -> переменные `NCW_*`.
    ///
    /// Отсутствующий файл не ошибка, берутся значения по умолчанию.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("NCW_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек hook
        self.title_policy()?;

        // Валидация настроек relay
        if self.relay.capacity == 0 {
            anyhow::bail!("relay.capacity должно быть больше 0");
        }

        if self.relay.output_capacity == 0 {
            anyhow::bail!("relay.output_capacity должно быть больше 0");
        }

        Ok(())
    }

    pub fn title_policy(&self) -> Result<TitlePolicy> {
        match self.hook.title_changes.as_str() {
            "foreground" => Ok(TitlePolicy::ForegroundOnly),
            "all" => Ok(TitlePolicy::AllWindows),
            other => anyhow::bail!("Неверная политика заголовков: {}", other),
        }
    }

    pub fn hook_options(&self) -> HookOptions {
        HookOptions::default().with_flags(HookFlags {
            skip_own_thread: self.hook.skip_own_thread,
            skip_own_process: self.hook.skip_own_process,
            out_of_context: self.hook.out_of_context,
        })
    }

    /// Собрать настройки relay из конфигурации
    pub fn relay_config(&self) -> Result<RelayConfig> {
        Ok(RelayConfig {
            capacity: self.relay.capacity,
            hook: self.hook_options(),
            title_policy: self.title_policy()?,
            prefetch: self.relay.prefetch,
            resolve_process_name: self.relay.resolve_process_name,
        })
    }
}
