use crate::domain::error::Result;
use crate::domain::time_grid::TimeGrid;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset: i32,
    #[serde(default = "default_time_step")]
    pub time_step: u32,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    #[serde(default)]
    pub persist_session: bool,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default)]
    pub persist_config: bool,
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            persist_session: false,
            session_file: default_session_file(),
            persist_config: false,
            config_file: default_config_file(),
        }
    }
}

fn default_base_url() -> String {
    "https://enlighten.enphaseenergy.com".to_string()
}

fn default_utc_offset() -> i32 {
    -5
}

fn default_time_step() -> u32 {
    15
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from("tmp/enphase_session.toml")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("tmp/enphase_config.toml")
}

impl Settings {
    pub fn time_grid(&self) -> Result<TimeGrid> {
        TimeGrid::new(self.utc_offset, self.time_step)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Reads `config/enlighten.*` when present, overridden by `ENLIGHTEN_*`
/// environment variables (`__` separates nested keys).
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/enlighten").required(false))
        .add_source(
            config::Environment::with_prefix("ENLIGHTEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::EnlightenError;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = parse("");
        assert_eq!(settings.utc_offset, -5);
        assert_eq!(settings.time_step, 15);
        assert_eq!(settings.base_url, "https://enlighten.enphaseenergy.com");
        assert!(!settings.persistence.persist_session);
        assert!(settings.credentials().is_none());
        assert_eq!(settings.time_grid().unwrap().len(), 96);
    }

    #[test]
    fn test_overrides_and_nested_persistence() {
        let settings = parse(
            r#"
            utc_offset = 1
            time_step = 5
            username = "me@example.com"
            password = "secret"

            [persistence]
            persist_config = true
            config_file = "state/config.toml"
            "#,
        );
        assert_eq!(settings.time_grid().unwrap().len(), 288);
        assert_eq!(settings.credentials(), Some(("me@example.com", "secret")));
        assert!(settings.persistence.persist_config);
        assert_eq!(
            settings.persistence.config_file,
            PathBuf::from("state/config.toml")
        );
        assert_eq!(
            settings.persistence.session_file,
            PathBuf::from("tmp/enphase_session.toml")
        );
    }

    #[test]
    fn test_invalid_step_is_configuration_error() {
        let settings = parse("time_step = 7");
        assert!(matches!(
            settings.time_grid(),
            Err(EnlightenError::Configuration(_))
        ));
    }
}
