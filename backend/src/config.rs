use santa_core::{ForbiddenPairs, Participant, PinRegistry, Roster, SantaError};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse draw config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid draw config: {0}")]
    Invalid(#[from] SantaError),
    #[error("invalid PORT value: {0}")]
    Port(String),
}

/// Who takes part and under which rules, as read from `SANTA_CONFIG`.
#[derive(Debug, Clone, Deserialize)]
pub struct DrawConfig {
    pub roster: Roster,
    #[serde(default = "pins_required_by_default")]
    pub pin_required: bool,
    #[serde(default)]
    pub pins: HashMap<Participant, String>,
    #[serde(default)]
    pub forbidden_pairs: ForbiddenPairs,
}

fn pins_required_by_default() -> bool {
    true
}

impl DrawConfig {
    /// Eight-person roster used when no `SANTA_CONFIG` file is given.
    pub fn builtin() -> Result<Self, SantaError> {
        let names = [
            "Fortis", "Mara", "Diego", "Maryem", "Zaira", "Kami", "Laila", "Alek",
        ];
        let pins = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), (i + 1).to_string().repeat(4)))
            .collect();

        Ok(Self {
            roster: Roster::new(names)?,
            pin_required: true,
            pins,
            forbidden_pairs: ForbiddenPairs::new([("Fortis", "Mara")]),
        })
    }
}

/// Process-wide configuration, built once at start and never mutated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub roster: Roster,
    pub forbidden: ForbiddenPairs,
    pub pins: PinRegistry,
    pub admin_key: Option<String>,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn new(draw: DrawConfig, admin_key: Option<String>) -> Result<Self, ConfigError> {
        let pins = PinRegistry {
            required: draw.pin_required,
            pins: draw.pins,
        };
        draw.forbidden_pairs.check_against(&draw.roster)?;
        pins.check_against(&draw.roster)?;

        Ok(Self {
            roster: draw.roster,
            forbidden: draw.forbidden_pairs,
            pins,
            admin_key: admin_key.filter(|key| !key.is_empty()),
            db_path: PathBuf::from("raffle.db"),
            host: "0.0.0.0".to_string(),
            port: 5000,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let draw = match lookup("SANTA_CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                serde_json::from_str(&raw)?
            }
            None => DrawConfig::builtin()?,
        };

        let mut settings = Self::new(draw, lookup("ADMIN_KEY"))?;
        if let Some(path) = lookup("DB_PATH") {
            settings.db_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("HOST") {
            settings.host = host;
        }
        if let Some(port) = lookup("PORT") {
            settings.port = port.parse().map_err(|_| ConfigError::Port(port))?;
        }
        Ok(settings)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
