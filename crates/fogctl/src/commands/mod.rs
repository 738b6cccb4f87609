pub mod catalog;
pub mod fog;
pub mod microservice;
pub mod serve;

use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use tracing::debug;

use fogplane_control::ControlSettings;
use fogplane_core::{ControllerConfig, UserId};
use fogplane_state::StateStore;

/// What every command needs: the loaded config and the acting user.
pub struct Context {
    pub config: ControllerConfig,
    pub user_id: UserId,
}

impl Context {
    pub fn new(config: ControllerConfig, user_id: UserId) -> Self {
        Self { config, user_id }
    }

    pub fn open_store(&self) -> anyhow::Result<StateStore> {
        let path = &self.config.store.path;
        let store = StateStore::open(path)
            .with_context(|| format!("opening state store {}", path.display()))?;
        debug!(path = ?path, "state store opened");
        Ok(store)
    }

    pub fn settings(&self) -> ControlSettings {
        ControlSettings::from(&self.config)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
