//! TOML scenario files.
//!
//! ```toml
//! destinations = [[3, 1], [4, 1]]
//! obstacles = [[0, 5]]
//! # origins = [[0, 8], [1, 8]]   # defaults to the bottom two rows
//!
//! [grid]
//! columns = 10
//! rows = 10
//!
//! [simulation]
//! step_interval_ms = 250
//! algorithm = "astar"
//! priority = "manhattan"
//! diagonals = false
//! stall_threshold = 5
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use shapeshifter_core::{
    CellCoord, PriorityStrategy, RoutingAlgorithm, Scenario, SettingParseError,
    SimulationSettings, DEFAULT_STALL_THRESHOLD,
};
use thiserror::Error;

/// Errors raised while loading a scenario file.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML or does not match the expected layout.
    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A simulation setting names an unknown strategy.
    #[error(transparent)]
    Setting(#[from] SettingParseError),
}

/// Scenario file as written on disk.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ScenarioFile {
    pub(crate) grid: GridSection,
    #[serde(default)]
    pub(crate) destinations: Vec<(u32, u32)>,
    #[serde(default)]
    pub(crate) obstacles: Vec<(u32, u32)>,
    #[serde(default)]
    pub(crate) origins: Option<Vec<(u32, u32)>>,
    #[serde(default)]
    pub(crate) simulation: SimulationSection,
}

/// Grid dimensions.
#[derive(Clone, Copy, Debug, Deserialize)]
pub(crate) struct GridSection {
    pub(crate) columns: u32,
    pub(crate) rows: u32,
}

/// Optional run tunables; every field falls back to the built-in default.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SimulationSection {
    #[serde(default = "default_step_interval_ms")]
    pub(crate) step_interval_ms: u64,
    #[serde(default = "default_algorithm")]
    pub(crate) algorithm: String,
    #[serde(default = "default_priority")]
    pub(crate) priority: String,
    #[serde(default)]
    pub(crate) diagonals: bool,
    #[serde(default = "default_stall_threshold")]
    pub(crate) stall_threshold: u32,
}

fn default_step_interval_ms() -> u64 {
    1_000
}

fn default_algorithm() -> String {
    "astar".to_owned()
}

fn default_priority() -> String {
    "manhattan".to_owned()
}

fn default_stall_threshold() -> u32 {
    DEFAULT_STALL_THRESHOLD
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            algorithm: default_algorithm(),
            priority: default_priority(),
            diagonals: false,
            stall_threshold: default_stall_threshold(),
        }
    }
}

impl SimulationSection {
    /// Converts the textual section into typed settings.
    pub(crate) fn to_settings(&self) -> Result<SimulationSettings, ConfigError> {
        Ok(SimulationSettings {
            step_interval: Duration::from_millis(self.step_interval_ms),
            routing: self.algorithm.parse::<RoutingAlgorithm>()?,
            priority: self.priority.parse::<PriorityStrategy>()?,
            diagonal_moves: self.diagonals,
            stall_threshold: self.stall_threshold,
        })
    }
}

impl ScenarioFile {
    /// Reads and parses a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parses scenario TOML.
    pub(crate) fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Builds the scenario, generating fixed origins when none are listed.
    pub(crate) fn scenario(&self) -> Scenario {
        let destinations = cells(&self.destinations);
        let obstacles = cells(&self.obstacles);
        match &self.origins {
            Some(origins) => Scenario {
                columns: self.grid.columns,
                rows: self.grid.rows,
                origins: cells(origins),
                destinations,
                obstacles,
            },
            None => Scenario::with_fixed_origins(
                self.grid.columns,
                self.grid.rows,
                destinations,
                obstacles,
            ),
        }
    }
}

fn cells(pairs: &[(u32, u32)]) -> Vec<CellCoord> {
    pairs
        .iter()
        .map(|&(column, row)| CellCoord::new(column, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_scenario_parses() {
        let file = ScenarioFile::parse(include_str!("../scenarios/ring.toml"))
            .expect("bundled scenario parses");
        let scenario = file.scenario();

        assert_eq!(scenario.origins.len(), scenario.destinations.len());
        scenario.validate().expect("bundled scenario is valid");
        let settings = file.simulation.to_settings().expect("known strategies");
        assert_eq!(settings.step_interval, Duration::from_millis(250));
    }

    #[test]
    fn missing_simulation_table_uses_defaults() {
        let file = ScenarioFile::parse(
            r#"
            destinations = [[1, 1]]

            [grid]
            columns = 4
            rows = 4
            "#,
        )
        .expect("minimal scenario parses");

        let settings = file.simulation.to_settings().expect("defaults are valid");
        assert_eq!(settings, SimulationSettings::default());
        assert_eq!(file.scenario().origins, vec![CellCoord::new(0, 2)]);
    }

    #[test]
    fn explicit_origins_are_kept() {
        let file = ScenarioFile::parse(
            r#"
            destinations = [[0, 0]]
            origins = [[3, 3]]

            [grid]
            columns = 4
            rows = 4
            "#,
        )
        .expect("scenario parses");

        assert_eq!(file.scenario().origins, vec![CellCoord::new(3, 3)]);
    }

    #[test]
    fn unknown_algorithm_is_reported() {
        let file = ScenarioFile::parse(
            r#"
            [grid]
            columns = 4
            rows = 4

            [simulation]
            algorithm = "dijkstra"
            "#,
        )
        .expect("scenario parses");

        let error = file.simulation.to_settings().unwrap_err();
        assert!(matches!(error, ConfigError::Setting(_)));
    }
}
