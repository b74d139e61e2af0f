//! Configuration system for Corridor.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CORRIDOR_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/corridor/config.toml
//!   3. ~/.config/corridor/config.toml

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::geometry::{Area, Axis, Segment, Vector3};
use crate::wire::{Address, MAX_MESSAGES_PER_PACKET};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    pub node: NodeConfig,
    pub timing: TimingConfig,
    pub radio: RadioConfig,
    pub road: RoadConfig,
    pub planner: PlannerConfig,
    pub global: GlobalConfig,
    pub mobility: MobilityConfig,
}

/// Part a node plays in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Car,
    LocalController,
    GlobalController,
    Other,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "car" => Ok(Role::Car),
            "local_controller" => Ok(Role::LocalController),
            "global_controller" => Ok(Role::GlobalController),
            "other" => Ok(Role::Other),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub role: Role,
    /// Control-channel address. Stable identity, originator of every message.
    pub cch_address: Address,
    /// Service-channel address. The vehicle's data address.
    pub sch_address: Address,
    /// Seed for jitter. Unset = seeded from entropy.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub hello_interval_ms: u64,
    /// Relay-chain recomputation period on local controllers.
    pub recompute_interval_ms: u64,
    /// A vehicle issues at most one route request per destination in each
    /// window of this length.
    pub discovery_interval_ms: u64,
    /// Queued messages are flushed as soon as this many are waiting.
    pub max_messages_per_packet: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub signal_range: f64,
    pub port: u16,
    pub broadcast_address: Ipv4Addr,
    pub bind_address: Ipv4Addr,
}

/// Explicit segment bounds. Overrides derivation from the controller position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentOverride {
    pub axis: Axis,
    pub start: f64,
    pub end: f64,
    pub lateral: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Grid spacing of the road layout.
    pub road_length: f64,
    pub segment_half_length: f64,
    pub segment_half_width: f64,
    /// Vehicles whose extrapolated position leaves this box are evicted.
    pub area_min: [f64; 2],
    pub area_max: [f64; 2],
    /// Destination installed along a chain before any real destination is
    /// known. Stands in for "the far end of this segment".
    pub road_end: Address,
    pub segment: Option<SegmentOverride>,
}

/// Relay-chain selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStrategy {
    Greedy,
    TakeAll,
    RangeGraph,
}

impl std::str::FromStr for ChainStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(ChainStrategy::Greedy),
            "take_all" => Ok(ChainStrategy::TakeAll),
            "range_graph" => Ok(ChainStrategy::RangeGraph),
            other => Err(format!("unknown chain strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub strategy: ChainStrategy,
    /// Vehicles this close to the far end are never chosen.
    pub far_end_margin: f64,
    /// Take-all only forms a chain from buckets at least this large.
    pub take_all_min_members: usize,
    /// Range-graph edge threshold as a fraction of the signal range.
    pub range_graph_factor: f64,
    /// Appoint chain members as forwarders after every planning cycle.
    pub send_appointments: bool,
}

/// Which segment of the fixed graph a local controller owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentAssignment {
    pub controller: Address,
    pub segment: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// A chain reported with this many members or fewer disables its edges.
    pub min_chain_len: u32,
    pub segments: Vec<SegmentAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    pub position: Vector3,
    pub velocity: Vector3,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::Other,
            cch_address: Ipv4Addr::UNSPECIFIED,
            sch_address: Ipv4Addr::UNSPECIFIED,
            seed: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hello_interval_ms: 1000,
            recompute_interval_ms: 5000,
            discovery_interval_ms: 5000,
            max_messages_per_packet: MAX_MESSAGES_PER_PACKET,
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            signal_range: 400.0,
            port: 419,
            broadcast_address: Ipv4Addr::BROADCAST,
            bind_address: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            road_length: 1000.0,
            segment_half_length: 485.0,
            segment_half_width: 14.0,
            area_min: [0.0, 0.0],
            area_max: [3000.0, 3000.0],
            road_end: Ipv4Addr::UNSPECIFIED,
            segment: None,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            strategy: ChainStrategy::Greedy,
            far_end_margin: 20.0,
            take_all_min_members: 4,
            range_graph_factor: 0.85,
            send_appointments: false,
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            min_chain_len: 2,
            segments: Vec::new(),
        }
    }
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl TimingConfig {
    pub fn hello_interval(&self) -> Duration {
        Duration::from_millis(self.hello_interval_ms)
    }

    pub fn recompute_interval(&self) -> Duration {
        Duration::from_millis(self.recompute_interval_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    /// Records silent for longer than this are evicted.
    pub fn neighbor_timeout(&self) -> Duration {
        self.hello_interval() * 2
    }

    /// Upper bound of the random delay before a queued message is flushed.
    pub fn max_jitter(&self) -> Duration {
        self.hello_interval() / 4
    }
}

impl RoadConfig {
    /// Segment owned by a controller at `position`.
    pub fn segment_for(&self, position: &Vector3) -> Segment {
        match self.segment {
            Some(s) => Segment::new(s.axis, s.start, s.end, s.lateral, self.segment_half_width),
            None => Segment::around(
                position,
                self.road_length,
                self.segment_half_length,
                self.segment_half_width,
            ),
        }
    }

    pub fn area(&self) -> Area {
        Area {
            min: self.area_min,
            max: self.area_max,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("corridor")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CorridorConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            CorridorConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CORRIDOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CorridorConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CORRIDOR_* overrides. `lookup` resolves a variable name; the
    /// loader passes the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
            v.and_then(|v| v.parse().ok())
        }

        if let Some(v) = parsed(lookup("CORRIDOR_NODE__ROLE")) {
            self.node.role = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_NODE__CCH_ADDRESS")) {
            self.node.cch_address = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_NODE__SCH_ADDRESS")) {
            self.node.sch_address = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_NODE__SEED")) {
            self.node.seed = Some(v);
        }
        if let Some(v) = parsed(lookup("CORRIDOR_RADIO__PORT")) {
            self.radio.port = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_RADIO__SIGNAL_RANGE")) {
            self.radio.signal_range = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_RADIO__BROADCAST_ADDRESS")) {
            self.radio.broadcast_address = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_TIMING__HELLO_INTERVAL_MS")) {
            self.timing.hello_interval_ms = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_TIMING__RECOMPUTE_INTERVAL_MS")) {
            self.timing.recompute_interval_ms = v;
        }
        if let Some(v) = parsed(lookup("CORRIDOR_PLANNER__STRATEGY")) {
            self.planner.strategy = v;
        }
    }
}
