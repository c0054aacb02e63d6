//! Simulation Configuration
//!
//! Every parameter is validated by [`SimulationConfigBuilder::build`] before
//! any shared state exists. A [`SimulationConfig`] value is therefore always
//! runnable; the simulator never has to report a configuration problem
//! mid-run.

use super::resources::{Instances, ResourceType};
use super::victim::{Heuristic, UnknownHeuristic};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Default period between detector ticks
pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_secs(2);

/// Default upper bound of the pause between two resource requests
pub const DEFAULT_MAX_THINK_TIME: Duration = Duration::from_secs(1);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rejected simulation parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// At least one worker thread is required
    #[error("Thread count must be at least 1")]
    NoThreads,

    /// At least one resource type is required
    #[error("At least one resource type is required")]
    NoResourceTypes,

    /// Resource type with a blank name
    #[error("Resource type #{index} has an empty name")]
    EmptyResourceName {
        /// Position of the offending type
        index: usize,
    },

    /// Two resource types share a name
    #[error("Resource type '{0}' is declared more than once")]
    DuplicateResourceName(String),

    /// The detector needs a non-zero period
    #[error("Deadlock detection interval must be greater than zero")]
    ZeroDetectionInterval,

    /// A pause bound too large to schedule as a deadline
    #[error("{field} of {value:?} is too large to schedule")]
    DurationTooLarge {
        /// Offending parameter
        field: &'static str,
        /// Value as given
        value: Duration,
    },

    /// Heuristic selector not recognised
    #[error(transparent)]
    UnknownHeuristic(#[from] UnknownHeuristic),

    /// Resource spec not of the form `name=count`
    #[error("Invalid resource spec '{spec}': {reason}")]
    InvalidResourceSpec {
        /// Text as given
        spec: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource Spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resource type declaration, parsed from `name=count`
///
/// # Example
///
/// ```rust
/// use stalemate_twin::domain::config::ResourceSpec;
///
/// let spec: ResourceSpec = "printer=3".parse().unwrap();
/// assert_eq!(spec.name, "printer");
/// assert_eq!(spec.max_instances, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource type name
    pub name: String,
    /// Total instances
    pub max_instances: Instances,
}

impl ResourceSpec {
    /// Create a spec directly
    pub fn new(name: impl Into<String>, max_instances: Instances) -> Self {
        Self {
            name: name.into(),
            max_instances,
        }
    }
}

impl FromStr for ResourceSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::InvalidResourceSpec {
            spec: s.to_string(),
            reason,
        };

        let (name, count) = s.split_once('=').ok_or_else(|| invalid("expected name=count"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        let max_instances = count
            .trim()
            .parse::<Instances>()
            .map_err(|_| invalid("count is not a non-negative integer"))?;

        Ok(Self::new(name, max_instances))
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.max_instances)
    }
}

impl From<&ResourceSpec> for ResourceType {
    fn from(spec: &ResourceSpec) -> Self {
        ResourceType::new(spec.name.clone(), spec.max_instances)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validated Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validated simulation parameters
///
/// Only obtainable through [`SimulationConfigBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    num_threads: usize,
    resources: Vec<ResourceSpec>,
    detection_interval: Duration,
    heuristic: Heuristic,
    seed: u64,
    max_think_time: Duration,
}

impl SimulationConfig {
    /// Start a builder with defaults
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
    }

    /// Worker thread count
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Resource type declarations, in index order
    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    /// Resource types for the state model
    pub fn resource_types(&self) -> Vec<ResourceType> {
        self.resources.iter().map(ResourceType::from).collect()
    }

    /// Period between detector ticks
    pub fn detection_interval(&self) -> Duration {
        self.detection_interval
    }

    /// Victim selection heuristic
    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    /// Master seed for the per-thread random streams
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Upper bound of the pause between two resource requests
    pub fn max_think_time(&self) -> Duration {
        self.max_think_time
    }

    /// Bounds of the hold pause before a worker releases everything
    ///
    /// `[0.7 × interval, 1.5 × interval]`
    pub fn hold_time_range(&self) -> (Duration, Duration) {
        (
            self.detection_interval.mul_f64(0.7),
            self.detection_interval.mul_f64(1.5),
        )
    }
}

/// Builder for [`SimulationConfig`]
///
/// # Defaults
///
/// - detection interval: 2 s
/// - heuristic: `max-total`
/// - seed: 0
/// - max think time: 1 s
///
/// Thread count and resource types have no default and must be set.
///
/// # Example
///
/// ```rust
/// use stalemate_twin::domain::{Heuristic, SimulationConfig};
/// use std::time::Duration;
///
/// let config = SimulationConfig::builder()
///     .num_threads(4)
///     .resource("disk", 3)
///     .resource("tape", 2)
///     .detection_interval(Duration::from_millis(500))
///     .heuristic(Heuristic::MinTotal)
///     .seed(7)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.resources().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationConfigBuilder {
    num_threads: usize,
    resources: Vec<ResourceSpec>,
    detection_interval: Duration,
    heuristic: Heuristic,
    seed: u64,
    max_think_time: Duration,
}

impl SimulationConfigBuilder {
    /// Create a builder with default timing, heuristic, and seed
    pub fn new() -> Self {
        Self {
            num_threads: 0,
            resources: Vec::new(),
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            heuristic: Heuristic::MaxTotal,
            seed: 0,
            max_think_time: DEFAULT_MAX_THINK_TIME,
        }
    }

    /// Set worker thread count
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Append one resource type
    pub fn resource(mut self, name: impl Into<String>, max_instances: Instances) -> Self {
        self.resources.push(ResourceSpec::new(name, max_instances));
        self
    }

    /// Replace all resource types
    pub fn resources(mut self, resources: impl IntoIterator<Item = ResourceSpec>) -> Self {
        self.resources = resources.into_iter().collect();
        self
    }

    /// Set the detector period
    pub fn detection_interval(mut self, interval: Duration) -> Self {
        self.detection_interval = interval;
        self
    }

    /// Set the victim selection heuristic
    pub fn heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Set the heuristic from a selector number or name
    ///
    /// # Errors
    ///
    /// `UnknownHeuristic` if the selector is not recognised.
    pub fn heuristic_selector(mut self, selector: &str) -> Result<Self, ConfigError> {
        self.heuristic = selector.parse()?;
        Ok(self)
    }

    /// Set the master seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the upper bound of the pause between requests
    ///
    /// Zero disables the pause.
    pub fn max_think_time(mut self, max: Duration) -> Self {
        self.max_think_time = max;
        self
    }

    /// Validate and freeze the configuration
    ///
    /// # Errors
    ///
    /// - `NoThreads`: thread count is zero
    /// - `NoResourceTypes`: no resource type declared
    /// - `EmptyResourceName` / `DuplicateResourceName`: bad names
    /// - `ZeroDetectionInterval`: detector period is zero
    /// - `DurationTooLarge`: a pause bound (detector period, its 1.5x hold
    ///   bound, or the think time) cannot be added to the current instant
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.resources.is_empty() {
            return Err(ConfigError::NoResourceTypes);
        }

        let mut seen = HashSet::new();
        for (index, spec) in self.resources.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::EmptyResourceName { index });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateResourceName(spec.name.clone()));
            }
        }

        if self.detection_interval.is_zero() {
            return Err(ConfigError::ZeroDetectionInterval);
        }

        let hold_max = self.detection_interval.checked_mul(3).map(|d| d / 2);
        if hold_max.and_then(schedulable).is_none() {
            return Err(ConfigError::DurationTooLarge {
                field: "detection interval",
                value: self.detection_interval,
            });
        }
        if schedulable(self.max_think_time).is_none() {
            return Err(ConfigError::DurationTooLarge {
                field: "max think time",
                value: self.max_think_time,
            });
        }

        Ok(SimulationConfig {
            num_threads: self.num_threads,
            resources: self.resources,
            detection_interval: self.detection_interval,
            heuristic: self.heuristic,
            seed: self.seed,
            max_think_time: self.max_think_time,
        })
    }
}

/// Deadline `duration` from now, if it fits in an `Instant`
fn schedulable(duration: Duration) -> Option<Instant> {
    Instant::now().checked_add(duration)
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
