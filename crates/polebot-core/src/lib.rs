use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_ORIENTATION_Z: f64 = 0.0;
pub const DEFAULT_ORIENTATION_W: f64 = 1.0;
pub const DEFAULT_TOLERANCE_XY: f64 = 0.3;
pub const DEFAULT_TOLERANCE_YAW: f64 = 0.5;

pub const DEFAULT_WAIT_TIME_S: u32 = 5;
pub const DEFAULT_TIMEOUT_S: u32 = 60;
pub const DEFAULT_RETRY_COUNT: u32 = 0;

pub const DEFAULT_MAP_RESOLUTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalSetId(pub i64);

impl fmt::Display for GoalSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(pub i64);

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionId(pub i64);

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a mission advances from one goal to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextGoalTrigger {
    #[default]
    Auto,
    Manual,
    Wait,
    Sensor,
}

impl NextGoalTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Wait => "wait",
            Self::Sensor => "sensor",
        }
    }

    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "manual" => Self::Manual,
            "wait" => Self::Wait,
            "sensor" => Self::Sensor,
            _ => Self::Auto,
        }
    }
}

/// What the robot does when it cannot reach a goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Skip,
    Retry,
    Abort,
}

impl FailurePolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Retry => "retry",
            Self::Abort => "abort",
        }
    }

    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "retry" => Self::Retry,
            "abort" => Self::Abort,
            _ => Self::Skip,
        }
    }
}

/// A 2D navigation target with arrival tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position_x: f64,
    pub position_y: f64,
    pub orientation_z: f64,
    pub orientation_w: f64,
    pub tolerance_xy: f64,
    pub tolerance_yaw: f64,
}

impl Pose {
    /// Pose at `(x, y)` facing the map's x axis, with default tolerances.
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position_x: x,
            position_y: y,
            orientation_z: DEFAULT_ORIENTATION_Z,
            orientation_w: DEFAULT_ORIENTATION_W,
            tolerance_xy: DEFAULT_TOLERANCE_XY,
            tolerance_yaw: DEFAULT_TOLERANCE_YAW,
        }
    }
}

/// Occupancy-grid metadata for a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    pub resolution: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for MapMetadata {
    fn default() -> Self {
        Self { resolution: DEFAULT_MAP_RESOLUTION, origin_x: 0.0, origin_y: 0.0, width: 0, height: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub metadata: MapMetadata,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSet {
    pub id: GoalSetId,
    pub name: String,
    pub map_id: i64,
    pub map_name: String,
    pub description: Option<String>,
    pub total_goals: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub goal_set_id: GoalSetId,
    pub sequence_number: u32,
    #[serde(flatten)]
    pub pose: Pose,
}

/// A goal set together with its goals in sequence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSetDetail {
    #[serde(flatten)]
    pub goal_set: GoalSet,
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Trigger and retry settings attached to one step of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalTransition {
    pub next_goal_trigger: NextGoalTrigger,
    pub wait_time: u32,
    pub sensor_type: Option<String>,
    pub sensor_condition: Option<String>,
    pub timeout: u32,
    pub retry_count: u32,
    pub on_failure: FailurePolicy,
}

impl Default for GoalTransition {
    fn default() -> Self {
        Self {
            next_goal_trigger: NextGoalTrigger::Auto,
            wait_time: DEFAULT_WAIT_TIME_S,
            sensor_type: None,
            sensor_condition: None,
            timeout: DEFAULT_TIMEOUT_S,
            retry_count: DEFAULT_RETRY_COUNT,
            on_failure: FailurePolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub goal_count: u32,
    pub last_executed_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// One step of a mission: a reference to a goal plus how to leave it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionGoal {
    pub id: i64,
    pub mission_id: MissionId,
    pub goal_id: GoalId,
    pub goal_set_id: GoalSetId,
    pub sequence_number: u32,
    #[serde(flatten)]
    pub pose: Pose,
    #[serde(flatten)]
    pub transition: GoalTransition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDetail {
    #[serde(flatten)]
    pub mission: Mission,
    pub goals: Vec<MissionGoal>,
}

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
