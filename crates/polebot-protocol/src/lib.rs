use polebot_core::{
    Category, CategoryId, FailurePolicy, Goal, GoalId, GoalSet, GoalSetDetail, GoalSetId,
    GoalTransition, Map, MapMetadata, Mission, MissionDetail, MissionId, NextGoalTrigger, Pose,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Goal pose as sent by clients. `x` and `y` are required; the rest default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseInput {
    #[serde(alias = "position_x")]
    pub x: Option<f64>,
    #[serde(alias = "position_y")]
    pub y: Option<f64>,
    pub orientation_z: Option<f64>,
    pub orientation_w: Option<f64>,
    pub tolerance_xy: Option<f64>,
    pub tolerance_yaw: Option<f64>,
}

impl PoseInput {
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Resolves defaults; `None` when either coordinate is missing.
    #[must_use]
    pub fn to_pose(&self) -> Option<Pose> {
        let base = Pose::at(self.x?, self.y?);
        Some(Pose {
            orientation_z: self.orientation_z.unwrap_or(base.orientation_z),
            orientation_w: self.orientation_w.unwrap_or(base.orientation_w),
            tolerance_xy: self.tolerance_xy.unwrap_or(base.tolerance_xy),
            tolerance_yaw: self.tolerance_yaw.unwrap_or(base.tolerance_yaw),
            ..base
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapInfo {
    pub resolution: Option<f64>,
    pub origin_x: Option<f64>,
    pub origin_y: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MapInfo {
    #[must_use]
    pub fn merged_over(&self, base: MapMetadata) -> MapMetadata {
        MapMetadata {
            resolution: self.resolution.unwrap_or(base.resolution),
            origin_x: self.origin_x.unwrap_or(base.origin_x),
            origin_y: self.origin_y.unwrap_or(base.origin_y),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveMapRequest {
    pub name: Option<String>,
    #[serde(flatten)]
    pub info: MapInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveGoalSetRequest {
    pub map_name: Option<String>,
    pub set_name: Option<String>,
    pub goals: Option<Vec<PoseInput>>,
    pub map_info: Option<MapInfo>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionInput {
    pub next_goal_trigger: Option<NextGoalTrigger>,
    pub wait_time: Option<u32>,
    pub sensor_type: Option<String>,
    pub sensor_condition: Option<String>,
    pub timeout: Option<u32>,
    pub retry_count: Option<u32>,
    pub on_failure: Option<FailurePolicy>,
}

impl TransitionInput {
    #[must_use]
    pub fn resolve(&self) -> GoalTransition {
        let defaults = GoalTransition::default();
        GoalTransition {
            next_goal_trigger: self.next_goal_trigger.unwrap_or(defaults.next_goal_trigger),
            wait_time: self.wait_time.unwrap_or(defaults.wait_time),
            sensor_type: self.sensor_type.clone(),
            sensor_condition: self.sensor_condition.clone(),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            retry_count: self.retry_count.unwrap_or(defaults.retry_count),
            on_failure: self.on_failure.unwrap_or(defaults.on_failure),
        }
    }
}

/// One entry of a mission's goal list: either an existing goal by id or an
/// inline pose that is stored as a new goal in `goal_set`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionGoalRef {
    pub goal_id: Option<GoalId>,
    pub goal_set: Option<String>,
    #[serde(flatten)]
    pub pose: PoseInput,
    #[serde(flatten)]
    pub transition: TransitionInput,
}

impl MissionGoalRef {
    #[must_use]
    pub fn existing(goal_id: GoalId) -> Self {
        Self { goal_id: Some(goal_id), ..Self::default() }
    }

    #[must_use]
    pub fn inline(goal_set: impl Into<String>, pose: PoseInput) -> Self {
        Self { goal_set: Some(goal_set.into()), pose, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Goal set receiving inline goals that do not name one themselves.
    pub goal_set: Option<String>,
    pub goals: Option<Vec<MissionGoalRef>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaceMissionGoalsRequest {
    pub goal_set: Option<String>,
    pub goals: Option<Vec<MissionGoalRef>>,
}

/// Every successful response is `{"success": true, ...body}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: T) -> Self {
        Self { success: true, body }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapBody {
    pub map: Map,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapList {
    pub maps: Vec<Map>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoalSetSaved {
    pub goal_set_id: GoalSetId,
    pub total_goals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSetList {
    pub goal_sets: Vec<GoalSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSetBody {
    pub goal_set: GoalSetDetail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoalAppended {
    pub sequence_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalBody {
    pub goal: Goal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBody {
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionBody {
    pub mission: MissionDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionList {
    pub missions: Vec<Mission>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MissionExecuted {
    pub mission_id: MissionId,
    pub last_executed_ms: u64,
}

/// Latest state pushed by a robot, relayed verbatim to viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub message_id: Uuid,
    pub robot_id: String,
    pub sent_at_ms: u64,
    pub payload: serde_json::Value,
}

impl TelemetryEnvelope {
    #[must_use]
    pub fn new(robot_id: impl Into<String>, payload: serde_json::Value, sent_at_ms: u64) -> Self {
        Self { message_id: Uuid::new_v4(), robot_id: robot_id.into(), sent_at_ms, payload }
    }
}

/// Frame sent to telemetry viewers; `data` is null until a robot publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub data: Option<TelemetryEnvelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPublish {
    pub robot_id: Option<String>,
    pub payload: serde_json::Value,
}
