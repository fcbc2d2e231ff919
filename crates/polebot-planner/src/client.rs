use anyhow::{Context, Result, anyhow, bail};
use polebot_core::{GoalSetDetail, Map, MissionDetail, MissionId};
use polebot_protocol::{
    ApiResponse, ErrorBody, GoalAppended, GoalBody, GoalSetBody, GoalSetList, GoalSetSaved,
    MapBody, MapList, MessageBody, MissionBody, MissionExecuted, MissionList, MissionRequest,
    PoseInput, SaveGoalSetRequest,
};
use reqwest::{Method, RequestBuilder, Url};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

/// Thin typed wrapper over the planning service's HTTP API.
pub struct PlannerClient {
    http: reqwest::Client,
    base: Url,
}

impl PlannerClient {
    pub fn new(server: &str) -> Result<Self> {
        let base = Url::parse(server).with_context(|| format!("invalid server url {server:?}"))?;
        if base.cannot_be_a_base() {
            bail!("invalid server url {server:?}");
        }
        Ok(Self { http: reqwest::Client::new(), base })
    }

    pub async fn list_maps(&self) -> Result<Vec<Map>> {
        let list: MapList = self.call(self.request(Method::GET, &["api", "maps"])?).await?;
        Ok(list.maps)
    }

    pub async fn get_map(&self, name: &str) -> Result<Map> {
        let body: MapBody = self.call(self.request(Method::GET, &["api", "maps", name])?).await?;
        Ok(body.map)
    }

    pub async fn list_goal_sets(&self, map: Option<&str>) -> Result<GoalSetList> {
        let mut request = self.request(Method::GET, &["api", "goal-sets"])?;
        if let Some(map) = map {
            request = request.query(&[("map", map)]);
        }
        self.call(request).await
    }

    pub async fn get_goal_set(&self, name: &str) -> Result<GoalSetDetail> {
        let body: GoalSetBody =
            self.call(self.request(Method::GET, &["api", "goal-sets", name])?).await?;
        Ok(body.goal_set)
    }

    pub async fn save_goal_set(&self, request: &SaveGoalSetRequest) -> Result<GoalSetSaved> {
        self.send_json(Method::POST, &["api", "goal-sets"], request).await
    }

    pub async fn delete_goal_set(&self, name: &str) -> Result<MessageBody> {
        self.call(self.request(Method::DELETE, &["api", "goal-sets", name])?).await
    }

    pub async fn append_goal(&self, set: &str, pose: &PoseInput) -> Result<GoalAppended> {
        self.send_json(Method::POST, &["api", "goal-sets", set, "goals"], pose).await
    }

    pub async fn update_goal(&self, set: &str, sequence: u32, pose: &PoseInput) -> Result<GoalBody> {
        let sequence = sequence.to_string();
        self.send_json(Method::PUT, &["api", "goal-sets", set, "goals", &sequence], pose).await
    }

    pub async fn remove_goal(&self, set: &str, sequence: u32) -> Result<MessageBody> {
        let sequence = sequence.to_string();
        self.call(self.request(Method::DELETE, &["api", "goal-sets", set, "goals", &sequence])?)
            .await
    }

    pub async fn list_missions(&self) -> Result<MissionList> {
        self.call(self.request(Method::GET, &["api", "missions"])?).await
    }

    pub async fn get_mission(&self, id: MissionId) -> Result<MissionDetail> {
        let id = id.to_string();
        let body: MissionBody =
            self.call(self.request(Method::GET, &["api", "missions", &id])?).await?;
        Ok(body.mission)
    }

    pub async fn create_mission(&self, request: &MissionRequest) -> Result<MissionDetail> {
        let body: MissionBody = self.send_json(Method::POST, &["api", "missions"], request).await?;
        Ok(body.mission)
    }

    pub async fn execute_mission(&self, id: MissionId) -> Result<MissionExecuted> {
        let id = id.to_string();
        self.call(self.request(Method::POST, &["api", "missions", &id, "execute"])?).await
    }

    pub async fn delete_mission(&self, id: MissionId) -> Result<MessageBody> {
        let id = id.to_string();
        self.call(self.request(Method::DELETE, &["api", "missions", &id])?).await
    }

    /// Joins `segments` onto the server url, percent-encoding each one so
    /// names containing `/`, `?` or `#` stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("server url {} cannot take a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        debug!(%method, %url, "planner request");
        Ok(self.http.request(method, url))
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.call(self.request(method, segments)?.json(body)).await
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response =
            request.send().await.with_context(|| format!("contacting server at {}", self.base))?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            bail!("server returned {status}: {}", error_message(&bytes));
        }
        let envelope: ApiResponse<T> =
            serde_json::from_slice(&bytes).context("decoding server response")?;
        Ok(envelope.body)
    }
}

fn error_message(bytes: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(ErrorBody { error, details: Some(details), .. }) => format!("{error} ({details})"),
        Ok(body) => body.error,
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
