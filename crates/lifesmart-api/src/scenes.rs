// Scene endpoints: SceneGet, SceneSet

use serde::Serialize;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::Scene;
use crate::sign::params_from;

/// The cloud expects scene activation under its own request id.
const SCENE_SET_REQUEST_ID: u32 = 101;

#[derive(Serialize)]
struct SceneRef<'a> {
    agt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

impl ApiClient {
    /// Scenes stored on hub `agt`.
    pub async fn get_scenes(&self, agt: &str) -> Result<Vec<Scene>, Error> {
        let params = params_from(&SceneRef { agt, id: None })?;
        self.call("api.SceneGet", "SceneGet", Some(&params)).await
    }

    /// Trigger scene `id` on hub `agt`. Returns the vendor result code.
    pub async fn set_scene(&self, agt: &str, id: &str) -> Result<i64, Error> {
        let params = params_from(&SceneRef { agt, id: Some(id) })?;
        self.call_for_code("api.SceneSet", "SceneSet", &params, SCENE_SET_REQUEST_ID)
            .await
    }
}
