use std::collections::BTreeMap;

use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{AccidentMcp, helpers};

/// Named numeric features for a model prediction.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PredictParams {
    /// Feature name to value; must match the loaded model's feature list exactly.
    pub features: BTreeMap<String, f64>,
}

#[tool_router(router = tool_router_inference, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Predict an accident severity code (1-4) from named features using the loaded severity model.")]
    async fn predict_severity(
        &self,
        Parameters(params): Parameters<PredictParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let prediction = self
            .control()
            .predict_severity(&params.features)
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(prediction)?]))
    }

    #[tool(description = "Predict a congestion-duration bucket (short, moderate, long, extended) from named features using the loaded congestion model.")]
    async fn predict_congestion_duration(
        &self,
        Parameters(params): Parameters<PredictParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let prediction = self
            .control()
            .predict_congestion(&params.features)
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(prediction)?]))
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::ErrorCode;

    use super::*;
    use crate::tools::fixture;

    #[tokio::test]
    async fn missing_model_surfaces_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = fixture::server(&dir);
        let params = PredictParams {
            features: BTreeMap::from([("Visibility_mi".to_string(), 1.0)]),
        };
        let err = server
            .predict_severity(Parameters(params.clone()))
            .await
            .expect_err("no severity model loaded");
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
        assert_eq!(fixture::kind(&err), Some("unavailable"));

        let err = server
            .predict_congestion_duration(Parameters(params))
            .await
            .expect_err("no congestion model loaded");
        assert_eq!(fixture::kind(&err), Some("unavailable"));
    }
}
