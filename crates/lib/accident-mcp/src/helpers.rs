use std::borrow::Cow;

use accident_core::control::ControlError;
use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use serde_json::json;
use tracing::warn;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Maps a control-plane failure to an MCP error carrying `data.kind`.
pub fn map_err(err: ControlError) -> ErrorData {
    let code = match err {
        ControlError::InvalidArgument(_) | ControlError::SchemaMismatch(_) => {
            ErrorCode::INVALID_PARAMS
        }
        ControlError::Unavailable(_) => ErrorCode::RESOURCE_NOT_FOUND,
        ControlError::Store(_) => {
            warn!(error = %err, "store query failed");
            ErrorCode::INTERNAL_ERROR
        }
    };
    ErrorData {
        data: Some(json!({ "kind": err.kind() })),
        ..mcp_err(code, err.to_string())
    }
}
