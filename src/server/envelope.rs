//! Tool response envelopes
//!
//! Every tool response is `{content: [{type: "text", text}], isError?}`.
//! Structured payloads serialize as two-space-indented JSON inside the
//! text block.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Plain text success
pub fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Plain text error envelope
pub fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

/// Structured success: JSON with two-space indentation
pub fn json_result<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(body) => CallToolResult::success(vec![Content::text(body)]),
        Err(e) => error_result(format!("Failed to serialize response: {}", e)),
    }
}

/// Structured error: JSON body flagged as an error
pub fn json_error<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(body) => CallToolResult::error(vec![Content::text(body)]),
        Err(e) => error_result(format!("Failed to serialize response: {}", e)),
    }
}

/// Envelope returned by every manage_index action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageIndexEnvelope {
    pub tool: &'static str,
    pub version: u32,
    pub action: &'static str,
    pub path: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
    pub human_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preflight: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ManageIndexEnvelope {
    pub fn new(action: &'static str, path: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            tool: "manage_index",
            version: 1,
            action,
            path: path.into(),
            status: status.into(),
            reason: None,
            message: String::new(),
            human_text: String::new(),
            warnings: None,
            hints: None,
            preflight: None,
            detail: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.human_text = message.clone();
        self.message = message;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.get_or_insert_with(Vec::new).push(warning.into());
        self
    }

    pub fn hints(mut self, hints: serde_json::Value) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn preflight(mut self, preflight: serde_json::Value) -> Self {
        self.preflight = Some(preflight);
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}
