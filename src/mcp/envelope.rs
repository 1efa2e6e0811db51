//! Uniform reply shape for tool calls.

use serde::Serialize;
use serde_json::Value;

/// A content block of a tool result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Tool result carrying both a text rendering and the structured payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub content: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Envelope {
    /// A failed tool execution, reported to the client as a result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    /// The text of the first content block
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(Content::Text { text }) => text,
            None => "",
        }
    }
}

/// Wrap a payload: strings are used verbatim, anything else is pretty-printed
pub fn wrap(payload: Value) -> Envelope {
    let text = match &payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };

    Envelope {
        content: vec![Content::Text { text }],
        structured_content: Some(payload),
        is_error: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_payload_is_verbatim() {
        let envelope = wrap(json!("done"));
        assert_eq!(envelope.text(), "done");
        assert_eq!(envelope.structured_content, Some(json!("done")));
    }

    #[test]
    fn test_object_payload_is_pretty_printed() {
        let payload = json!({ "spreadsheetId": "x", "title": "Report" });
        let envelope = wrap(payload.clone());

        assert_eq!(envelope.text(), serde_json::to_string_pretty(&payload).unwrap());
        assert!(envelope.text().contains('\n'));
        assert_eq!(envelope.structured_content, Some(payload));
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(wrap(json!({ "a": 1 }))).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["structuredContent"], json!({ "a": 1 }));
        assert!(value.get("isError").is_none());

        let value = serde_json::to_value(Envelope::error("boom")).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["text"], "boom");
        assert!(value.get("structuredContent").is_none());
    }
}
