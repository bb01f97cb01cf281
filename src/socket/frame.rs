use forest_common::FUNCTIONS_RESULT;
use serde_json::Value;

/// One server→client frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `{"result": "functions", "functions": [...]}`, the capability list.
    Functions(Vec<String>),
    /// Anything else: a log or event record for the event log.
    Event(Value),
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value))
    }

    pub fn classify(value: Value) -> Self {
        match capability_list(&value) {
            Some(functions) => InboundFrame::Functions(functions),
            None => InboundFrame::Event(value),
        }
    }
}

fn capability_list(value: &Value) -> Option<Vec<String>> {
    if value.get("result").and_then(Value::as_str) != Some(FUNCTIONS_RESULT) {
        return None;
    }
    value
        .get("functions")?
        .as_array()?
        .iter()
        .map(|f| f.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn functions_frame_is_capabilities() {
        let text = r#"{"result": "functions", "functions": ["login_user", "get_leaves"]}"#;
        let frame = InboundFrame::parse(text).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Functions(vec!["login_user".to_string(), "get_leaves".to_string()])
        );
    }

    #[test]
    fn other_frames_are_events() {
        let frame = InboundFrame::parse(r#"{"result": "success", "leaves": []}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Event(_)));

        let frame = InboundFrame::parse(r#"{"_id": "1", "raw": "hello"}"#).unwrap();
        assert_eq!(frame, InboundFrame::Event(json!({"_id": "1", "raw": "hello"})));
    }

    #[test]
    fn malformed_functions_list_is_an_event() {
        let frame = InboundFrame::classify(json!({"result": "functions", "functions": [1, 2]}));
        assert!(matches!(frame, InboundFrame::Event(_)));

        let frame = InboundFrame::classify(json!({"result": "functions"}));
        assert!(matches!(frame, InboundFrame::Event(_)));
    }

    #[test]
    fn non_json_frame_is_an_error() {
        assert!(InboundFrame::parse("plain text").is_err());
    }
}
