//! The request envelope (`MessageBase`) carried by every request payload.

use serde::{Deserialize, Serialize};

/// Optional distributed-tracing span context, carried on the wire as `"ocsc"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingSpanContext {
    #[serde(rename = "TraceId")]
    pub trace_id: String,
    #[serde(rename = "SpanId")]
    pub span_id: String,
    #[serde(rename = "TraceOptions")]
    pub trace_options: u32,
    #[serde(rename = "TraceState", skip_serializing_if = "Option::is_none")]
    pub trace_state: Option<String>,
}

/// Fields common to every request payload. `ActivityId` MUST be echoed on the
/// matching response and on every error record produced while handling the
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBase {
    #[serde(rename = "ContainerId")]
    pub container_id: String,
    #[serde(rename = "ActivityId")]
    pub activity_id: String,
    #[serde(rename = "ocsc", default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingSpanContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_the_wire_renames() {
        let base = MessageBase {
            container_id: "c1".into(),
            activity_id: "a1".into(),
            tracing: None,
        };
        let json = serde_json::to_value(&base).unwrap();
        assert_eq!(json["ContainerId"], "c1");
        assert_eq!(json["ActivityId"], "a1");
        assert!(json.get("ocsc").is_none());
    }

    #[test]
    fn round_trips_with_tracing_span() {
        let base = MessageBase {
            container_id: "c1".into(),
            activity_id: "a1".into(),
            tracing: Some(TracingSpanContext {
                trace_id: "t".into(),
                span_id: "s".into(),
                trace_options: 1,
                trace_state: None,
            }),
        };
        let json = serde_json::to_string(&base).unwrap();
        let decoded: MessageBase = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.container_id, base.container_id);
        assert_eq!(decoded.tracing.unwrap().trace_id, "t");
    }
}
