use serde::{Deserialize, Serialize};

// Body of POST /api/summarize-person
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct SummaryRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

// Success body
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary: String,
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_uncertain: Option<bool>,
}

// Error body, shared by every non-200 status
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_uses_camel_case_and_omits_missing_flag() {
        let body = SummaryResponse {
            summary: "text".into(),
            photo_url: None,
            photo_uncertain: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"summary": "text", "photoUrl": null}));

        let body = SummaryResponse {
            summary: "text".into(),
            photo_url: Some("https://img/x.jpg".into()),
            photo_uncertain: Some(true),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["photoUrl"], "https://img/x.jpg");
        assert_eq!(json["photoUncertain"], true);
    }

    #[test]
    fn request_tolerates_missing_topic() {
        let req: SummaryRequest = serde_json::from_str("{}").unwrap();
        assert!(req.topic.is_none());
    }
}
