//! Wire types for the upload protocol.
//!
//! ```text
//! POST /api/upload/start        {category, commitId}        -> {uploadToken, presignedReportUrl, webUrl}
//! POST /api/upload/attachments  {uploadToken, attachmentIds} -> [{attachmentId, presignedUrl}]
//! PUT  <presigned url>          body
//! POST /api/upload/finish       {uploadToken}               -> {webUrl}
//! ```

use serde::{Deserialize, Serialize};

pub const START_PATH: &str = "/api/upload/start";
pub const ATTACHMENTS_PATH: &str = "/api/upload/attachments";
pub const FINISH_PATH: &str = "/api/upload/finish";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest<'a> {
    pub category: &'a str,
    pub commit_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub upload_token: String,
    pub presigned_report_url: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest<'a> {
    pub upload_token: &'a str,
    pub attachment_ids: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedAttachment {
    pub attachment_id: String,
    #[serde(default)]
    pub presigned_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest<'a> {
    pub upload_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResponse {
    pub web_url: String,
}

/// Join an endpoint base and an API path, tolerating a trailing slash.
pub fn api_url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("https://api.testrelay.dev/", START_PATH),
            "https://api.testrelay.dev/api/upload/start"
        );
        assert_eq!(
            api_url("http://localhost:8080", FINISH_PATH),
            "http://localhost:8080/api/upload/finish"
        );
    }

    #[test]
    fn test_wire_names() {
        let req = PresignRequest {
            upload_token: "tok",
            attachment_ids: vec!["a", "b"],
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"uploadToken":"tok","attachmentIds":["a","b"]}"#
        );

        let resp: StartResponse = serde_json::from_str(
            r#"{"uploadToken":"t","presignedReportUrl":"https://s3/r","webUrl":"https://app/r/1"}"#,
        )
        .unwrap();
        assert_eq!(resp.presigned_report_url, "https://s3/r");
    }
}
