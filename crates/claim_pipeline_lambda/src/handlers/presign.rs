use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::adapters::presign::{PresignRequest, UploadPresigner};
use crate::config::PresignConfig;
use crate::runtime::upload_keys::upload_object_key;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

pub fn handle_presign_event(
    event: &Value,
    config: &PresignConfig,
    presigner: &dyn UploadPresigner,
) -> ApiGatewayResponse {
    let filename = match query_parameter(event, "filename") {
        Some(raw) => match urlencoding::decode(raw) {
            Ok(decoded) if !decoded.trim().is_empty() => decoded.into_owned(),
            Ok(_) => return validation_error_response("filename must not be empty"),
            Err(error) => {
                warn!(error = %error, "filename is not valid percent-encoded UTF-8");
                return validation_error_response("filename is not valid UTF-8");
            }
        },
        None => return validation_error_response("Missing filename"),
    };
    let content_type = query_parameter(event, "contentType")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let request = PresignRequest {
        bucket: config.bucket.clone(),
        key: upload_object_key(&config.upload_folder, &filename),
        content_type,
        expires_in: config.url_ttl,
    };

    match presigner.presign_put(&request) {
        Ok(upload_url) => {
            info!(
                bucket = %request.bucket,
                key = %request.key,
                expires_in_secs = request.expires_in.as_secs(),
                "issued upload url"
            );
            success_response(json!({ "uploadUrl": upload_url }))
        }
        Err(cause) => {
            error!(bucket = %request.bucket, key = %request.key, error = %cause, "presign failed");
            error_response(
                500,
                json!({
                    "error": "internal_error",
                    "message": "Could not create an upload URL",
                }),
            )
        }
    }
}

fn query_parameter<'a>(event: &'a Value, name: &str) -> Option<&'a str> {
    event
        .get("queryStringParameters")
        .and_then(|params| params.get(name))
        .and_then(Value::as_str)
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn response_headers() -> Value {
    json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*",
    })
}

fn success_response(payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 200,
        headers: response_headers(),
        body: payload.to_string(),
    }
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: response_headers(),
        body: payload.to_string(),
    }
}
