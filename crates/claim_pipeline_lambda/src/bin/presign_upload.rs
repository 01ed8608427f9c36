use aws_sdk_s3::presigning::PresigningConfig;
use claim_pipeline_lambda::adapters::presign::{PresignRequest, UploadPresigner};
use claim_pipeline_lambda::config::PresignConfig;
use claim_pipeline_lambda::handlers::presign::{handle_presign_event, ApiGatewayResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::error;

struct S3UploadPresigner {
    client: aws_sdk_s3::Client,
}

impl UploadPresigner for S3UploadPresigner {
    fn presign_put(&self, request: &PresignRequest) -> Result<String, String> {
        let client = self.client.clone();
        let request = request.clone();
        let presigning = PresigningConfig::expires_in(request.expires_in)
            .map_err(|error| format!("invalid presign expiry: {error}"))?;

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(request.bucket)
                    .key(request.key)
                    .set_content_type(request.content_type)
                    .presigned(presigning)
                    .await
                    .map(|presigned| presigned.uri().to_string())
                    .map_err(|error| {
                        format!(
                            "failed to presign put_object: {}",
                            aws_sdk_s3::error::DisplayErrorContext(&error)
                        )
                    })
            })
        })
    }
}

async fn handle_request(
    config: &PresignConfig,
    presigner: &S3UploadPresigner,
    event: LambdaEvent<Value>,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_presign_event(&event.payload, config, presigner))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let config = PresignConfig::from_env().map_err(|error| {
        error!(error = %error, "invalid presign configuration");
        error
    })?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let presigner = S3UploadPresigner {
        client: aws_sdk_s3::Client::new(&aws_config),
    };

    let config = &config;
    let presigner = &presigner;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(config, presigner, event).await
    }))
    .await
}
