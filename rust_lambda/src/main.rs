use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
use upload_classifier::{function_handler, Config};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt()
        .json()
        .with_env_filter(
            tracing::subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .without_time()
        .init();
    let config = Config::from_env()?;
    tracing::info!(bucket = ?config.bucket_name, max_object_bytes = config.max_object_bytes, "Starting upload classifier");
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let s3_client = S3Client::new(&shared_config);
    run(service_fn(|event| function_handler(event, &s3_client, &config))).await
}
