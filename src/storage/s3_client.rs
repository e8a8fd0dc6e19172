// S3 client for attachment download/upload

use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};

pub struct S3Client {
    bucket: Box<Bucket>,
}

impl S3Client {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| AppError::Storage(format!("Invalid S3 region: {}", e)))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Invalid S3 credentials: {}", e)))?;

        let bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .map_err(|e| AppError::Storage(format!("Failed to open bucket: {}", e)))?
            .with_path_style();

        Ok(Self { bucket: Box::new(bucket) })
    }

    pub async fn download(&self, path: &str) -> AppResult<Vec<u8>> {
        let response = self
            .bucket
            .get_object(path)
            .await
            .map_err(|e| AppError::Storage(format!("Download failed for {}: {}", path, e)))?;

        Ok(response.bytes().to_vec())
    }

    pub async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> AppResult<String> {
        self.bucket
            .put_object_with_content_type(path, data, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("Upload failed for {}: {}", path, e)))?;

        Ok(format!("s3://{}/{}", self.bucket.name(), path))
    }
}
