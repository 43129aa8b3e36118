use aws_config::SdkConfig;
use serde::{Deserialize, Serialize};

/// S3 client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub path_style: bool,
}

impl StorageConfig {
    /// Builds an S3 client on top of the shared SDK configuration
    pub fn s3_client(&self, sdk: &SdkConfig) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk)
            .region(aws_sdk_s3::config::Region::new(self.region.clone()))
            .force_path_style(self.path_style);

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        aws_sdk_s3::Client::from_conf(builder.build())
    }
}
