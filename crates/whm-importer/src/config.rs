//! Importer configuration
//!
//! Read from the process environment, with a `.env` file honoured when
//! present. Required variables that are missing or blank are configuration
//! errors. Optional numbers that do not parse fall back to their defaults.

use std::time::Duration;

use crate::catalog::warehouse::RestCatalogSettings;
use crate::error::{ImportError, Result};
use crate::pipeline::grouper::{DEFAULT_BATCH_SIZE, DEFAULT_BATCH_WEIGHT_BYTES};
use crate::pipeline::importer::DEFAULT_LOAD_CONCURRENCY;
use crate::source::DEFAULT_ARCHIVE_CONCURRENCY;
use crate::storage::StorageConfig;

const DEFAULT_DATABASE_FOLDER: &str = "/data/database/";
const DEFAULT_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_DELAY_MINUTES: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    pub aws_region: String,
    pub soc_cod: String,
    /// Catalog namespace
    pub database_name: String,
    /// Warehouse root inside the bucket
    pub database_folder: String,
    /// Iceberg REST catalog endpoint
    pub catalog_uri: String,
    pub s3_bucket_name: String,
    pub s3_source_folder: String,
    pub s3_archive_folder: String,
    pub s3_archive_invalid_folder: String,
    /// FIFO queue URL
    pub sqs_queue: String,
    pub batch_size: usize,
    pub batch_weight_bytes: u64,
    pub interval: Duration,
    pub reinit: bool,
    pub reinit_delay: Duration,
    pub s3_endpoint: Option<String>,
    pub s3_path_style: bool,
    pub archive_concurrency: usize,
    pub load_concurrency: usize,
}

impl ImporterConfig {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds and validates a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            value(name).ok_or_else(|| ImportError::Config(format!("{name} is required")))
        };
        let number = |name: &str, default: u64| {
            value(name)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let flag = |name: &str| {
            value(name)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let batch_weight_bytes = value("BATCH_WEIGHT")
            .or_else(|| value("BATCH_WEIGHT_IN_BYTE"))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BATCH_WEIGHT_BYTES);

        let config = Self {
            aws_region: required("AWS_REGION")?,
            soc_cod: required("SOC_COD")?,
            database_name: required("DATABASE_NAME")?,
            database_folder: value("DATABASE_FOLDER")
                .unwrap_or_else(|| DEFAULT_DATABASE_FOLDER.to_string()),
            catalog_uri: required("ICEBERG_CATALOG_URI")?,
            s3_bucket_name: required("S3_BUCKET_NAME")?,
            s3_source_folder: required("S3_SOURCE_FOLDER")?,
            s3_archive_folder: required("S3_ARCHIVE_FOLDER")?,
            s3_archive_invalid_folder: required("S3_ARCHIVE_INVALID_FOLDER")?,
            sqs_queue: required("SQS_QUEUE")?,
            batch_size: number("BATCH_SIZE", DEFAULT_BATCH_SIZE as u64) as usize,
            batch_weight_bytes,
            interval: minutes(number("INTERVAL_IN_MINUTE", DEFAULT_INTERVAL_MINUTES)),
            reinit: flag("REINIT"),
            reinit_delay: minutes(number("DELAY_IN_MINUTE", DEFAULT_DELAY_MINUTES)),
            s3_endpoint: value("S3_ENDPOINT"),
            s3_path_style: flag("S3_PATH_STYLE"),
            archive_concurrency: number("ARCHIVE_CONCURRENCY", DEFAULT_ARCHIVE_CONCURRENCY as u64)
                as usize,
            load_concurrency: number("LOAD_CONCURRENCY", DEFAULT_LOAD_CONCURRENCY as u64) as usize,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ImportError::Config("BATCH_SIZE must be greater than 0".into()));
        }
        if self.batch_weight_bytes == 0 {
            return Err(ImportError::Config("BATCH_WEIGHT must be greater than 0".into()));
        }
        if self.archive_concurrency == 0 {
            return Err(ImportError::Config(
                "ARCHIVE_CONCURRENCY must be greater than 0".into(),
            ));
        }
        if self.load_concurrency == 0 {
            return Err(ImportError::Config("LOAD_CONCURRENCY must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig {
            endpoint: self.s3_endpoint.clone(),
            region: self.aws_region.clone(),
            bucket: self.s3_bucket_name.clone(),
            path_style: self.s3_path_style,
        }
    }

    /// Iceberg catalog whose warehouse is `s3://<bucket>/<database folder>`
    pub fn catalog(&self) -> RestCatalogSettings {
        let folder = self.database_folder.trim_matches('/');
        let warehouse = if folder.is_empty() {
            format!("s3://{}", self.s3_bucket_name)
        } else {
            format!("s3://{}/{}", self.s3_bucket_name, folder)
        };
        RestCatalogSettings {
            uri: self.catalog_uri.clone(),
            warehouse,
            region: self.aws_region.clone(),
            endpoint: self.s3_endpoint.clone(),
        }
    }

    /// Folder listed by a sweep: the archive when reinitialising, the
    /// landing zone otherwise
    pub fn sweep_root(&self) -> &str {
        if self.reinit {
            &self.s3_archive_folder
        } else {
            &self.s3_source_folder
        }
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("AWS_REGION", "eu-south-1"),
            ("SOC_COD", "045"),
            ("DATABASE_NAME", "whm"),
            ("ICEBERG_CATALOG_URI", "http://catalog:8181/catalog"),
            ("S3_BUCKET_NAME", "bucket"),
            ("S3_SOURCE_FOLDER", "data/landing_zone"),
            ("S3_ARCHIVE_FOLDER", "data/archive"),
            ("S3_ARCHIVE_INVALID_FOLDER", "data/invalid"),
            ("SQS_QUEUE", "https://sqs.eu-south-1.amazonaws.com/1/whm.fifo"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ImporterConfig> {
        ImporterConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base()).unwrap();

        assert_eq!(config.database_folder, "/data/database/");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_weight_bytes, 5 * 1024 * 1024);
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.reinit_delay, Duration::from_secs(60));
        assert!(!config.reinit);
        assert_eq!(config.archive_concurrency, 10);
        assert_eq!(config.load_concurrency, 8);
        assert_eq!(config.sweep_root(), "data/landing_zone");
    }

    #[test]
    fn test_missing_required_variable() {
        for name in [
            "AWS_REGION",
            "SOC_COD",
            "SQS_QUEUE",
            "S3_ARCHIVE_INVALID_FOLDER",
            "ICEBERG_CATALOG_URI",
        ] {
            let mut vars = base();
            vars.remove(name);
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, ImportError::Config(ref msg) if msg.contains(name)), "{name}");
        }
    }

    #[test]
    fn test_blank_required_variable() {
        let mut vars = base();
        vars.insert("SOC_COD", "  ");
        assert!(matches!(load(&vars), Err(ImportError::Config(_))));
    }

    #[test]
    fn test_batch_weight_precedence() {
        let mut vars = base();
        vars.insert("BATCH_WEIGHT_IN_BYTE", "1000");
        assert_eq!(load(&vars).unwrap().batch_weight_bytes, 1000);

        vars.insert("BATCH_WEIGHT", "2000");
        assert_eq!(load(&vars).unwrap().batch_weight_bytes, 2000);
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let mut vars = base();
        vars.insert("BATCH_SIZE", "lots");
        vars.insert("INTERVAL_IN_MINUTE", "-3");
        let config = load(&vars).unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.interval, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut vars = base();
        vars.insert("BATCH_SIZE", "0");
        assert!(matches!(load(&vars), Err(ImportError::Config(_))));

        let mut vars = base();
        vars.insert("ARCHIVE_CONCURRENCY", "0");
        assert!(matches!(load(&vars), Err(ImportError::Config(_))));
    }

    #[test]
    fn test_reinit_and_storage() {
        let mut vars = base();
        vars.insert("REINIT", "true");
        vars.insert("DELAY_IN_MINUTE", "2");
        vars.insert("S3_ENDPOINT", "http://localhost:9000");
        vars.insert("S3_PATH_STYLE", "true");
        let config = load(&vars).unwrap();

        assert!(config.reinit);
        assert_eq!(config.reinit_delay, Duration::from_secs(120));
        assert_eq!(config.sweep_root(), "data/archive");
        let storage = config.storage();
        assert_eq!(storage.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(storage.path_style);
        assert_eq!(storage.bucket, "bucket");
    }

    #[test]
    fn test_catalog_warehouse_lives_in_the_bucket() {
        let config = load(&base()).unwrap();
        let catalog = config.catalog();

        assert_eq!(catalog.uri, "http://catalog:8181/catalog");
        assert_eq!(catalog.warehouse, "s3://bucket/data/database");
        assert_eq!(catalog.region, "eu-south-1");
        assert_eq!(catalog.endpoint, None);
    }
}
