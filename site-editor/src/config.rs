//! Environment-driven settings for the command line tool.

use std::path::PathBuf;

use crate::validation::{UploadPolicy, DEFAULT_IMAGE_TYPES, DEFAULT_MAX_UPLOAD_BYTES};

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// SQLite database holding published documents
    pub database_url: String,
    /// Directory uploads are written to
    pub blob_root: PathBuf,
    /// Prefix for retrieval addresses of uploaded blobs
    pub blob_public_base_url: String,
    pub max_upload_bytes: u64,
    pub allowed_image_types: Vec<String>,
    /// Identity stamped on commits made from the command line
    pub actor_id: Option<String>,
}

impl EditorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env_str("SITE_EDITOR_DATABASE_URL", "sqlite:./data/site.db"),
            blob_root: PathBuf::from(env_str("SITE_EDITOR_BLOB_ROOT", "./data/blobs")),
            blob_public_base_url: env_str("SITE_EDITOR_BLOB_PUBLIC_BASE_URL", "/media"),
            max_upload_bytes: env_parse("SITE_EDITOR_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            allowed_image_types: env_csv("SITE_EDITOR_ALLOWED_IMAGE_TYPES", DEFAULT_IMAGE_TYPES),
            actor_id: std::env::var("SITE_EDITOR_ACTOR_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_upload_bytes,
            allowed_types: self.allowed_image_types.clone(),
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process env.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_parse_reports_variable() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("SITE_EDITOR_TEST_PARSE", "lots");
        let err = env_parse::<u64>("SITE_EDITOR_TEST_PARSE", 1).unwrap_err();
        std::env::remove_var("SITE_EDITOR_TEST_PARSE");
        assert!(err.to_string().contains("SITE_EDITOR_TEST_PARSE=lots"));
    }

    #[test]
    fn test_env_csv_trims_and_skips_blanks() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("SITE_EDITOR_TEST_CSV", " image/png, ,image/avif ");
        let values = env_csv("SITE_EDITOR_TEST_CSV", &[]);
        std::env::remove_var("SITE_EDITOR_TEST_CSV");
        assert_eq!(values, vec!["image/png", "image/avif"]);
    }

    #[test]
    fn test_upload_policy_from_config() {
        let config = EditorConfig {
            database_url: "sqlite::memory:".to_string(),
            blob_root: PathBuf::from("/tmp/blobs"),
            blob_public_base_url: "/media".to_string(),
            max_upload_bytes: 10,
            allowed_image_types: vec!["image/png".to_string()],
            actor_id: None,
        };
        let policy = config.upload_policy();
        assert_eq!(policy.max_bytes, 10);
        assert_eq!(policy.allowed_types, vec!["image/png"]);
    }
}
