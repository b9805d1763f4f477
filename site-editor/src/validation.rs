//! Queue-time checks for picked image files.

use crate::error::ValidationError;
use crate::uploads::UploadPayload;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: DEFAULT_IMAGE_TYPES.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, payload: &UploadPayload) -> Result<(), ValidationError> {
        let content_type = payload.content_type.trim().to_ascii_lowercase();
        if !self
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(ValidationError::UnsupportedType(payload.content_type.clone()));
        }
        if payload.bytes.is_empty() {
            return Err(ValidationError::Empty(payload.file_name.clone()));
        }
        if payload.size() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: payload.size(),
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_image_within_limit() {
        let payload = UploadPayload::new("a.png", "image/png", vec![1u8; 16]);
        assert!(UploadPolicy::default().validate(&payload).is_ok());
    }

    #[test]
    fn test_content_type_match_is_case_insensitive() {
        let payload = UploadPayload::new("a.png", "IMAGE/PNG", vec![1u8; 16]);
        assert!(UploadPolicy::default().validate(&payload).is_ok());
    }

    #[test]
    fn test_rejects_non_image() {
        let payload = UploadPayload::new("notes.pdf", "application/pdf", vec![1u8; 16]);
        assert_eq!(
            UploadPolicy::default().validate(&payload),
            Err(ValidationError::UnsupportedType("application/pdf".to_string()))
        );
    }

    #[test]
    fn test_rejects_oversized() {
        let policy = UploadPolicy {
            max_bytes: 8,
            ..UploadPolicy::default()
        };
        let payload = UploadPayload::new("a.jpg", "image/jpeg", vec![0u8; 9]);
        assert_eq!(
            policy.validate(&payload),
            Err(ValidationError::TooLarge { size: 9, limit: 8 })
        );
    }

    #[test]
    fn test_rejects_empty() {
        let payload = UploadPayload::new("a.jpg", "image/jpeg", Vec::<u8>::new());
        assert!(matches!(
            UploadPolicy::default().validate(&payload),
            Err(ValidationError::Empty(_))
        ));
    }
}
