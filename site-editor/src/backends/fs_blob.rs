//! Filesystem blob store serving uploads from a public base URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::BlobError;
use crate::ports::{BlobAddress, BlobHandle, BlobStore};
use crate::uploads::UploadPayload;

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, address: &BlobAddress) -> PathBuf {
        self.root.join(address.as_str())
    }

    fn partial_path_for(&self, address: &BlobAddress) -> PathBuf {
        let mut path = self.path_for(address).into_os_string();
        path.push(".part");
        PathBuf::from(path)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        address: &BlobAddress,
        payload: &UploadPayload,
    ) -> Result<BlobHandle, BlobError> {
        let path = self.path_for(address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so a reader never sees a partial file.
        let partial = self.partial_path_for(address);
        fs::write(&partial, &payload.bytes).await?;
        fs::rename(&partial, &path).await?;

        debug!(address = %address, bytes = payload.size(), "stored blob");
        Ok(BlobHandle {
            address: address.clone(),
            size: payload.size(),
        })
    }

    async fn resolve_url(&self, handle: &BlobHandle) -> Result<String, BlobError> {
        if !fs::try_exists(self.path_for(&handle.address)).await? {
            return Err(BlobError::NotFound(handle.address.to_string()));
        }
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            handle.address
        ))
    }

    async fn cancel(&self, address: &BlobAddress) {
        let partial = self.partial_path_for(address);
        match fs::remove_file(&partial).await {
            Ok(()) => debug!(address = %address, "removed partial upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(address = %address, error = %e, "failed to remove partial upload"),
        }
    }
}
