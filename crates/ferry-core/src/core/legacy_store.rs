//! Reads the legacy configuration document out of its git repository.

use std::path::{Path, PathBuf};

use ferry_domain::{ConfigEncoding, LegacyConfig};
use git2::{ObjectType, Repository};

#[derive(Debug, thiserror::Error)]
pub enum LegacyStoreError {
    #[error("failed to read legacy config store at {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
    #[error("legacy config store at {path} has no config.yaml or config.json at its root")]
    NotFound { path: PathBuf },
}

/// Raw bytes of the configuration entry and the encoding it was stored in.
#[derive(Debug, Clone)]
pub struct LegacySource {
    pub encoding: ConfigEncoding,
    pub bytes: Vec<u8>,
}

impl LegacySource {
    pub fn decode(&self) -> Result<LegacyConfig, ferry_domain::DecodeError> {
        LegacyConfig::decode(self.encoding, &self.bytes)
    }
}

/// Looks up `config.yaml`, then `config.json`, in the tree of HEAD.
pub(crate) fn read_legacy_source(path: &Path) -> Result<LegacySource, LegacyStoreError> {
    let access = |source: git2::Error| LegacyStoreError::Access {
        path: path.to_path_buf(),
        source,
    };
    let repo = Repository::open(path).map_err(access)?;
    let tree = repo
        .head()
        .and_then(|head| head.peel_to_tree())
        .map_err(access)?;

    for encoding in ConfigEncoding::LOOKUP_ORDER {
        let Some(entry) = tree.get_name(encoding.file_name()) else {
            continue;
        };
        if entry.kind() != Some(ObjectType::Blob) {
            tracing::debug!(
                entry = encoding.file_name(),
                "legacy config entry is not a file; ignoring"
            );
            continue;
        }
        let blob = entry
            .to_object(&repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(access)?;
        return Ok(LegacySource {
            encoding,
            bytes: blob.content().to_vec(),
        });
    }

    Err(LegacyStoreError::NotFound {
        path: path.to_path_buf(),
    })
}
