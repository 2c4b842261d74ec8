//! Internal Storage 모듈
//!
//! OS 키체인/키링에 임의의 값을 영구 저장합니다.
//!
//! - 값은 JSON 직렬화 → Snappy 압축 → base64 인코딩 (`codec`)
//! - 인코딩 결과는 키링 필드 길이 제한에 맞춰 청크로 분할 (`chunker`)
//! - 베이스 키에는 버전/청크 수 헤더, 청크는 `{key}#{index}`에 저장 (`internal`)
//! - 헤더가 없는 v0(레거시) 단일 엔트리도 그대로 읽을 수 있음

pub mod backend;
pub mod chunker;
pub mod codec;
pub mod internal;

pub use backend::{KeyringStore, MemoryStore, SecretStore};
pub use internal::{InternalStorage, StorageHeader, StoredFormat, DEFAULT_CHUNK_SIZE};

/// Storage 오류
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Decoding failed: {0}")]
    Decoding(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key '{0}': must not contain the chunk separator")]
    InvalidKey(String),

    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("Missing chunk {index} of '{key}'")]
    MissingChunk { key: String, index: usize },
}

impl From<keyring::Error> for StorageError {
    fn from(err: keyring::Error) -> Self {
        StorageError::Keychain(err.to_string())
    }
}
