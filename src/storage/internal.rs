//! Internal Storage - 버전 관리되는 청크 저장소
//!
//! 저장 레이아웃 (v1):
//! - `{key}`: 헤더 JSON `{"version":1,"class_name":"InternalStorage","chunks":N}`
//! - `{key}#0` .. `{key}#N-1`: 인코딩 문자열 조각
//!
//! 레거시 레이아웃 (v0): `{key}`에 인코딩 문자열 전체를 그대로 저장.
//! base64 문자열은 `{`로 시작할 수 없으므로 베이스 키 값만 보고 포맷을 구분합니다.
//!
//! 동시 writer는 조정하지 않습니다 (last writer wins). 청크를 먼저 쓰고 헤더를
//! 마지막에 쓰지만, 쓰기 도중 중단되면 이전 헤더가 새/옛 청크가 섞인 상태를
//! 가리킬 수 있고 이 경우 읽기는 `Decoding` 오류가 됩니다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{KeyringStore, SecretStore};
use super::chunker::{self, chunk_key, Chunk};
use super::codec;
use super::StorageError;

/// 기본 청크 크기 (글자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 현재 저장 포맷 버전
pub const STORAGE_VERSION: u32 = 1;

const CLASS_NAME: &str = "InternalStorage";

/// 베이스 키에 저장되는 헤더
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageHeader {
    pub version: u32,
    pub class_name: String,
    pub chunks: usize,
}

impl StorageHeader {
    fn new(chunks: usize) -> Self {
        Self {
            version: STORAGE_VERSION,
            class_name: CLASS_NAME.to_string(),
            chunks,
        }
    }
}

/// 키의 저장 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredFormat {
    Absent,
    /// v0 단일 엔트리
    Legacy,
    /// v1 헤더 + 청크
    Chunked { chunks: usize },
}

/// 베이스 키를 읽은 결과
enum Stored {
    Absent,
    Legacy(String),
    Chunked(StorageHeader),
}

impl Stored {
    fn classify(raw: Option<String>) -> Result<Self, StorageError> {
        let Some(raw) = raw else {
            return Ok(Stored::Absent);
        };
        if !raw.trim_start().starts_with('{') {
            return Ok(Stored::Legacy(raw));
        }

        let header: StorageHeader = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Decoding(format!("invalid storage header: {}", e)))?;
        if header.version > STORAGE_VERSION {
            return Err(StorageError::Decoding(format!(
                "unsupported storage version {}",
                header.version
            )));
        }
        Ok(Stored::Chunked(header))
    }

    fn format(&self) -> StoredFormat {
        match self {
            Stored::Absent => StoredFormat::Absent,
            Stored::Legacy(_) => StoredFormat::Legacy,
            Stored::Chunked(header) => StoredFormat::Chunked {
                chunks: header.chunks,
            },
        }
    }
}

/// 시크릿 스토어 위의 키-값 저장소
///
/// 임의의 serde 값을 압축/청크 분할해서 저장합니다.
#[derive(Debug)]
pub struct InternalStorage<S> {
    store: S,
    chunk_size: usize,
}

impl InternalStorage<KeyringStore> {
    /// 앱 이름을 키링 서비스 이름으로 사용
    pub fn keyring(app_name: &str) -> Self {
        Self::new(KeyringStore::new(app_name))
    }
}

impl<S: SecretStore> InternalStorage<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// 청크 크기 변경 (0이면 쓰기 시 `InvalidChunkSize`)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn app_name(&self) -> &str {
        self.store.namespace()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn version(&self) -> u32 {
        STORAGE_VERSION
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, StorageError> {
        codec::encode(value)
    }

    pub fn deserialize<T: DeserializeOwned>(&self, value: &str) -> Result<T, StorageError> {
        codec::decode(value)
    }

    /// 값 저장 (항상 v1 청크 포맷)
    pub fn store_value<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        chunker::validate_key(key)?;
        let encoded = codec::encode(value)?;
        let chunks = chunker::split(&encoded, self.chunk_size)?;

        let previous_chunks = self.existing_chunks(key)?.unwrap_or(0);

        for chunk in &chunks {
            self.store.set(&chunk_key(key, chunk.index), &chunk.data)?;
        }
        let header = StorageHeader::new(chunks.len());
        self.store.set(key, &serde_json::to_string(&header)?)?;

        for index in chunks.len()..previous_chunks {
            self.store.delete(&chunk_key(key, index))?;
        }

        debug!(
            app = self.app_name(),
            key,
            chunks = chunks.len(),
            encoded_len = encoded.len(),
            "value stored"
        );
        Ok(())
    }

    /// v0 포맷으로 저장 (청크 없음, 기존 청크는 삭제)
    pub fn store_value_legacy<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        chunker::validate_key(key)?;
        let encoded = codec::encode(value)?;
        self.remove_stored_value(key)?;
        self.store_value_raw(key, &encoded)
    }

    /// 베이스 키에 가공 없이 저장 후 다시 읽어서 확인
    pub fn store_value_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(key, value)?;
        match self.store.get(key)? {
            Some(stored) if stored == value => Ok(()),
            _ => Err(StorageError::Keychain(format!(
                "value read back for '{}' differs from the value written",
                key
            ))),
        }
    }

    /// 베이스 키 값을 가공 없이 조회
    pub fn get_value_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    /// 키의 현재 저장 포맷
    pub fn state(&self, key: &str) -> Result<StoredFormat, StorageError> {
        chunker::validate_key(key)?;
        Ok(Stored::classify(self.store.get(key)?)?.format())
    }

    /// 값 조회 (없으면 `Ok(None)`)
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        chunker::validate_key(key)?;
        match Stored::classify(self.store.get(key)?)? {
            Stored::Absent => Ok(None),
            Stored::Legacy(raw) => {
                debug!(app = self.app_name(), key, "reading legacy entry");
                codec::decode(&raw).map(Some)
            }
            Stored::Chunked(header) => {
                let mut chunks = Vec::with_capacity(header.chunks);
                for index in 0..header.chunks {
                    let data = self.store.get(&chunk_key(key, index))?.ok_or_else(|| {
                        StorageError::MissingChunk {
                            key: key.to_string(),
                            index,
                        }
                    })?;
                    chunks.push(Chunk { index, data });
                }
                codec::decode(&chunker::join(&chunks)).map(Some)
            }
        }
    }

    /// 값과 모든 청크 삭제 (없으면 no-op)
    pub fn remove_stored_value(&self, key: &str) -> Result<(), StorageError> {
        chunker::validate_key(key)?;
        let Some(chunks) = self.existing_chunks(key)? else {
            return Ok(());
        };

        for index in 0..chunks {
            self.store.delete(&chunk_key(key, index))?;
        }
        self.store.delete(key)?;

        debug!(app = self.app_name(), key, chunks, "value removed");
        Ok(())
    }

    /// 정리 대상 기존 청크 수 (`None`이면 엔트리 없음)
    ///
    /// 읽을 수 없는 헤더(미래 버전 등)라도 JSON으로 파싱되면 그 청크 수를 사용합니다.
    fn existing_chunks(&self, key: &str) -> Result<Option<usize>, StorageError> {
        let raw = self.store.get(key)?;
        let recorded = raw
            .as_deref()
            .and_then(|r| serde_json::from_str::<StorageHeader>(r).ok())
            .map(|header| header.chunks);

        match Stored::classify(raw) {
            Ok(Stored::Absent) => Ok(None),
            Ok(Stored::Legacy(_)) => Ok(Some(0)),
            Ok(Stored::Chunked(header)) => Ok(Some(header.chunks)),
            Err(e) => {
                warn!(key, error = %e, "replacing unreadable storage header");
                Ok(Some(recorded.unwrap_or(0)))
            }
        }
    }
}
