//! 시크릿 스토어 백엔드
//!
//! (namespace, key) → 문자열 매핑. 없는 키 삭제는 오류가 아님.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::{Entry, Error as KeyringError};

use super::StorageError;

/// 네임스페이스가 고정된 시크릿 스토어
pub trait SecretStore {
    /// 네임스페이스 (키링 서비스 이름)
    fn namespace(&self) -> &str;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// 없으면 `Ok(None)`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// 없는 키 삭제는 no-op
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// OS 키체인/키링 백엔드
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl SecretStore for KeyringStore {
    fn namespace(&self) -> &str {
        &self.service
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(()),
            Err(KeyringError::NoEntry) => {
                tracing::debug!(
                    service = %self.service,
                    key,
                    "delete of missing keyring entry ignored"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// 메모리 백엔드 (테스트, 임시 저장용)
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespace: String,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 저장된 엔트리 수
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // 패닉한 writer가 남긴 맵도 그대로 사용
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SecretStore for MemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

impl<S: SecretStore + ?Sized> SecretStore for &S {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_delete() {
        let store = MemoryStore::new("TestBackend");
        assert_eq!(store.namespace(), "TestBackend");
        assert_eq!(store.get("token").unwrap(), None);

        store.set("token", "abc").unwrap();
        store.set("token", "def").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.delete("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_delete_missing_is_noop() {
        let store = MemoryStore::new("TestBackend");
        assert!(store.delete("never-written").is_ok());
    }

    fn write_through<S: SecretStore>(store: S) {
        store.set("k", "v").unwrap();
    }

    #[test]
    fn test_store_through_reference() {
        let store = MemoryStore::new("TestBackend");
        write_through(&store);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
