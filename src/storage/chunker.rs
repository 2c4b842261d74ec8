//! 청크 분할/결합
//!
//! 키링 엔트리 길이 제한 때문에 인코딩된 문자열을 `max_len` 글자 이하의 조각으로 나눕니다.
//! 각 조각의 물리 키는 `{key}#{index}`로 결정적으로 유도되므로 별도 인덱스가 필요 없습니다.
//! 논리 키에 `#`이 들어가면 다른 키의 청크와 겹치므로 `validate_key`로 거부합니다.

use super::StorageError;

/// 청크 키 구분자
pub const CHUNK_SEPARATOR: char = '#';

/// 인코딩 문자열의 한 조각
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub data: String,
}

/// 논리 키와 인덱스로 물리 키 생성
pub fn chunk_key(key: &str, index: usize) -> String {
    format!("{}{}{}", key, CHUNK_SEPARATOR, index)
}

/// 논리 키 검사 (비어 있거나 구분자를 포함하면 `InvalidKey`)
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains(CHUNK_SEPARATOR) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// `max_len` 글자 단위로 분할 (char 경계 기준)
pub fn split(text: &str, max_len: usize) -> Result<Vec<Chunk>, StorageError> {
    if max_len == 0 {
        return Err(StorageError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_len {
            chunks.push(Chunk {
                index: chunks.len(),
                data: text[start..offset].to_string(),
            });
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(Chunk {
            index: chunks.len(),
            data: text[start..].to_string(),
        });
    }

    Ok(chunks)
}

/// 인덱스 순서대로 결합
pub fn join(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    ordered.into_iter().map(|c| c.data.as_str()).collect()
}
