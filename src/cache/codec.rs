// Cache entry record format
//
// Every backend stores this exact byte layout, so records written by one
// process version stay readable by another. Little-endian, no padding:
//
//   [i32 content_len][u32 compression_id][content][i32 uncompressed_size]
//   [u32 mime_id][i64 last_modified_ticks]

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::entry::{from_ticks, to_ticks, CachedEntry};
use super::error::CacheError;
use crate::compression::CompressionAlgorithm;
use crate::mime::MimeType;

/// Bytes before the content (length + compression id)
const HEADER_LEN: usize = 4 + 4;

/// Bytes after the content (uncompressed size + mime id + ticks)
const TRAILER_LEN: usize = 4 + 4 + 8;

/// Fixed per-record overhead
pub const RECORD_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

/// Exact encoded size of `entry`
pub fn encoded_len(entry: &CachedEntry) -> usize {
    RECORD_OVERHEAD + entry.content.len()
}

/// Serializes a CachedEntry into its record bytes
///
/// # Errors
/// Returns CacheError::SerializationError if the content or its declared
/// uncompressed size does not fit the 32-bit length fields
pub fn serialize_entry(entry: &CachedEntry) -> Result<Bytes, CacheError> {
    let content_len = i32::try_from(entry.content.len()).map_err(|_| {
        CacheError::SerializationError(format!(
            "content of {} bytes exceeds record limit",
            entry.content.len()
        ))
    })?;
    let uncompressed_size = i32::try_from(entry.uncompressed_size).map_err(|_| {
        CacheError::SerializationError(format!(
            "uncompressed size {} exceeds record limit",
            entry.uncompressed_size
        ))
    })?;

    let mut buf = BytesMut::with_capacity(encoded_len(entry));
    buf.put_i32_le(content_len);
    buf.put_u32_le(entry.compression.id());
    buf.put_slice(&entry.content);
    buf.put_i32_le(uncompressed_size);
    buf.put_u32_le(entry.mime_type.id());
    buf.put_i64_le(to_ticks(entry.last_modified));
    Ok(buf.freeze())
}

/// Deserializes record bytes into a CachedEntry
///
/// Lengths are checked before any field past the header is read. A
/// negative uncompressed size is treated as unknown and replaced by the
/// content length.
///
/// # Errors
/// Returns CacheError::SerializationError if:
/// - The buffer is shorter or longer than the declared layout
/// - The compression or mime id is not registered
/// - The timestamp is out of range
pub fn deserialize_entry(record: &[u8]) -> Result<CachedEntry, CacheError> {
    if record.len() < HEADER_LEN {
        return Err(CacheError::SerializationError(format!(
            "record of {} bytes is shorter than its header",
            record.len()
        )));
    }

    let mut cursor = record;
    let content_len = cursor.get_i32_le();
    let content_len = usize::try_from(content_len).map_err(|_| {
        CacheError::SerializationError(format!("negative content length {}", content_len))
    })?;

    let expected = HEADER_LEN
        .checked_add(content_len)
        .and_then(|n| n.checked_add(TRAILER_LEN))
        .ok_or_else(|| CacheError::SerializationError("content length overflows".to_string()))?;
    if record.len() != expected {
        return Err(CacheError::SerializationError(format!(
            "record is {} bytes, layout requires {}",
            record.len(),
            expected
        )));
    }

    let compression_id = cursor.get_u32_le();
    let compression = CompressionAlgorithm::from_id(compression_id).ok_or_else(|| {
        CacheError::SerializationError(format!("unknown compression id {}", compression_id))
    })?;

    let content = Bytes::copy_from_slice(&cursor[..content_len]);
    cursor.advance(content_len);

    let uncompressed_size = cursor.get_i32_le();
    let mime_id = cursor.get_u32_le();
    let mime_type = MimeType::from_id(mime_id).ok_or_else(|| {
        CacheError::SerializationError(format!("unknown mime type id {}", mime_id))
    })?;
    let ticks = cursor.get_i64_le();
    let last_modified = from_ticks(ticks).ok_or_else(|| {
        CacheError::SerializationError(format!("timestamp ticks {} out of range", ticks))
    })?;

    let uncompressed_size = if compression.is_none() {
        content.len()
    } else {
        usize::try_from(uncompressed_size).unwrap_or(content.len())
    };

    Ok(CachedEntry {
        content,
        compression,
        uncompressed_size,
        mime_type,
        last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn sample_entry() -> CachedEntry {
        CachedEntry::with_compression(
            Bytes::from_static(b"\x1f\x8b compressed-looking bytes"),
            CompressionAlgorithm::Gzip,
            4096,
            MimeType::Css,
            Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap(),
        )
    }

    #[test]
    fn test_record_layout() {
        let entry = CachedEntry::new(
            Bytes::from_static(b"hi"),
            MimeType::Plain,
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        let record = serialize_entry(&entry).unwrap();

        assert_eq!(record.len(), RECORD_OVERHEAD + 2);
        assert_eq!(&record[0..4], &2i32.to_le_bytes());
        assert_eq!(&record[4..8], &0u32.to_le_bytes());
        assert_eq!(&record[8..10], b"hi");
        assert_eq!(&record[10..14], &2i32.to_le_bytes());
        assert_eq!(&record[14..18], &MimeType::Plain.id().to_le_bytes());
        assert_eq!(
            &record[18..26],
            &crate::cache::entry::UNIX_EPOCH_TICKS.to_le_bytes()
        );
    }

    #[test]
    fn test_entry_survives_record_cycle() {
        let entry = sample_entry();
        let record = serialize_entry(&entry).unwrap();
        assert_eq!(record.len(), encoded_len(&entry));
        assert_eq!(deserialize_entry(&record).unwrap(), entry);
    }

    #[test]
    fn test_empty_content_survives_record_cycle() {
        let entry = CachedEntry::new(Bytes::new(), MimeType::Html, Utc::now());
        let record = serialize_entry(&entry).unwrap();
        assert_eq!(record.len(), RECORD_OVERHEAD);
        assert_eq!(deserialize_entry(&record).unwrap(), entry);
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let record = serialize_entry(&sample_entry()).unwrap();
        for len in 0..record.len() {
            assert!(
                deserialize_entry(&record[..len]).is_err(),
                "prefix of {} bytes was accepted",
                len
            );
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut record = serialize_entry(&sample_entry()).unwrap().to_vec();
        record.push(0);
        assert!(deserialize_entry(&record).is_err());
    }

    #[rstest]
    #[case::negative_length(0, (-1i32).to_le_bytes().to_vec())]
    #[case::huge_length(0, i32::MAX.to_le_bytes().to_vec())]
    #[case::unknown_compression(4, 77u32.to_le_bytes().to_vec())]
    fn test_corrupt_header_is_rejected(#[case] offset: usize, #[case] patch: Vec<u8>) {
        let mut record = serialize_entry(&sample_entry()).unwrap().to_vec();
        record[offset..offset + patch.len()].copy_from_slice(&patch);
        assert!(deserialize_entry(&record).is_err());
    }

    #[test]
    fn test_unknown_mime_id_is_rejected() {
        let entry = sample_entry();
        let mut record = serialize_entry(&entry).unwrap().to_vec();
        let mime_offset = HEADER_LEN + entry.content.len() + 4;
        record[mime_offset..mime_offset + 4].copy_from_slice(&999u32.to_le_bytes());
        assert!(deserialize_entry(&record).is_err());
    }

    #[test]
    fn test_negative_uncompressed_size_falls_back_to_content_length() {
        let entry = sample_entry();
        let mut record = serialize_entry(&entry).unwrap().to_vec();
        let size_offset = HEADER_LEN + entry.content.len();
        record[size_offset..size_offset + 4].copy_from_slice(&(-5i32).to_le_bytes());

        let decoded = deserialize_entry(&record).unwrap();
        assert_eq!(decoded.uncompressed_size, entry.content.len());
        assert_eq!(decoded.compression, CompressionAlgorithm::Gzip);
    }
}
