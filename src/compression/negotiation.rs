/// Accept-Encoding header parsing and serve-time negotiation
use bytes::Bytes;

use super::algorithms::{most_preferred, CompressionAlgorithm};
use super::compress::{compress_in_place, decompress};
use super::config::CompressionConfig;
use super::error::CompressionError;
use crate::cache::entry::CachedEntry;

/// Represents a single encoding in Accept-Encoding header with quality value
#[derive(Debug, Clone, PartialEq)]
struct EncodingPreference {
    encoding: String,
    quality: f32,
}

impl EncodingPreference {
    /// Parse a single encoding preference (e.g., "gzip;q=0.8")
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let mut parts = s.split(';');
        let encoding = parts.next()?.trim().to_lowercase();
        if encoding.is_empty() {
            return None;
        }

        let quality = parts
            .filter_map(|param| param.trim().strip_prefix("q="))
            .next()
            .map(|q| q.trim().parse::<f32>().unwrap_or(1.0))
            .unwrap_or(1.0);

        Some(EncodingPreference { encoding, quality })
    }
}

/// Parse an Accept-Encoding header into the algorithms the client accepts.
///
/// Entries with `q=0` are excluded, `*` expands to every real algorithm not
/// explicitly excluded, and unknown codings are ignored. The result is
/// ordered by descending quality but ranking is left to [`select_algorithm`].
pub fn parse_accept_encoding(header: &str) -> Vec<CompressionAlgorithm> {
    let mut preferences: Vec<EncodingPreference> = header
        .split(',')
        .filter_map(EncodingPreference::parse)
        .collect();

    preferences.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let excluded: Vec<CompressionAlgorithm> = preferences
        .iter()
        .filter(|pref| pref.quality <= 0.0)
        .filter_map(|pref| CompressionAlgorithm::parse_algorithm(&pref.encoding).ok())
        .collect();

    let mut accepted = Vec::new();
    for pref in preferences.iter().filter(|pref| pref.quality > 0.0) {
        if pref.encoding == "*" {
            for algo in CompressionAlgorithm::ALL {
                if !algo.is_none() && !excluded.contains(&algo) && !accepted.contains(&algo) {
                    accepted.push(algo);
                }
            }
            continue;
        }

        if let Ok(algo) = CompressionAlgorithm::parse_algorithm(&pref.encoding) {
            if !algo.is_none() && !excluded.contains(&algo) && !accepted.contains(&algo) {
                accepted.push(algo);
            }
        }
    }

    accepted
}

/// Choose the best enabled algorithm among those the client accepts
pub fn select_algorithm(
    accepted: &[CompressionAlgorithm],
    config: &CompressionConfig,
) -> CompressionAlgorithm {
    if !config.enabled {
        return CompressionAlgorithm::None;
    }

    most_preferred(
        config.preference,
        accepted
            .iter()
            .filter(|algo| config.is_algorithm_enabled(**algo))
            .map(|algo| algo.wire_name()),
    )
}

/// Re-encode `entry` for a client that accepts `accepted`.
///
/// A stored encoding the client cannot read is decoded back to identity
/// first. An identity entry is then compressed with the preferred accepted
/// algorithm, and the result is adopted only if it is smaller.
pub fn negotiate_entry(
    mut entry: CachedEntry,
    accepted: &[CompressionAlgorithm],
    config: &CompressionConfig,
) -> Result<CachedEntry, CompressionError> {
    if !entry.compression.is_none() && !accepted.contains(&entry.compression) {
        let limit = if entry.uncompressed_size > 0 {
            entry.uncompressed_size
        } else {
            config.max_decompressed_size_bytes
        };
        let plain = decompress(&entry.content, entry.compression, limit)?;
        tracing::debug!(
            from = %entry.compression,
            size = plain.len(),
            "Decoded cached entry for client without matching encoding"
        );
        entry.uncompressed_size = plain.len();
        entry.content = Bytes::from(plain);
        entry.compression = CompressionAlgorithm::None;
    }

    if !entry.compression.is_none() {
        return Ok(entry);
    }

    let algorithm = select_algorithm(accepted, config);
    if algorithm.is_none() || entry.content.len() < algorithm.minimum_size() {
        return Ok(entry);
    }

    let original_len = entry.content.len();
    let mut buf = entry.content.to_vec();
    match compress_in_place(&mut buf, algorithm, config.level_for(algorithm)) {
        Ok(new_len) if new_len < original_len => {
            buf.truncate(new_len);
            entry.content = Bytes::from(buf);
            entry.compression = algorithm;
            entry.uncompressed_size = original_len;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(
                algorithm = %algorithm,
                error = %e,
                "Serve-time compression failed, sending identity"
            );
        }
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MimeType;
    use chrono::Utc;

    fn text_entry(len: usize) -> CachedEntry {
        let content: Vec<u8> = b"All work and no play makes a cache a dull store. "
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect();
        CachedEntry::new(Bytes::from(content), MimeType::Plain, Utc::now())
    }

    #[test]
    fn test_encoding_preference_parse_with_quality() {
        let pref = EncodingPreference::parse("gzip;q=0.8").unwrap();
        assert_eq!(pref.encoding, "gzip");
        assert_eq!(pref.quality, 0.8);
    }

    #[test]
    fn test_encoding_preference_parse_case_insensitive() {
        let pref = EncodingPreference::parse(" GZIP ").unwrap();
        assert_eq!(pref.encoding, "gzip");
        assert_eq!(pref.quality, 1.0);
    }

    #[test]
    fn test_parse_accept_encoding_simple() {
        assert_eq!(
            parse_accept_encoding("gzip, br"),
            vec![CompressionAlgorithm::Gzip, CompressionAlgorithm::Brotli]
        );
    }

    #[test]
    fn test_parse_accept_encoding_orders_by_quality() {
        assert_eq!(
            parse_accept_encoding("gzip;q=0.5, deflate;q=0.9"),
            vec![CompressionAlgorithm::Deflate, CompressionAlgorithm::Gzip]
        );
    }

    #[test]
    fn test_parse_accept_encoding_q_zero_excludes() {
        assert_eq!(
            parse_accept_encoding("*, br;q=0"),
            vec![CompressionAlgorithm::Gzip, CompressionAlgorithm::Deflate]
        );
    }

    #[test]
    fn test_parse_accept_encoding_ignores_unknown_and_identity() {
        assert_eq!(
            parse_accept_encoding("zstd, identity, gzip"),
            vec![CompressionAlgorithm::Gzip]
        );
        assert!(parse_accept_encoding("").is_empty());
    }

    #[test]
    fn test_select_algorithm_respects_config() {
        let mut config = CompressionConfig::new();
        let accepted = parse_accept_encoding("gzip, br");
        assert_eq!(
            select_algorithm(&accepted, &config),
            CompressionAlgorithm::Brotli
        );

        config.algorithms.get_mut("br").unwrap().enabled = false;
        assert_eq!(
            select_algorithm(&accepted, &config),
            CompressionAlgorithm::Gzip
        );

        config.enabled = false;
        assert_eq!(
            select_algorithm(&accepted, &config),
            CompressionAlgorithm::None
        );
    }

    #[test]
    fn test_negotiate_compresses_identity_entry() {
        let entry = text_entry(8192);
        let negotiated = negotiate_entry(
            entry.clone(),
            &[CompressionAlgorithm::Gzip],
            &CompressionConfig::new(),
        )
        .unwrap();

        assert_eq!(negotiated.compression, CompressionAlgorithm::Gzip);
        assert_eq!(negotiated.uncompressed_size, 8192);
        assert!(negotiated.content.len() < entry.content.len());
        let restored = decompress(&negotiated.content, CompressionAlgorithm::Gzip, 8192).unwrap();
        assert_eq!(restored, entry.content.to_vec());
    }

    #[test]
    fn test_negotiate_decodes_unaccepted_encoding() {
        let config = CompressionConfig::new();
        let original = text_entry(4096);
        let brotli = negotiate_entry(original.clone(), &[CompressionAlgorithm::Brotli], &config)
            .unwrap();
        assert_eq!(brotli.compression, CompressionAlgorithm::Brotli);

        let plain = negotiate_entry(brotli, &[], &config).unwrap();
        assert_eq!(plain.compression, CompressionAlgorithm::None);
        assert_eq!(plain.content, original.content);
        assert_eq!(plain.uncompressed_size, 4096);
    }

    #[test]
    fn test_negotiate_transcodes_between_algorithms() {
        let config = CompressionConfig::new();
        let original = text_entry(4096);
        let brotli = negotiate_entry(original.clone(), &[CompressionAlgorithm::Brotli], &config)
            .unwrap();

        let gzip = negotiate_entry(brotli, &[CompressionAlgorithm::Gzip], &config).unwrap();
        assert_eq!(gzip.compression, CompressionAlgorithm::Gzip);
        let restored = decompress(&gzip.content, CompressionAlgorithm::Gzip, 4096).unwrap();
        assert_eq!(restored, original.content.to_vec());
    }

    #[test]
    fn test_negotiate_keeps_small_entries_identity() {
        let entry = text_entry(100);
        let negotiated = negotiate_entry(
            entry.clone(),
            &[CompressionAlgorithm::Brotli],
            &CompressionConfig::new(),
        )
        .unwrap();
        assert_eq!(negotiated, entry);
    }

    #[test]
    fn test_negotiate_never_grows_payload() {
        let mut state: u32 = 0x9e37_79b9;
        let noise: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 8) as u8
            })
            .collect();
        let entry = CachedEntry::new(Bytes::from(noise), MimeType::Png, Utc::now());
        for algo in [
            CompressionAlgorithm::Gzip,
            CompressionAlgorithm::Brotli,
            CompressionAlgorithm::Deflate,
        ] {
            let negotiated =
                negotiate_entry(entry.clone(), &[algo], &CompressionConfig::new()).unwrap();
            assert!(negotiated.content.len() <= entry.content.len());
        }
    }
}
