//! Core compression and decompression functions
//!
//! Buffered helpers (`compress`, `decompress`, `compress_in_place`) are thin
//! wrappers over the streaming forms (`encoder_writer`, `decoder_reader`),
//! which the origin uses directly for payloads too large to buffer.
use std::io::{self, Read, Write};

use super::algorithms::CompressionAlgorithm;
use super::error::CompressionError;
use crate::constants::STREAM_BUFFER_SIZE;

/// Brotli sliding window (log2), the encoder's usual default
const BROTLI_LGWIN: u32 = 22;

/// Streaming encoder over any writer
pub enum EncoderWriter<W: Write> {
    Identity(W),
    Gzip(flate2::write::GzEncoder<W>),
    Brotli(Box<brotli::CompressorWriter<W>>),
    Deflate(flate2::write::ZlibEncoder<W>),
}

impl<W: Write> EncoderWriter<W> {
    /// Flush the trailer and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            EncoderWriter::Identity(mut inner) => {
                inner.flush()?;
                Ok(inner)
            }
            EncoderWriter::Gzip(encoder) => encoder.finish(),
            EncoderWriter::Brotli(encoder) => Ok((*encoder).into_inner()),
            EncoderWriter::Deflate(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for EncoderWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EncoderWriter::Identity(inner) => inner.write(buf),
            EncoderWriter::Gzip(encoder) => encoder.write(buf),
            EncoderWriter::Brotli(encoder) => encoder.write(buf),
            EncoderWriter::Deflate(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EncoderWriter::Identity(inner) => inner.flush(),
            EncoderWriter::Gzip(encoder) => encoder.flush(),
            EncoderWriter::Brotli(encoder) => encoder.flush(),
            EncoderWriter::Deflate(encoder) => encoder.flush(),
        }
    }
}

/// Streaming decoder over any reader
pub enum DecoderReader<R: Read> {
    Identity(R),
    Gzip(flate2::read::GzDecoder<R>),
    Brotli(Box<brotli::Decompressor<R>>),
    Deflate(flate2::read::ZlibDecoder<R>),
}

impl<R: Read> Read for DecoderReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecoderReader::Identity(inner) => inner.read(buf),
            DecoderReader::Gzip(decoder) => decoder.read(buf),
            DecoderReader::Brotli(decoder) => decoder.read(buf),
            DecoderReader::Deflate(decoder) => decoder.read(buf),
        }
    }
}

/// Wrap `writer` so everything written to it is compressed with `algorithm`
pub fn encoder_writer<W: Write>(
    writer: W,
    algorithm: CompressionAlgorithm,
    level: u32,
) -> EncoderWriter<W> {
    match algorithm {
        CompressionAlgorithm::None => EncoderWriter::Identity(writer),
        CompressionAlgorithm::Gzip => EncoderWriter::Gzip(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::new(level.min(9)),
        )),
        CompressionAlgorithm::Brotli => EncoderWriter::Brotli(Box::new(
            brotli::CompressorWriter::new(writer, STREAM_BUFFER_SIZE, level.min(11), BROTLI_LGWIN),
        )),
        CompressionAlgorithm::Deflate => EncoderWriter::Deflate(flate2::write::ZlibEncoder::new(
            writer,
            flate2::Compression::new(level.min(9)),
        )),
    }
}

/// Wrap `reader` so reads yield the decompressed stream
pub fn decoder_reader<R: Read>(reader: R, algorithm: CompressionAlgorithm) -> DecoderReader<R> {
    match algorithm {
        CompressionAlgorithm::None => DecoderReader::Identity(reader),
        CompressionAlgorithm::Gzip => DecoderReader::Gzip(flate2::read::GzDecoder::new(reader)),
        CompressionAlgorithm::Brotli => DecoderReader::Brotli(Box::new(
            brotli::Decompressor::new(reader, STREAM_BUFFER_SIZE),
        )),
        CompressionAlgorithm::Deflate => {
            DecoderReader::Deflate(flate2::read::ZlibDecoder::new(reader))
        }
    }
}

/// Compress data using the specified algorithm
///
/// # Arguments
/// * `data` - Input data to compress
/// * `algorithm` - Compression algorithm to use
/// * `level` - Compression level (1-11, meaning varies by algorithm)
pub fn compress(
    data: &[u8],
    algorithm: CompressionAlgorithm,
    level: u32,
) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = encoder_writer(Vec::with_capacity(data.len() / 2), algorithm, level);
    let encode_error = |e: io::Error| CompressionError::Encode {
        algorithm,
        reason: e.to_string(),
    };
    encoder.write_all(data).map_err(encode_error)?;
    encoder.finish().map_err(encode_error)
}

/// Decompress data using the specified algorithm
///
/// # Arguments
/// * `data` - Compressed data
/// * `algorithm` - Compression algorithm used
/// * `max_size` - Maximum allowed decompressed size in bytes
pub fn decompress(
    data: &[u8],
    algorithm: CompressionAlgorithm,
    max_size: usize,
) -> Result<Vec<u8>, CompressionError> {
    let mut reader = decoder_reader(data, algorithm).take((max_size as u64).saturating_add(1));
    let mut result = Vec::new();
    reader
        .read_to_end(&mut result)
        .map_err(|e| CompressionError::Decode {
            algorithm,
            reason: e.to_string(),
        })?;

    if result.len() > max_size {
        return Err(CompressionError::DecodedTooLarge { limit: max_size });
    }
    Ok(result)
}

/// Compress `buf` in place and return its new length.
///
/// The buffer is left untouched (and its current length returned) when the
/// input is below the algorithm's minimum useful size or when compression
/// would not shrink it. Callers detect adoption by comparing lengths.
pub fn compress_in_place(
    buf: &mut Vec<u8>,
    algorithm: CompressionAlgorithm,
    level: u32,
) -> Result<usize, CompressionError> {
    if algorithm.is_none() || buf.len() < algorithm.minimum_size() {
        return Ok(buf.len());
    }

    let compressed = compress(buf.as_slice(), algorithm, level)?;
    if compressed.len() >= buf.len() {
        return Ok(buf.len());
    }

    *buf = compressed;
    Ok(buf.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> Vec<u8> {
        // Create repetitive data that compresses well
        let mut data = Vec::new();
        for _ in 0..100 {
            data.extend_from_slice(b"Hello, World! This is test data for compression. ");
        }
        data
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            })
            .collect()
    }

    #[test]
    fn test_every_algorithm_compresses_and_restores() {
        let data = create_test_data();
        for algo in [
            CompressionAlgorithm::Gzip,
            CompressionAlgorithm::Brotli,
            CompressionAlgorithm::Deflate,
        ] {
            let compressed = compress(&data, algo, 6).unwrap();
            assert!(compressed.len() < data.len(), "{} did not shrink", algo);
            let restored = decompress(&compressed, algo, 1024 * 1024).unwrap();
            assert_eq!(restored, data);
        }
    }

    #[test]
    fn test_decompress_accepts_unbounded_limit() {
        let data = create_test_data();
        let compressed = compress(&data, CompressionAlgorithm::Brotli, 6).unwrap();
        let result = decompress(&compressed, CompressionAlgorithm::Brotli, usize::MAX).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_decompress_enforces_max_size() {
        let data = create_test_data();
        let compressed = compress(&data, CompressionAlgorithm::Gzip, 6).unwrap();
        let result = decompress(&compressed, CompressionAlgorithm::Gzip, 100);
        assert_eq!(result, Err(CompressionError::DecodedTooLarge { limit: 100 }));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let result = decompress(b"definitely not gzip", CompressionAlgorithm::Gzip, 1024);
        assert!(matches!(
            result,
            Err(CompressionError::Decode {
                algorithm: CompressionAlgorithm::Gzip,
                ..
            })
        ));
    }

    #[test]
    fn test_compress_in_place_shrinks_compressible_data() {
        let data = create_test_data();
        let mut buf = data.clone();
        let new_len = compress_in_place(&mut buf, CompressionAlgorithm::Brotli, 4).unwrap();
        assert!(new_len < data.len());
        assert_eq!(buf.len(), new_len);
        let restored = decompress(&buf, CompressionAlgorithm::Brotli, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_compress_in_place_skips_small_input() {
        let mut buf = b"tiny".to_vec();
        let new_len = compress_in_place(&mut buf, CompressionAlgorithm::Gzip, 6).unwrap();
        assert_eq!(new_len, 4);
        assert_eq!(buf, b"tiny");
    }

    #[test]
    fn test_compress_in_place_keeps_incompressible_input() {
        let data = pseudo_random(4096);
        let mut buf = data.clone();
        let new_len = compress_in_place(&mut buf, CompressionAlgorithm::Gzip, 6).unwrap();
        assert_eq!(new_len, data.len());
        assert_eq!(buf, data);
    }

    #[test]
    fn test_streaming_forms_round_trip() {
        let data = create_test_data();
        let mut encoder = encoder_writer(Vec::new(), CompressionAlgorithm::Deflate, 6);
        for chunk in data.chunks(333) {
            encoder.write_all(chunk).unwrap();
        }
        let compressed = encoder.finish().unwrap();

        let mut decoder = decoder_reader(compressed.as_slice(), CompressionAlgorithm::Deflate);
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_identity_is_passthrough() {
        let data = create_test_data();
        let compressed = compress(&data, CompressionAlgorithm::None, 6).unwrap();
        assert_eq!(compressed, data);
    }
}
