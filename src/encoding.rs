//! Encoding detection and transcoding module
//!
//! Detects the input file's encoding and yields its lines as UTF-8 strings.
//! Malformed sequences are replaced rather than rejected.

use crate::error::{ExpandError, ExpandResult};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Size of the sample used for detection
const SAMPLE_SIZE: usize = 64 * 1024;

/// Result of encoding detection
#[derive(Debug, Clone)]
pub struct EncodingInfo {
    /// Detected encoding name
    pub name: &'static str,
    /// Confidence level (0.0 - 1.0)
    pub confidence: f32,
    /// The encoding_rs Encoding reference
    pub encoding: &'static Encoding,
}

impl Default for EncodingInfo {
    fn default() -> Self {
        Self {
            name: "UTF-8",
            confidence: 1.0,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Detect the encoding of a file by sampling its content
pub fn detect_encoding(path: &Path) -> ExpandResult<EncodingInfo> {
    let file = File::open(path).map_err(|source| ExpandError::InputOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;

    Ok(detect_sample(&sample))
}

/// Detect the encoding of an in-memory sample
pub fn detect_sample(sample: &[u8]) -> EncodingInfo {
    if sample.is_empty() {
        return EncodingInfo::default();
    }

    // Check for BOM first
    if let Some(encoding) = detect_bom(sample) {
        return EncodingInfo {
            name: encoding.name(),
            confidence: 1.0,
            encoding,
        };
    }

    if looks_like_utf8(sample) {
        return EncodingInfo::default();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    let encoding = detector.guess(None, true);

    EncodingInfo {
        name: encoding.name(),
        confidence: if encoding == encoding_rs::UTF_8 { 0.5 } else { 0.8 },
        encoding,
    }
}

/// Invalid bytes tolerated per 1000 bytes of sample before falling back to detection
const MAX_INVALID_PER_MILLE: usize = 10;

/// UTF-8 statistics of a sample
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Utf8Evidence {
    /// Well-formed sequences of two or more bytes
    multibyte: usize,
    /// Bytes that are not part of any well-formed sequence
    invalid: usize,
}

/// Walk the sample, counting valid multi-byte sequences and invalid bytes.
/// A sequence cut off by the end of the sample is not counted as invalid.
fn utf8_evidence(sample: &[u8]) -> Utf8Evidence {
    let mut evidence = Utf8Evidence::default();
    let mut rest = sample;

    loop {
        let (valid, error) = match std::str::from_utf8(rest) {
            Ok(text) => (text, None),
            Err(e) => {
                // valid_up_to always lands on a char boundary
                let text = std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or_default();
                (text, Some(e))
            }
        };
        evidence.multibyte += valid.chars().filter(|c| c.len_utf8() > 1).count();

        match error.and_then(|e| e.error_len().map(|len| (e.valid_up_to(), len))) {
            Some((valid_up_to, len)) => {
                evidence.invalid += len;
                rest = &rest[valid_up_to + len..];
            }
            None => return evidence,
        }
    }
}

/// Decide whether a sample should be read as (lossy) UTF-8.
///
/// Any well-formed multi-byte sequence counts as UTF-8 evidence; stray bytes
/// in otherwise ASCII text are tolerated up to a small fraction. Only samples
/// with no UTF-8 evidence at all go to charset detection.
fn looks_like_utf8(sample: &[u8]) -> bool {
    let evidence = utf8_evidence(sample);
    evidence.invalid == 0
        || evidence.multibyte > 0
        || evidence.invalid * 1000 <= sample.len() * MAX_INVALID_PER_MILLE
}

/// Detect BOM (Byte Order Mark) at the start of content
fn detect_bom(content: &[u8]) -> Option<&'static Encoding> {
    Encoding::for_bom(content).map(|(encoding, _)| encoding)
}

/// Line iterator over a transcoded byte stream
pub struct LineReader<R: Read> {
    reader: BufReader<DecodeReaderBytes<R, Vec<u8>>>,
    line_buffer: Vec<u8>,
    first: bool,
}

impl LineReader<File> {
    /// Open a file with automatic encoding detection
    pub fn open(path: &Path) -> ExpandResult<Self> {
        let info = detect_encoding(path)?;
        log::debug!("Input encoding: {} (confidence {:.1})", info.name, info.confidence);

        let file = File::open(path).map_err(|source| ExpandError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_encoding(file, info.encoding))
    }
}

impl<R: Read> LineReader<R> {
    /// Read with a specific encoding
    pub fn with_encoding(inner: R, encoding: &'static Encoding) -> Self {
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .bom_sniffing(true)
            .strip_bom(true)
            .build(inner);

        Self {
            reader: BufReader::with_capacity(SAMPLE_SIZE, decoder),
            line_buffer: Vec::with_capacity(4096),
            first: true,
        }
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line_buffer.clear();

        match self.reader.read_until(b'\n', &mut self.line_buffer) {
            Ok(0) => None,
            Ok(_) => {
                let mut bytes = self.line_buffer.as_slice();
                bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
                bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);

                let mut line = String::from_utf8_lossy(bytes).into_owned();
                if self.first {
                    self.first = false;
                    if line.starts_with('\u{feff}') {
                        line.drain(..'\u{feff}'.len_utf8());
                    }
                }
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_utf8_detection() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "DESKTOP1234").unwrap();
        writeln!(file, "Привет77").unwrap();

        let info = detect_encoding(file.path()).unwrap();
        assert_eq!(info.name, "UTF-8");
    }

    #[test]
    fn test_bom_detection() {
        assert_eq!(detect_sample(b"\xEF\xBB\xBFabc").encoding, encoding_rs::UTF_8);
        assert_eq!(detect_sample(b"\xFF\xFEa\x00").encoding, encoding_rs::UTF_16LE);
        assert_eq!(detect_sample(b"\xFE\xFF\x00a").encoding, encoding_rs::UTF_16BE);
        assert_eq!(detect_sample(b"").name, "UTF-8");
    }

    #[test]
    fn test_truncated_utf8_sample_is_utf8() {
        // "ж" is 0xD0 0xB6; cut after the first byte
        assert_eq!(utf8_evidence(b"abc\xD0"), Utf8Evidence::default());
        assert!(looks_like_utf8(b"abc\xD0"));
    }

    #[test]
    fn test_utf8_evidence_counts() {
        let evidence = utf8_evidence("café\u{00DF}".as_bytes());
        assert_eq!(evidence, Utf8Evidence { multibyte: 2, invalid: 0 });

        let evidence = utf8_evidence(b"a\xFFb\xC3\xA9c\xFE");
        assert_eq!(evidence, Utf8Evidence { multibyte: 1, invalid: 2 });
    }

    #[test]
    fn test_legacy_sample_goes_to_detection() {
        // windows-1252 text: every accented letter is a lone high byte
        let sample = b"caf\xE9 na\xEFve r\xE9sum\xE9 \xE0 la fa\xE7on d\xE9j\xE0 vu\n";
        assert!(!looks_like_utf8(sample));
        assert_ne!(detect_sample(sample).encoding, encoding_rs::UTF_8);
    }

    #[test]
    fn test_mostly_utf8_with_stray_byte_stays_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        for _ in 0..50 {
            write!(file, "café1\nstraße22\n").unwrap();
        }
        file.write_all(b"bad\xFF3\n").unwrap();

        assert_eq!(detect_encoding(file.path()).unwrap().encoding, encoding_rs::UTF_8);

        let lines: Vec<_> = LineReader::open(file.path())
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(lines.len(), 101);
        assert_eq!(lines[0], "café1");
        assert_eq!(lines[1], "straße22");
        assert_eq!(lines[100], "bad\u{FFFD}3");
    }

    #[test]
    fn test_ascii_with_stray_byte_stays_utf8() {
        let mut sample = b"HOST1234\n".repeat(100);
        sample.extend_from_slice(b"bad\xFF3\n");
        assert!(looks_like_utf8(&sample));
    }

    #[test]
    fn test_line_reader() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line1\r\nline2\n\nline3").unwrap();

        let lines: Vec<_> = LineReader::open(file.path())
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(lines, vec!["line1", "line2", "", "line3"]);
    }

    #[test]
    fn test_lossy_decoding() {
        let data = b"ok1\nbad\xFF2\n".to_vec();
        let lines: Vec<_> = LineReader::with_encoding(Cursor::new(data), encoding_rs::UTF_8)
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok1");
        assert_eq!(lines[1], "bad\u{FFFD}2");
    }

    #[test]
    fn test_utf16_input() {
        let mut file = NamedTempFile::new().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a1\nb22\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        file.write_all(&bytes).unwrap();

        let lines: Vec<_> = LineReader::open(file.path())
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(lines, vec!["a1", "b22"]);
    }

    #[test]
    fn test_missing_input() {
        let err = LineReader::open(Path::new("/nonexistent/input.txt")).err().unwrap();
        assert!(matches!(err, ExpandError::InputOpen { .. }));
    }
}
