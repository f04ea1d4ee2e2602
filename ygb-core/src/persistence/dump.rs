//! Portable save file.
//!
//! Layout, all integers little-endian:
//!
//! | offset | size | field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 4    | title length in bytes                  |
//! | 4      | 4    | data length in bytes                   |
//! | 8      | 8    | session state (0..=3)                  |
//! | 16     | 8    | created-at epoch ms, 0 if unknown      |
//! | 24     | 8    | last-accessed epoch ms, 0 if unknown   |
//! | 32     | n    | cart title, UTF-8                      |
//! | 32 + n | m    | core save data                         |

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use ygb_types::{SaveMetadata, SaveRecord, SessionState};

pub const EXTENSION: &str = "ygb";

const HEADER_LEN: usize = 32;

/// Serialize `record`. Fails with `InvalidInput` when the title or data is
/// too long for its 32-bit length field.
pub fn encode(record: &SaveRecord) -> io::Result<Vec<u8>> {
    let title = record.metadata.cart_title.as_bytes();
    let title_len = length_field(title.len(), "cart title")?;
    let data_len = length_field(record.data.len(), "save data")?;

    let mut out = Vec::with_capacity(HEADER_LEN + title.len() + record.data.len());
    out.extend_from_slice(&title_len.to_le_bytes());
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&record.state.as_u64().to_le_bytes());
    out.extend_from_slice(&record.metadata.created_at.unwrap_or(0).to_le_bytes());
    out.extend_from_slice(&record.metadata.last_accessed.unwrap_or(0).to_le_bytes());
    out.extend_from_slice(title);
    out.extend_from_slice(&record.data);
    Ok(out)
}

fn length_field(len: usize, what: &str) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} of {} bytes does not fit a save file", what, len),
        )
    })
}

/// Parse a save file. The returned record has no store id.
pub fn decode(bytes: &[u8]) -> io::Result<SaveRecord> {
    if bytes.len() < HEADER_LEN {
        return Err(invalid("save file shorter than its header"));
    }
    let title_len = read_u32(bytes, 0) as usize;
    let data_len = read_u32(bytes, 4) as usize;
    let state = SessionState::from_u64(read_u64(bytes, 8))
        .ok_or_else(|| invalid("unknown session state in save file"))?;
    let created_at = non_zero(read_u64(bytes, 16));
    let last_accessed = non_zero(read_u64(bytes, 24));

    let title_end = HEADER_LEN + title_len;
    let data_end = title_end
        .checked_add(data_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| invalid("save file truncated"))?;
    let cart_title = std::str::from_utf8(&bytes[HEADER_LEN..title_end])
        .map_err(|_| invalid("cart title is not valid UTF-8"))?
        .to_string();

    Ok(SaveRecord {
        id: None,
        data: bytes[title_end..data_end].to_vec(),
        state,
        metadata: SaveMetadata {
            cart_title,
            created_at,
            last_accessed,
        },
    })
}

/// `<title>.ygb`, or `<title>-YYYY-MM-DD-HH-mm-ss.ygb` (UTC) when the record
/// has a last-accessed time. Path separators in the title become `_`.
pub fn file_name(metadata: &SaveMetadata) -> String {
    let title: String = metadata
        .cart_title
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match metadata.last_accessed {
        Some(ms) => format!("{}-{}.{}", title, format_utc(ms), EXTENSION),
        None => format!("{}.{}", title, EXTENSION),
    }
}

/// Write `record` into `dir` under [`file_name`]. Returns the path written.
pub fn write_to_dir(dir: &Path, record: &SaveRecord) -> io::Result<PathBuf> {
    let path = dir.join(file_name(&record.metadata));
    std::fs::write(&path, encode(record)?)?;
    log::info!(target: "persistence", "exported {}", path.display());
    Ok(path)
}

pub fn read_file(path: &Path) -> io::Result<SaveRecord> {
    decode(&std::fs::read(path)?)
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.to_string())
}

fn non_zero(v: u64) -> Option<u64> {
    (v != 0).then_some(v)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// `YYYY-MM-DD-HH-mm-ss` in UTC.
fn format_utc(ms: u64) -> String {
    let secs = ms / 1000;
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}-{:02}-{:02}-{:02}",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SaveRecord {
        SaveRecord {
            id: Some(3),
            data: vec![0xde, 0xad, 0xbe, 0xef],
            state: SessionState::Paused,
            metadata: SaveMetadata {
                cart_title: "TETRIS".into(),
                created_at: Some(1_700_000_000_000),
                last_accessed: None,
            },
        }
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(bytes.len(), 32 + 6 + 4);
        assert_eq!(&bytes[0..4], &6u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &4u32.to_le_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &1_700_000_000_000u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &[0u8; 8]);
        assert_eq!(&bytes[32..38], b"TETRIS");
        assert_eq!(&bytes[38..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn decode_restores_fields_without_id() {
        let decoded = decode(&encode(&sample()).unwrap()).unwrap();
        let mut expected = sample();
        expected.id = None;
        assert_eq!(decoded, expected);
    }

    #[test]
    fn rejects_truncated_and_bad_state() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(decode(&bytes[..20]).unwrap_err().kind(), ErrorKind::InvalidData);
        assert_eq!(
            decode(&bytes[..bytes.len() - 1]).unwrap_err().kind(),
            ErrorKind::InvalidData
        );

        let mut bad = bytes.clone();
        bad[8] = 9;
        assert_eq!(decode(&bad).unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_lengths_are_refused() {
        let too_long = u32::MAX as usize + 1;
        let err = length_field(too_long, "save data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(length_field(u32::MAX as usize, "save data").unwrap(), u32::MAX);
    }

    #[test]
    fn file_names() {
        let mut meta = sample().metadata;
        assert_eq!(file_name(&meta), "TETRIS.ygb");

        // 2024-02-29 13:05:09 UTC
        meta.last_accessed = Some(1_709_211_909_000);
        assert_eq!(file_name(&meta), "TETRIS-2024-02-29-13-05-09.ygb");

        meta.cart_title = "A/B".into();
        meta.last_accessed = None;
        assert_eq!(file_name(&meta), "A_B.ygb");
    }

    #[test]
    fn epoch_date() {
        assert_eq!(format_utc(0), "1970-01-01-00-00-00");
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_to_dir(dir.path(), &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), "TETRIS.ygb");
        let record = read_file(&path).unwrap();
        assert_eq!(record.data, sample().data);
    }
}
