//! Archive codec for memory vaults.
//!
//! A vault is stored as a gzip compressed tar stream holding one regular
//! file entry per vault file. Directories are implied by file paths and
//! are not written. The tar header carries the modification time in whole
//! seconds; the exact time is kept in a PAX `mtime` record.
//!
//! # Format
//! ```text
//! gzip(
//!   [PAX header: mtime=<secs>.<nanos>]
//!   [GNU header: path, size, mode 0644, mtime]
//!   [payload, padded to 512 bytes]
//!   ...
//!   [two zero blocks]
//! )
//! ```

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read};
use tar::{Archive, Builder, Entry, EntryType, Header};
use tracing::{debug, info};

use crate::memory::{FileOptions, MemoryVault};
use trove_common::{Error, Result, ROOT_PATH};
use trove_storage::{file_paths, Vault};

/// File mode written for every entry.
const FILE_MODE: u32 = 0o644;

/// PAX record holding the exact modification time.
const PAX_MTIME: &str = "mtime";

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Upper bound for buffer preallocation from a declared entry size.
const MAX_PREALLOC: u64 = 1 << 20;

/// Encode a vault as a compressed archive.
///
/// # Errors
/// - `Encode` if writing the archive fails
/// - Any error reading the vault
pub fn encode(vault: &MemoryVault) -> Result<Vec<u8>> {
    let paths = file_paths(vault, ROOT_PATH)?;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    let mut total = 0usize;
    for path in &paths {
        let info = vault.stat(path)?;
        let data = vault.read_file(path)?;

        let mtime = format_pax_time(info.modified);
        builder
            .append_pax_extensions([(PAX_MTIME, mtime.as_bytes())])
            .map_err(Error::Encode)?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(FILE_MODE);
        header.set_mtime(info.modified.timestamp().max(0) as u64);
        builder
            .append_data(&mut header, path, data.as_slice())
            .map_err(Error::Encode)?;

        debug!(path = %path, size = data.len(), "Archived file");
        total += data.len();
    }

    let encoder = builder.into_inner().map_err(Error::Encode)?;
    let bytes = encoder.finish().map_err(Error::Encode)?;

    info!(
        files = paths.len(),
        size = total,
        archive_size = bytes.len(),
        "Archive encoded"
    );
    Ok(bytes)
}

/// Decode a vault from a compressed archive.
///
/// # Errors
/// - `Decode` if the archive is corrupt, truncated or holds an
///   unsupported entry type
/// - Path errors for entries with invalid names
pub fn decode(data: &[u8]) -> Result<MemoryVault> {
    let mut vault = MemoryVault::new();
    let mut archive = Archive::new(GzDecoder::new(data));

    for entry in archive.entries().map_err(Error::Decode)? {
        let mut entry = entry.map_err(Error::Decode)?;

        match entry.header().entry_type() {
            EntryType::Regular => {}
            EntryType::Directory => {
                debug!("Skipping directory entry");
                continue;
            }
            other => {
                return Err(Error::decode(format!(
                    "unsupported archive entry type: {:?}",
                    other
                )));
            }
        }

        let path = entry_path(&entry)?;
        let modified = entry_modified(&mut entry)?;
        let size = entry.header().size().map_err(Error::Decode)?;

        let mut payload = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut payload).map_err(Error::Decode)?;
        if payload.len() as u64 != size {
            return Err(Error::decode(format!(
                "truncated entry {}: expected {} bytes, got {}",
                path,
                size,
                payload.len()
            )));
        }

        debug!(path = %path, size = payload.len(), "Restoring file");
        vault.write_file(
            &path,
            payload.as_slice(),
            FileOptions::new().with_modified(modified),
        )?;
    }

    // Drain the remainder so the gzip trailer is checked.
    let mut rest = archive.into_inner();
    io::copy(&mut rest, &mut io::sink()).map_err(Error::Decode)?;

    info!(
        files = vault.file_count(),
        size = vault.total_size(),
        "Archive decoded"
    );
    Ok(vault)
}

/// Vault path recorded on an entry.
fn entry_path<R: Read>(entry: &Entry<'_, R>) -> Result<String> {
    let raw = entry.path_bytes();
    let path = std::str::from_utf8(&raw)
        .map_err(|_| Error::decode("archive entry path is not valid UTF-8"))?;
    Ok(path.strip_prefix("./").unwrap_or(path).to_string())
}

/// Modification time of an entry, preferring the PAX record.
fn entry_modified<R: Read>(entry: &mut Entry<'_, R>) -> Result<DateTime<Utc>> {
    if let Some(extensions) = entry.pax_extensions().map_err(Error::Decode)? {
        for extension in extensions {
            let extension = extension.map_err(Error::Decode)?;
            if extension.key() != Ok(PAX_MTIME) {
                continue;
            }
            let value = extension
                .value()
                .map_err(|_| Error::decode("PAX mtime is not valid UTF-8"))?;
            return parse_pax_time(value)
                .ok_or_else(|| Error::decode(format!("invalid PAX mtime: {}", value)));
        }
    }

    let secs = entry.header().mtime().map_err(Error::Decode)?;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| Error::decode(format!("invalid header mtime: {}", secs)))
}

/// Format a time as a PAX decimal timestamp.
///
/// Negative times use the signed POSIX form, so one and a half seconds
/// before the epoch is `-1.500000000`.
fn format_pax_time(time: DateTime<Utc>) -> String {
    let secs = time.timestamp();
    let nanos = time.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1);
    if secs < 0 && nanos > 0 {
        format!("-{}.{:09}", -(secs + 1), NANOS_PER_SEC - nanos)
    } else {
        format!("{}.{:09}", secs, nanos)
    }
}

/// Parse a PAX decimal timestamp.
///
/// Digits past nanosecond precision are ignored.
fn parse_pax_time(value: &str) -> Option<DateTime<Utc>> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction = &fraction[..fraction.len().min(9)];
    let nanos: u32 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().ok()?
    };

    let (secs, nanos) = match (negative, nanos) {
        (false, _) => (whole, nanos),
        (true, 0) => (-whole, 0),
        (true, _) => (-whole - 1, NANOS_PER_SEC - nanos),
    };
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, nanos).unwrap()
    }

    fn fixture() -> MemoryVault {
        let mut vault = MemoryVault::new();
        let files: [(&str, &[u8], DateTime<Utc>); 4] = [
            ("file.txt", b"root file", at(1_600_000_000, 0)),
            ("dir1/file.txt", b"", at(1_600_000_001, 500_000_000)),
            ("dir1/dir11/data.bin", &[0, 1, 2, 255], at(1, 1)),
            ("dir2/dir21/dir211/deep.txt", b"deep", at(1_700_000_000, 999_999_999)),
        ];
        for (path, data, modified) in files {
            vault
                .write_file(path, data, FileOptions::new().with_modified(modified))
                .unwrap();
        }
        vault
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let vault = fixture();
        let encoded = encode(&vault).unwrap();
        let decoded = decode(&encoded).unwrap();

        assert_eq!(
            decoded.glob("*/*/*").unwrap(),
            vault.glob("*/*/*").unwrap()
        );
        for path in file_paths(&vault, ROOT_PATH).unwrap() {
            assert_eq!(decoded.read_file(&path).unwrap(), vault.read_file(&path).unwrap());
            assert_eq!(decoded.stat(&path).unwrap(), vault.stat(&path).unwrap());
        }
        assert_eq!(decoded.file_count(), 4);
        assert!(decoded.stat("dir2/dir21/dir211").unwrap().is_dir);
    }

    #[test]
    fn test_empty_vault_round_trip() {
        let encoded = MemoryVault::new().to_archive().unwrap();
        let decoded = MemoryVault::from_archive(&encoded).unwrap();
        assert!(decoded.read_dir(".").unwrap().is_empty());
    }

    #[test]
    fn test_long_paths_round_trip() {
        let path = format!("{}/{}", "d".repeat(120), "f".repeat(120));
        let mut vault = MemoryVault::new();
        vault.write_file(&path, &[7u8][..], FileOptions::new()).unwrap();

        let decoded = decode(&encode(&vault).unwrap()).unwrap();
        assert_eq!(decoded.read_file(&path).unwrap(), vec![7]);
    }

    #[test]
    fn test_pre_epoch_time_round_trip() {
        let modified = at(-1_500_000_000, 250_000_000);
        let mut vault = MemoryVault::new();
        vault
            .write_file("old.txt", &[1u8][..], FileOptions::new().with_modified(modified))
            .unwrap();

        let decoded = decode(&encode(&vault).unwrap()).unwrap();
        assert_eq!(decoded.stat("old.txt").unwrap().modified, modified);
    }

    #[test]
    fn test_entries_are_regular_files() {
        let encoded = encode(&fixture()).unwrap();
        let mut archive = Archive::new(GzDecoder::new(encoded.as_slice()));

        let mut paths = Vec::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().entry_type(), EntryType::Regular);
            assert_eq!(entry.header().mode().unwrap(), FILE_MODE);
            paths.push(entry.path().unwrap().to_string_lossy().to_string());
        }
        assert_eq!(
            paths,
            vec![
                "dir1/dir11/data.bin",
                "dir1/file.txt",
                "dir2/dir21/dir211/deep.txt",
                "file.txt",
            ]
        );
    }

    #[test]
    fn test_header_mtime_fallback() {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(3);
        header.set_mode(FILE_MODE);
        header.set_mtime(1_234);
        builder
            .append_data(&mut header, "plain/file.txt", &b"abc"[..])
            .unwrap();
        let tar = builder.into_inner().unwrap();

        let vault = decode(&gzip(&tar)).unwrap();
        let info = vault.stat("plain/file.txt").unwrap();
        assert_eq!(info.modified, at(1_234, 0));
        assert_eq!(vault.read_file("plain/file.txt").unwrap(), b"abc");
    }

    #[test]
    fn test_directory_entries_skipped() {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, "only-dir/", io::empty())
            .unwrap();
        let tar = builder.into_inner().unwrap();

        let vault = decode(&gzip(&tar)).unwrap();
        assert!(vault.read_dir(".").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_entry_type() {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        header.set_mode(FILE_MODE);
        header.set_link_name("target").unwrap();
        builder.append_data(&mut header, "link", io::empty()).unwrap();
        let tar = builder.into_inner().unwrap();

        assert!(matches!(decode(&gzip(&tar)), Err(Error::Decode(_))));
    }

    #[test]
    fn test_invalid_entry_path() {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(1);
        header.set_mode(FILE_MODE);
        {
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..6].copy_from_slice(b"a//b.x");
        }
        header.set_cksum();
        builder.append(&header, &[1u8][..]).unwrap();
        let tar = builder.into_inner().unwrap();

        assert!(matches!(decode(&gzip(&tar)), Err(Error::EmptySegment(_))));
    }

    #[test]
    fn test_not_gzip() {
        assert!(matches!(
            decode(b"definitely not an archive"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_truncated_archive() {
        let encoded = encode(&fixture()).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(matches!(decode(truncated), Err(Error::Decode(_))));
    }

    #[test]
    fn test_corrupt_trailer() {
        let mut encoded = encode(&fixture()).unwrap();
        let len = encoded.len();
        encoded[len - 8] ^= 0xff;
        assert!(matches!(decode(&encoded), Err(Error::Decode(_))));
    }

    #[test]
    fn test_format_pax_time() {
        assert_eq!(format_pax_time(at(0, 0)), "0.000000000");
        assert_eq!(format_pax_time(at(1, 5)), "1.000000005");
        assert_eq!(format_pax_time(at(-2, 500_000_000)), "-1.500000000");
        assert_eq!(format_pax_time(at(-3, 0)), "-3.000000000");
    }

    #[test]
    fn test_parse_pax_time() {
        assert_eq!(parse_pax_time("0"), Some(at(0, 0)));
        assert_eq!(parse_pax_time("12.5"), Some(at(12, 500_000_000)));
        assert_eq!(parse_pax_time("1.0000000051"), Some(at(1, 5)));
        assert_eq!(parse_pax_time("-1.500000000"), Some(at(-2, 500_000_000)));
        assert_eq!(parse_pax_time("-3"), Some(at(-3, 0)));
        assert_eq!(parse_pax_time(""), None);
        assert_eq!(parse_pax_time("1.x"), None);
        assert_eq!(parse_pax_time("+1"), None);
    }
}
