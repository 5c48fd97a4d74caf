//! Stream file naming.
//!
//! Every stream file name starts with its consensus timestamp in ISO-8601 form
//! with `_` in place of `:` so the names are valid object keys:
//!
//! ```text
//! 2019-08-30T18_10_00.419072Z.rcd            record file
//! 2019-08-30T18_10_00.419072Z.rcd_sig        its signature file
//! 2022-07-13T08_46_08.041986003Z.rcd.gz      compressed record file
//! 2022-07-13T08_46_08.041986003Z_01.rcd.gz   sidecar 1 of that record file
//! 2019-08-30T18_15_00.016002001Z_Balances.csv
//! 2023-01-01T00_00_00.000000000Z_Balances.pb.gz
//! ```
//!
//! Within a stream type, files are totally ordered by timestamp.

use std::cmp::Ordering;
use std::fmt;

use mirror_common::time::{format_instant, parse_instant};

use crate::error::{Result, StreamError};
use crate::stream_type::StreamType;

const SIGNATURE_SUFFIX: &str = "_sig";
const COMPRESSED_SUFFIX: &str = ".gz";

/// Role of a file within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Data,
    Signature,
    Sidecar,
}

/// A parsed stream file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamFilename {
    name: String,
    timestamp: i64,
    stream_type: StreamType,
    file_type: FileType,
    extension: String,
    compressed: bool,
    sidecar_id: Option<u32>,
}

impl StreamFilename {
    /// Parses a bare file name (no directory component).
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || StreamError::InvalidFilename(name.to_string());

        let z = name.find('Z').ok_or_else(invalid)?;
        let instant = name[..=z].replace('_', ":");
        let timestamp = parse_instant(&instant).map_err(|_| invalid())?;

        let mut rest = &name[z + 1..];
        let mut file_type = FileType::Data;
        if let Some(stripped) = rest.strip_suffix(SIGNATURE_SUFFIX) {
            rest = stripped;
            file_type = FileType::Signature;
        }
        let compressed = match rest.strip_suffix(COMPRESSED_SUFFIX) {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };

        let mut sidecar_id = None;
        let (stream_type, extension) = if let Some(ext) = rest.strip_prefix("_Balances.") {
            (StreamType::Balance, ext)
        } else if let Some(ext) = rest.strip_prefix('.') {
            (StreamType::Record, ext)
        } else if let Some(sidecar) = rest.strip_prefix('_') {
            let (id, ext) = sidecar.split_once('.').ok_or_else(invalid)?;
            if file_type == FileType::Signature || id.len() < 2 {
                return Err(invalid());
            }
            sidecar_id = Some(id.parse::<u32>().map_err(|_| invalid())?);
            file_type = FileType::Sidecar;
            (StreamType::Record, ext)
        } else {
            return Err(invalid());
        };

        if !stream_type.data_extensions().contains(&extension) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            timestamp,
            stream_type,
            file_type,
            extension: extension.to_string(),
            compressed,
            sidecar_id,
        })
    }

    /// Builds a data or signature file name for a timestamp.
    ///
    /// Timestamps are always written with nine fractional digits.
    pub fn from_timestamp(
        stream_type: StreamType,
        file_type: FileType,
        timestamp: i64,
        extension: &str,
        compressed: bool,
    ) -> Result<Self> {
        let mut name = format!(
            "{}{}.{}",
            timestamp_text(timestamp)?,
            stream_type.suffix(),
            extension
        );
        if compressed && file_type != FileType::Signature {
            name.push_str(COMPRESSED_SUFFIX);
        }
        match file_type {
            FileType::Data => {}
            FileType::Signature => name.push_str(SIGNATURE_SUFFIX),
            FileType::Sidecar => {
                return Err(StreamError::InvalidFilename(
                    "sidecar names derive from their record file".to_string(),
                ))
            }
        }
        Self::parse(&name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consensus timestamp encoded in the name, in nanoseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Extension without compression or signature suffix (`rcd`, `csv`, `pb`).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn sidecar_id(&self) -> Option<u32> {
        self.sidecar_id
    }

    /// The leading `<timestamp>Z` part of the name.
    pub fn timestamp_part(&self) -> &str {
        match self.name.find('Z') {
            Some(z) => &self.name[..=z],
            None => &self.name,
        }
    }

    /// Name of the signature file for this data file.
    pub fn signature_name(&self) -> String {
        match self.file_type {
            FileType::Signature => self.name.clone(),
            _ => {
                let base = self
                    .name
                    .strip_suffix(COMPRESSED_SUFFIX)
                    .unwrap_or(&self.name);
                format!("{}{}", base, SIGNATURE_SUFFIX)
            }
        }
    }

    /// Candidate data file names for a signature file, plain name first.
    pub fn data_name_candidates(&self) -> Vec<String> {
        let base = self
            .name
            .strip_suffix(SIGNATURE_SUFFIX)
            .unwrap_or(&self.name)
            .to_string();
        if self.compressed {
            return vec![base];
        }
        let compressed = format!("{}{}", base, COMPRESSED_SUFFIX);
        vec![base, compressed]
    }

    /// Name of sidecar `id` belonging to this record file.
    pub fn sidecar_name(&self, id: u32) -> String {
        format!("{}_{:02}.rcd{}", self.timestamp_part(), id, COMPRESSED_SUFFIX)
    }
}

fn timestamp_text(timestamp: i64) -> Result<String> {
    let instant = format_instant(timestamp)?;
    Ok(instant.replace(':', "_"))
}

impl Ord for StreamFilename {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for StreamFilename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StreamFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_signature() {
        let name = StreamFilename::parse("2019-08-30T18_10_00.419072Z.rcd_sig").unwrap();
        assert_eq!(name.stream_type(), StreamType::Record);
        assert_eq!(name.file_type(), FileType::Signature);
        assert_eq!(name.extension(), "rcd");
        assert_eq!(name.timestamp(), 1_567_188_600_419_072_000);
        assert_eq!(
            name.data_name_candidates(),
            vec![
                "2019-08-30T18_10_00.419072Z.rcd".to_string(),
                "2019-08-30T18_10_00.419072Z.rcd.gz".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_balance_files() {
        let csv = StreamFilename::parse("2019-08-30T18_15_00.016002001Z_Balances.csv").unwrap();
        assert_eq!(csv.stream_type(), StreamType::Balance);
        assert_eq!(csv.extension(), "csv");
        assert_eq!(csv.signature_name(), "2019-08-30T18_15_00.016002001Z_Balances.csv_sig");

        let pb = StreamFilename::parse("2023-01-01T00_00_00.000000000Z_Balances.pb.gz").unwrap();
        assert!(pb.is_compressed());
        assert_eq!(pb.signature_name(), "2023-01-01T00_00_00.000000000Z_Balances.pb_sig");
    }

    #[test]
    fn test_parse_sidecar() {
        let record = StreamFilename::parse("2022-07-13T08_46_08.041986003Z.rcd.gz").unwrap();
        let sidecar_name = record.sidecar_name(1);
        assert_eq!(sidecar_name, "2022-07-13T08_46_08.041986003Z_01.rcd.gz");

        let sidecar = StreamFilename::parse(&sidecar_name).unwrap();
        assert_eq!(sidecar.file_type(), FileType::Sidecar);
        assert_eq!(sidecar.sidecar_id(), Some(1));
        assert_eq!(sidecar.timestamp(), record.timestamp());
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            "README.md",
            "2019-08-30T18_10_00.419072Z.txt",
            "2019-08-30T18_10_00.419072Z_Balances.rcd",
            "not-a-dateZ.rcd",
        ] {
            assert!(StreamFilename::parse(name).is_err(), "{} should fail", name);
        }
    }

    #[test]
    fn test_from_timestamp_roundtrip() {
        let ts = 1_600_000_000_000_000_123;
        let sig = StreamFilename::from_timestamp(
            StreamType::Record,
            FileType::Signature,
            ts,
            "rcd",
            false,
        )
        .unwrap();
        assert_eq!(sig.name(), "2020-09-13T12_26_40.000000123Z.rcd_sig");
        assert_eq!(sig.timestamp(), ts);
    }

    #[test]
    fn test_ordering_by_timestamp() {
        let a = StreamFilename::parse("2019-08-30T18_10_00.419072Z.rcd").unwrap();
        let b = StreamFilename::parse("2019-08-30T18_10_05.000000001Z.rcd").unwrap();
        assert!(a < b);
    }
}
