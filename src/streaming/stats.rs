//! Scaling of progress payloads for display.
//!
//! Byte counts are rendered as `[integer, fraction, unit]` triples with two
//! fractional digits, rounded half up. Archive counters are `/`-separated
//! triples where `-` means unknown.

use serde::{Deserialize, Serialize};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteUnit {
    #[serde(rename = "KB")]
    Kb,
    #[serde(rename = "MB")]
    Mb,
    #[serde(rename = "GB")]
    Gb,
}

impl ByteUnit {
    /// Pick the unit for one value: below 1 MiB is KB, below 1 GiB is MB.
    pub fn for_bytes(bytes: u64) -> Self {
        if bytes < MIB {
            Self::Kb
        } else if bytes < GIB {
            Self::Mb
        } else {
            Self::Gb
        }
    }

    pub fn divisor(&self) -> u64 {
        match self {
            Self::Kb => KIB,
            Self::Mb => MIB,
            Self::Gb => GIB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kb => "KB",
            Self::Mb => "MB",
            Self::Gb => "GB",
        }
    }
}

/// A scaled byte value, serialized as `["2", "86", "MB"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledBytes(pub String, pub String, pub ByteUnit);

impl ScaledBytes {
    pub fn from_bytes(bytes: u64) -> Self {
        let unit = ByteUnit::for_bytes(bytes);
        let divisor = u128::from(unit.divisor());
        // Hundredths of a unit, rounded half up
        let hundredths = (u128::from(bytes) * 200 + divisor) / (2 * divisor);

        Self(
            (hundredths / 100).to_string(),
            format!("{:02}", hundredths % 100),
            unit,
        )
    }

    pub fn integer(&self) -> &str {
        &self.0
    }

    pub fn fraction(&self) -> &str {
        &self.1
    }

    pub fn unit(&self) -> ByteUnit {
        self.2
    }
}

impl std::fmt::Display for ScaledBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} {}", self.0, self.1, self.2.as_str())
    }
}

/// Progress and total of an upload, each scaled independently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteStats {
    pub progress: ScaledBytes,
    pub total: ScaledBytes,
    /// Whole percent done, `0` when the total is unknown
    pub percent: u8,
}

/// Counters reported while building an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub archived: [u64; 3],
}

/// Scale a raw byte pair.
pub fn format_byte_stats(progress_bytes: u64, total_bytes: u64) -> ByteStats {
    let percent = if total_bytes == 0 {
        0
    } else {
        (u128::from(progress_bytes) * 100 / u128::from(total_bytes)).min(100) as u8
    };

    ByteStats {
        progress: ScaledBytes::from_bytes(progress_bytes),
        total: ScaledBytes::from_bytes(total_bytes),
        percent,
    }
}

/// Parse and scale a `<progressBytes>/<totalBytes>` payload.
///
/// Returns `None` when the separator is missing or either side is not a byte count.
pub fn parse_byte_stats(payload: &str) -> Option<ByteStats> {
    let (progress, total) = payload.split_once('/')?;
    let progress = progress.trim().parse::<u64>().ok()?;
    let total = total.trim().parse::<u64>().ok()?;
    Some(format_byte_stats(progress, total))
}

/// Parse a `<n0>/<n1>[/<n2>]` archive payload.
///
/// `-`, a missing third field, or any other non-count field maps to `0`.
/// Returns `None` when no separator is present.
pub fn format_archive_stats(payload: &str) -> Option<ArchiveStats> {
    if !payload.contains('/') {
        return None;
    }

    let mut archived = [0u64; 3];
    for (slot, field) in archived.iter_mut().zip(payload.split('/')) {
        *slot = match field.trim() {
            "-" => 0,
            count => count.parse().unwrap_or(0),
        };
    }

    Some(ArchiveStats { archived })
}
