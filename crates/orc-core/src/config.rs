/// Location-grammar parsing (§6 "Location grammar") and the two
/// environment variables the core reads directly.
use crate::error::{OrcError, Result};
use std::collections::HashMap;

/// One parsed volume-addressing location, prior to opening any
/// [`crate::volume::VolumeReader`]. Each variant carries exactly the tokens
/// its grammar line in §6 allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationSpec {
    /// `[A-Za-z]:\subdir?`
    MountedDrive { drive_letter: char, subdir: Option<String> },
    /// `\\?\Volume{UUID}\subdir?`
    VolumeId { volume_id: String, subdir: Option<String> },
    /// `\\.\HarddiskVolumeN`
    HarddiskVolume { number: u32 },
    /// `\\.\PhysicalDriveN[,offset=…[,size=…[,sector=…]]]`
    PhysicalDrive {
        number: u32,
        offset: Option<u64>,
        size: Option<u64>,
        sector: Option<u32>,
    },
    /// `path[,partition=N|*][,offset=…[,size=…[,sector=…]]]`
    ImageFile {
        path: String,
        partition: Option<PartitionSelector>,
        offset: Option<u64>,
        size: Option<u64>,
        sector: Option<u32>,
    },
    /// `\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopyN`
    Snapshot { number: u32 },
    /// Any other path; validated as an offline MFT dump by its caller
    /// opening the file and checking the `"FILE"` stamp, per §6.
    OfflineMft { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSelector {
    Index(usize),
    Any,
}

/// Parses one location string against the grammar in §6. Order matters:
/// the more specific device-path forms are tried before falling back to
/// "plain path", since a plain path is the catch-all.
pub fn parse_location(raw: &str) -> Result<LocationSpec> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy") {
        let number: u32 = rest
            .parse()
            .map_err(|_| config_err(raw, "malformed shadow-copy device number"))?;
        return Ok(LocationSpec::Snapshot { number });
    }

    if let Some(rest) = raw.strip_prefix("\\\\?\\Volume{") {
        let Some(end) = rest.find('}') else {
            return Err(config_err(raw, "unterminated Volume{...} GUID"));
        };
        let volume_id = rest[..end].to_string();
        let subdir = rest[end + 1..].strip_prefix('\\').map(|s| s.to_string());
        return Ok(LocationSpec::VolumeId { volume_id, subdir });
    }

    if let Some(rest) = raw.strip_prefix("\\\\.\\HarddiskVolume") {
        let (number_part, _) = split_options(rest);
        let number: u32 = number_part
            .parse()
            .map_err(|_| config_err(raw, "malformed HarddiskVolume number"))?;
        return Ok(LocationSpec::HarddiskVolume { number });
    }

    if let Some(rest) = raw.strip_prefix("\\\\.\\PhysicalDrive") {
        let (number_part, options) = split_options(rest);
        let number: u32 = number_part
            .parse()
            .map_err(|_| config_err(raw, "malformed PhysicalDrive number"))?;
        let opts = parse_options(&options)?;
        return Ok(LocationSpec::PhysicalDrive {
            number,
            offset: opts.get_u64("offset")?,
            size: opts.get_u64("size")?,
            sector: opts.get_u32("sector")?,
        });
    }

    if !raw.contains(',')
        && raw.len() >= 2
        && raw.as_bytes()[1] == b':'
        && raw.chars().next().unwrap().is_ascii_alphabetic()
    {
        let drive_letter = raw.chars().next().unwrap();
        let rest = &raw[2..];
        let subdir = rest.strip_prefix('\\').map(|s| s.to_string()).filter(|s| !s.is_empty());
        return Ok(LocationSpec::MountedDrive { drive_letter, subdir });
    }

    // Image file: trailing `,partition=…`/`,offset=…`/`,size=…`/`,sector=…`
    // tokens on an otherwise plain path.
    let (path_part, options) = split_options(raw);
    if !options.is_empty() {
        let opts = parse_options(&options)?;
        let partition = match opts.raw.get("partition") {
            Some(v) if v == "*" => Some(PartitionSelector::Any),
            Some(v) => Some(PartitionSelector::Index(
                v.parse().map_err(|_| config_err(raw, "malformed partition selector"))?,
            )),
            None => None,
        };
        return Ok(LocationSpec::ImageFile {
            path: path_part.to_string(),
            partition,
            offset: opts.get_u64("offset")?,
            size: opts.get_u64("size")?,
            sector: opts.get_u32("sector")?,
        });
    }

    Ok(LocationSpec::OfflineMft { path: raw.to_string() })
}

fn config_err(raw: &str, reason: &str) -> OrcError {
    OrcError::Config {
        reason: format!("invalid location '{raw}': {reason}"),
    }
}

/// Splits `prefix,key=val,key=val` into `(prefix, "key=val,key=val")`.
fn split_options(s: &str) -> (&str, String) {
    match s.find(',') {
        Some(pos) => (&s[..pos], s[pos + 1..].to_string()),
        None => (s, String::new()),
    }
}

struct Options {
    raw: HashMap<String, String>,
}

impl Options {
    fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.raw.get(key) {
            Some(v) => Ok(Some(
                v.parse()
                    .map_err(|_| OrcError::Config { reason: format!("'{key}={v}' is not a valid integer") })?,
            )),
            None => Ok(None),
        }
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        Ok(self.get_u64(key)?.map(|v| v as u32))
    }
}

fn parse_options(s: &str) -> Result<Options> {
    let mut raw = HashMap::new();
    if s.is_empty() {
        return Ok(Options { raw });
    }
    for token in s.split(',') {
        let Some((k, v)) = token.split_once('=') else {
            return Err(OrcError::Config {
                reason: format!("malformed location option '{token}'"),
            });
        };
        raw.insert(k.to_string(), v.to_string());
    }
    Ok(Options { raw })
}

/// `DFIR-ORC_DEFAULT_ALTITUDE` — controls how duplicate volumes (the same
/// physical volume reachable through more than one device path) are
/// deduplicated before walking, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Altitude {
    Lowest,
    Highest,
    Exact,
}

impl Altitude {
    pub const ENV_VAR: &'static str = "DFIR-ORC_DEFAULT_ALTITUDE";

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lowest" => Some(Self::Lowest),
            "highest" => Some(Self::Highest),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }

    /// Reads [`Self::ENV_VAR`], defaulting to `Highest` when unset or
    /// unrecognized (the original system's documented default).
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or(Self::Highest)
    }
}

/// `OfflineLocation` — when set, its value is an absolute path making
/// "offline mode" implicit: every location in the run is interpreted
/// relative to this dump rather than a live system.
pub const OFFLINE_LOCATION_ENV_VAR: &str = "OfflineLocation";

pub fn offline_location_from_env() -> Option<String> {
    std::env::var(OFFLINE_LOCATION_ENV_VAR).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mounted_drive_with_subdir() {
        let spec = parse_location("C:\\Users\\Public").unwrap();
        assert_eq!(
            spec,
            LocationSpec::MountedDrive {
                drive_letter: 'C',
                subdir: Some("Users\\Public".into())
            }
        );
    }

    #[test]
    fn parses_mounted_drive_without_subdir() {
        let spec = parse_location("D:").unwrap();
        assert_eq!(
            spec,
            LocationSpec::MountedDrive {
                drive_letter: 'D',
                subdir: None
            }
        );
    }

    #[test]
    fn parses_volume_id_with_subdir() {
        let spec = parse_location("\\\\?\\Volume{12345678-1234-1234-1234-123456789abc}\\evidence").unwrap();
        assert_eq!(
            spec,
            LocationSpec::VolumeId {
                volume_id: "12345678-1234-1234-1234-123456789abc".into(),
                subdir: Some("evidence".into())
            }
        );
    }

    #[test]
    fn parses_harddisk_volume() {
        let spec = parse_location("\\\\.\\HarddiskVolume4").unwrap();
        assert_eq!(spec, LocationSpec::HarddiskVolume { number: 4 });
    }

    #[test]
    fn parses_physical_drive_with_offset_and_size() {
        let spec = parse_location("\\\\.\\PhysicalDrive0,offset=1048576,size=2097152").unwrap();
        assert_eq!(
            spec,
            LocationSpec::PhysicalDrive {
                number: 0,
                offset: Some(1_048_576),
                size: Some(2_097_152),
                sector: None,
            }
        );
    }

    #[test]
    fn parses_image_file_with_partition_wildcard() {
        let spec = parse_location("C:\\dumps\\disk.img,partition=*").unwrap();
        assert_eq!(
            spec,
            LocationSpec::ImageFile {
                path: "C:\\dumps\\disk.img".into(),
                partition: Some(PartitionSelector::Any),
                offset: None,
                size: None,
                sector: None,
            }
        );
    }

    #[test]
    fn parses_image_file_with_numbered_partition() {
        let spec = parse_location("C:\\dumps\\disk.img,partition=2").unwrap();
        assert_eq!(
            spec,
            LocationSpec::ImageFile {
                path: "C:\\dumps\\disk.img".into(),
                partition: Some(PartitionSelector::Index(2)),
                offset: None,
                size: None,
                sector: None,
            }
        );
    }

    #[test]
    fn parses_snapshot_device_path() {
        let spec = parse_location("\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy7").unwrap();
        assert_eq!(spec, LocationSpec::Snapshot { number: 7 });
    }

    #[test]
    fn falls_back_to_offline_mft_for_plain_path() {
        let spec = parse_location("\\\\server\\share\\mft.raw").unwrap();
        assert_eq!(spec, LocationSpec::OfflineMft { path: "\\\\server\\share\\mft.raw".into() });
    }

    #[test]
    fn rejects_malformed_physical_drive_number() {
        let err = parse_location("\\\\.\\PhysicalDriveX").unwrap_err();
        assert!(matches!(err, OrcError::Config { .. }));
    }

    #[test]
    fn altitude_parses_known_values() {
        assert_eq!(Altitude::parse("lowest"), Some(Altitude::Lowest));
        assert_eq!(Altitude::parse("exact"), Some(Altitude::Exact));
        assert_eq!(Altitude::parse("bogus"), None);
    }
}
