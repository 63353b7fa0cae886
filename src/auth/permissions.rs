use crate::core::errors::{Error, Result};
use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

/// Per-user capability flags, stored as a bitmask in the users table.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Read = 0b00000001,
    Write = 0b00000010,
    Delete = 0b00000100,
    Create = 0b00001000,
    Upload = 0b00010000,
    Download = 0b00100000,
}

impl Permission {
    /// Parses the string names used on the wire into a flag set. Unknown
    /// names are rejected rather than ignored.
    pub fn from_names(names: &[String]) -> Result<BitFlags<Permission>> {
        let mut flags = BitFlags::empty();
        for name in names {
            flags |= match name.as_str() {
                "Read" => Permission::Read,
                "Write" => Permission::Write,
                "Delete" => Permission::Delete,
                "Create" => Permission::Create,
                "Upload" => Permission::Upload,
                "Download" => Permission::Download,
                other => {
                    return Err(Error::invalid_input(format!("invalid permission: {other}")))
                }
            };
        }
        Ok(flags)
    }

    pub fn names(flags: BitFlags<Permission>) -> Vec<String> {
        flags.iter().map(|flag| format!("{flag:?}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_names_accumulates_flags() {
        let flags = Permission::from_names(&[
            "Read".to_string(),
            "Write".to_string(),
            "Delete".to_string(),
        ])
        .unwrap();

        assert!(flags.contains(Permission::Read));
        assert!(flags.contains(Permission::Write));
        assert!(flags.contains(Permission::Delete));
        assert!(!flags.contains(Permission::Create));
        assert!(!flags.contains(Permission::Upload));
        assert!(!flags.contains(Permission::Download));
    }

    #[test]
    fn from_names_empty_is_empty() {
        let flags = Permission::from_names(&[]).unwrap();
        assert_eq!(flags, BitFlags::empty());
    }

    #[test]
    fn from_names_rejects_unknown() {
        let result = Permission::from_names(&["Read".to_string(), "Fly".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn names_round_trip() {
        let flags = Permission::Read | Permission::Upload;
        let names = Permission::names(flags);
        assert_eq!(Permission::from_names(&names).unwrap(), flags);
    }

    #[test]
    fn bitmask_round_trips_through_storage_width() {
        let flags = Permission::Read | Permission::Write | Permission::Download;
        let raw = flags.bits();
        let restored = BitFlags::<Permission>::from_bits_truncate(raw);
        assert_eq!(restored, flags);
    }
}
