//! Resolution of input/output locations to text.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cryoet::alignment::error::{Result, ToolError};

/// A place alignment files are read from or written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    /// `scheme://path`, e.g. `s3://bucket/key`.
    Remote { scheme: String, path: String },
}

impl Location {
    pub fn parse(location: &str) -> Self {
        match location.split_once("://") {
            Some((scheme, path)) if !scheme.is_empty() => Location::Remote {
                scheme: scheme.to_string(),
                path: path.to_string(),
            },
            _ => Location::Local(PathBuf::from(location)),
        }
    }

    /// Appends `suffix` to the final path component (`TS_01` -> `TS_01.xf`).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        match self {
            Location::Local(path) => {
                let mut raw = path.clone().into_os_string();
                raw.push(suffix);
                Location::Local(PathBuf::from(raw))
            }
            Location::Remote { scheme, path } => Location::Remote {
                scheme: scheme.clone(),
                path: format!("{path}{suffix}"),
            },
        }
    }

    /// A file next to this location, in the same directory.
    pub fn sibling(&self, name: &str) -> Self {
        match self {
            Location::Local(path) => {
                let parent = path.parent().unwrap_or_else(|| Path::new(""));
                Location::Local(parent.join(name))
            }
            Location::Remote { scheme, path } => {
                let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
                let path = if parent.is_empty() {
                    name.to_string()
                } else {
                    format!("{parent}/{name}")
                };
                Location::Remote {
                    scheme: scheme.clone(),
                    path,
                }
            }
        }
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Location::Local(path) => Some(path),
            Location::Remote { .. } => None,
        }
    }
}

impl From<&str> for Location {
    fn from(location: &str) -> Self {
        Location::parse(location)
    }
}

/// Paths coming from the command line may still spell a `scheme://` location.
impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        match path.to_str() {
            Some(location) => Location::parse(location),
            None => Location::Local(path.to_path_buf()),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::from(path.as_path())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote { scheme, path } => write!(f, "{scheme}://{path}"),
        }
    }
}

/// Backend that moves alignment text in and out of storage.
pub trait TextStore {
    fn read_to_string(&self, location: &Location) -> Result<String>;
    fn write_string(&self, location: &Location, contents: &str) -> Result<()>;
    fn exists(&self, location: &Location) -> Result<bool>;
}

/// Store backed by the local filesystem. Remote locations are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl LocalStore {
    fn local<'a>(&self, location: &'a Location) -> Result<&'a Path> {
        location
            .as_local()
            .ok_or_else(|| ToolError::UnsupportedLocation(location.to_string()))
    }
}

impl TextStore for LocalStore {
    fn read_to_string(&self, location: &Location) -> Result<String> {
        Ok(fs::read_to_string(self.local(location)?)?)
    }

    fn write_string(&self, location: &Location, contents: &str) -> Result<()> {
        Ok(fs::write(self.local(location)?, contents)?)
    }

    fn exists(&self, location: &Location) -> Result<bool> {
        Ok(self.local(location)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_and_remote_locations() {
        assert_eq!(
            Location::parse("/data/TS_01/TS_01"),
            Location::Local(PathBuf::from("/data/TS_01/TS_01"))
        );
        assert_eq!(
            Location::parse("s3://bucket/TS_01/TS_01.aln"),
            Location::Remote {
                scheme: "s3".to_string(),
                path: "bucket/TS_01/TS_01.aln".to_string()
            }
        );
    }

    #[test]
    fn derives_companion_locations() {
        let base = Location::parse("/data/TS_01/TS_01");
        assert_eq!(base.with_suffix(".xf").to_string(), "/data/TS_01/TS_01.xf");
        assert_eq!(base.sibling("tilt.com").to_string(), "/data/TS_01/tilt.com");

        let remote = Location::parse("s3://bucket/TS_01/TS_01");
        assert_eq!(remote.with_suffix(".tlt").to_string(), "s3://bucket/TS_01/TS_01.tlt");
        assert_eq!(remote.sibling("newst.com").to_string(), "s3://bucket/TS_01/newst.com");
    }

    #[test]
    fn paths_with_a_scheme_are_remote() {
        assert_eq!(
            Location::from(Path::new("s3://bucket/TS_01.aln")),
            Location::Remote {
                scheme: "s3".to_string(),
                path: "bucket/TS_01.aln".to_string()
            }
        );
        assert_eq!(
            Location::from(PathBuf::from("data/TS_01.aln")),
            Location::Local(PathBuf::from("data/TS_01.aln"))
        );
    }

    #[test]
    fn local_store_rejects_remote_locations() {
        let err = LocalStore
            .read_to_string(&Location::parse("s3://bucket/key"))
            .unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedLocation(_)));
    }
}
