use super::path_utils::sanitize_path_component;
use crate::Result;
use core::fmt::{Display, Formatter, Result as FmtResult};
use core::str::FromStr;
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A registry-scoped package name, or a `group:artifact` pair for Maven.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem used when persisting this package's metadata.
    #[must_use]
    pub fn storage_name(&self) -> String {
        sanitize_path_component(&self.0)
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A Maven `group:artifact` coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenCoordinate {
    pub group_id: String,
    pub artifact_id: String,
}

impl MavenCoordinate {
    /// Group id with dots turned into repository path separators.
    #[must_use]
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }
}

impl FromStr for MavenCoordinate {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((group_id, artifact_id)) = s.split_once(':') else {
            bail!("invalid Maven coordinate '{s}': expected 'group:artifact'");
        };

        if group_id.is_empty() || artifact_id.is_empty() || artifact_id.contains(':') {
            bail!("invalid Maven coordinate '{s}': expected 'group:artifact'");
        }

        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })
    }
}

impl Display for MavenCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Parse a package list file: one identifier per line, blank lines ignored.
#[must_use]
pub fn parse_package_list(text: &str) -> Vec<PackageId> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PackageId::new)
        .collect()
}

/// Remove repeated identifiers, keeping the first occurrence of each.
#[must_use]
pub fn dedup_in_order(ids: impl IntoIterator<Item = PackageId>) -> Vec<PackageId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
