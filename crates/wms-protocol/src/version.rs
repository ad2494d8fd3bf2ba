//! Protocol version negotiation.

use crate::error::WmsError;

/// The WMS protocol versions this server speaks, in protocol order.
///
/// Requests carrying any other `x.y.z` version are floored onto the nearest
/// supported version at parse time: anything below 1.0.7 becomes 1.0.0,
/// anything below 1.1.0 becomes 1.0.7, 1.1.0 stays, everything newer is
/// answered as 1.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WmsVersion {
    V1_0_0,
    V1_0_7,
    V1_1_0,
    V1_1_1,
}

impl WmsVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            WmsVersion::V1_0_0 => "1.0.0",
            WmsVersion::V1_0_7 => "1.0.7",
            WmsVersion::V1_1_0 => "1.1.0",
            WmsVersion::V1_1_1 => "1.1.1",
        }
    }

    /// Parse and floor a version string.
    pub fn parse(s: &str) -> Result<WmsVersion, WmsError> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(WmsError::Other(format!(
                "Invalid version ({}): version must be in x.y.z format.",
                s
            )));
        }
        let mut nums = [0u32; 3];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part.parse().map_err(|_| {
                WmsError::Other(format!(
                    "Invalid version ({}): version must be in x.y.z format.",
                    s
                ))
            })?;
        }
        Ok(WmsVersion::floor(nums[0], nums[1], nums[2]))
    }

    fn floor(major: u32, minor: u32, revision: u32) -> WmsVersion {
        let code = (major, minor, revision);
        if code < (1, 0, 7) {
            WmsVersion::V1_0_0
        } else if code < (1, 1, 0) {
            WmsVersion::V1_0_7
        } else if code == (1, 1, 0) {
            WmsVersion::V1_1_0
        } else {
            WmsVersion::V1_1_1
        }
    }
}

impl std::fmt::Display for WmsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the VERSION (or legacy WMTVER) parameter value.
///
/// `None` means the parameter was absent; a malformed value is an error the
/// dispatcher reports with version-unset exception formatting.
pub fn parse_version_param(value: Option<&str>) -> Result<Option<WmsVersion>, WmsError> {
    match value {
        None => Ok(None),
        Some(v) => WmsVersion::parse(v).map(Some),
    }
}
