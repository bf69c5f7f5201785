use serde::{Deserialize, Serialize};

const UNSET: &str = "null";

fn unset() -> String {
    UNSET.to_string()
}

/// Identity strings sent in reply to a version request.
///
/// Any field left out of a config file reads `"null"`, like a firmware image
/// built without the corresponding define.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareInfo {
    pub project_name: String,
    pub target: String,
    pub version: String,
    pub version_suffix: String,
    pub build_date: String,
    pub copyright: String,
    pub license: String,
}

impl Default for FirmwareInfo {
    fn default() -> Self {
        Self {
            project_name: unset(),
            target: unset(),
            version: unset(),
            version_suffix: unset(),
            build_date: unset(),
            copyright: unset(),
            license: unset(),
        }
    }
}

impl FirmwareInfo {
    /// Identity of this build. Target, suffix and date come from the
    /// `SERLINK_TARGET`, `SERLINK_VERSION_SUFFIX` and `SERLINK_BUILD_DATE`
    /// environment variables at compile time.
    pub fn from_build() -> Self {
        let env_or_unset = |value: Option<&str>| value.map_or_else(unset, str::to_string);
        Self {
            project_name: env!("CARGO_PKG_NAME").to_string(),
            target: env_or_unset(option_env!("SERLINK_TARGET")),
            version: env!("CARGO_PKG_VERSION").to_string(),
            version_suffix: env_or_unset(option_env!("SERLINK_VERSION_SUFFIX")),
            build_date: env_or_unset(option_env!("SERLINK_BUILD_DATE")),
            copyright: env_or_unset(option_env!("SERLINK_COPYRIGHT")),
            license: env!("CARGO_PKG_LICENSE").to_string(),
        }
    }

    pub fn version_line(&self) -> String {
        format!(
            "\n{} {} firmware {}{}, build {}\n",
            self.project_name, self.target, self.version, self.version_suffix, self.build_date
        )
    }

    pub fn copyright_line(&self) -> String {
        format!("{}\n", self.copyright)
    }

    pub fn license_line(&self) -> String {
        format!("{}\n", self.license)
    }
}
