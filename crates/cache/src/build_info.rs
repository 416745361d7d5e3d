//! Active build metadata (`.build.info`).
//!
//! The file is a pipe-separated table. The header row names each column as
//! `Name!TYPE:size`; every following row describes one build. The row whose
//! `Active` column is `1` is the build currently served.

use std::path::Path;

/// Version reported when no active build can be read.
pub const DEFAULT_BUILD_VERSION: &str = "0.0.0.0";

const ACTIVE_COLUMN: &str = "Active";
const VERSION_COLUMN: &str = "Version";

/// Parsed build metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl BuildInfo {
    /// Parse build metadata text.
    ///
    /// Blank lines and lines starting with `#` are skipped. Short rows are
    /// padded with empty cells.
    pub fn parse(text: &str) -> Self {
        let mut lines = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty() && !line.starts_with('#'));

        let columns: Vec<String> = match lines.next() {
            Some(header) => header
                .split('|')
                .map(|cell| cell.split('!').next().unwrap_or_default().trim().to_string())
                .collect(),
            None => return Self::default(),
        };

        let rows: Vec<Vec<String>> = lines
            .map(|line| {
                let mut cells: Vec<String> =
                    line.split('|').map(|c| c.trim().to_string()).collect();
                cells.resize(columns.len(), String::new());
                cells
            })
            .collect();

        Self { columns, rows }
    }

    /// Value of `column` in the first active row.
    pub fn active_value(&self, column: &str) -> Option<&str> {
        let active_idx: usize = self.column_index(ACTIVE_COLUMN)?;
        let value_idx: usize = self.column_index(column)?;
        self.rows
            .iter()
            .find(|row| row[active_idx] == "1")
            .map(|row| row[value_idx].as_str())
            .filter(|value| !value.is_empty())
    }

    /// Version of the active build.
    pub fn active_version(&self) -> Option<&str> {
        self.active_value(VERSION_COLUMN)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Read the active build version, falling back to `DEFAULT_BUILD_VERSION`.
///
/// # Arguments
/// * `path` - Location of the `.build.info` file
pub fn read_active_version(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => match BuildInfo::parse(&text).active_version() {
            Some(version) => version.to_string(),
            None => {
                log::warn!(
                    "No active build version in {}, using {}",
                    path.display(),
                    DEFAULT_BUILD_VERSION
                );
                DEFAULT_BUILD_VERSION.to_string()
            }
        },
        Err(e) => {
            log::info!(
                "Build info {} unavailable ({}), using {}",
                path.display(),
                e,
                DEFAULT_BUILD_VERSION
            );
            DEFAULT_BUILD_VERSION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Path!STRING:0|Version!STRING:0|Product!STRING:0
eu|0|aaaa|tpr/wow|1.12.1.5875|wow
us|1|bbbb|tpr/wow|8.0.1.26321|wow
";

    #[test]
    fn test_parse_active_version() {
        let info: BuildInfo = BuildInfo::parse(SAMPLE);
        assert_eq!(info.active_version(), Some("8.0.1.26321"));
        assert_eq!(info.active_value("CDN Path"), Some("tpr/wow"));
    }

    #[test]
    fn test_no_active_row() {
        let info: BuildInfo = BuildInfo::parse(
            "Active!DEC:1|Version!STRING:0\n0|1.0.0.1\n",
        );
        assert_eq!(info.active_version(), None);
    }

    #[test]
    fn test_missing_column_and_short_rows() {
        let info: BuildInfo = BuildInfo::parse("Active!DEC:1|Version!STRING:0\n1\n");
        assert_eq!(info.active_version(), None);

        let no_version: BuildInfo = BuildInfo::parse("Active!DEC:1|Branch!STRING:0\n1|us\n");
        assert_eq!(no_version.active_version(), None);
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let info: BuildInfo = BuildInfo::parse(
            "## seqn = 1\n\nActive!DEC:1|Version!STRING:0\n\n1|2.0.0.2\n",
        );
        assert_eq!(info.active_version(), Some("2.0.0.2"));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(BuildInfo::parse("").active_version(), None);
    }

    #[test]
    fn test_read_active_version_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".build.info");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(read_active_version(&path), "8.0.1.26321");
    }

    #[test]
    fn test_read_active_version_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(".build.info");
        assert_eq!(read_active_version(&missing), DEFAULT_BUILD_VERSION);

        std::fs::write(&missing, "Active!DEC:1|Version!STRING:0\n0|1.0\n").unwrap();
        assert_eq!(read_active_version(&missing), DEFAULT_BUILD_VERSION);
    }
}
