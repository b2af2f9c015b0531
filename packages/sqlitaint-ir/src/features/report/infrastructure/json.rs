//! JSON report output

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::features::report::domain::Report;

pub struct JsonReporter;

impl JsonReporter {
    pub fn to_string(report: &Report) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    pub fn save(report: &Report, path: &Path) -> Result<()> {
        let json = Self::to_string(report)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Report> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("report.json");
        let report = Report::new(vec!["/app/index.php".into()]);

        JsonReporter::save(&report, &path).expect("save");
        let loaded = JsonReporter::load(&path).expect("load");
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_empty_report_shape() {
        let json = JsonReporter::to_string(&Report::new(vec![])).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["results"], serde_json::json!([]));
        assert_eq!(value["paths"]["scanned"], serde_json::json!([]));
    }
}
