//! Coverage report verification
//!
//! Parses a Cobertura-style coverage XML report and enforces a line-coverage
//! threshold. The parser is deliberately tolerant: it prefers the root
//! `line-rate` attribute, falls back to summing `lines-covered`/`lines-valid`
//! style attributes across the document, and finally accepts any element
//! carrying a `line-rate`.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};

use crate::checks::CheckError;

/// Outcome of the coverage gate.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageCheck {
    Passed { percent: f64 },
    Failed(CoverageFailure),
}

/// Why the coverage gate failed.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageFailure {
    MissingReport(PathBuf),
    EmptyReport,
    Undeterminable,
    BelowThreshold {
        percent: f64,
        threshold: f64,
        /// First file in the report whose own line-rate is under threshold
        worst_file: Option<String>,
    },
}

impl CoverageFailure {
    /// Render the failure as a `FAIL:` line.
    pub fn render(&self, report: &Path) -> String {
        match self {
            CoverageFailure::MissingReport(path) => {
                format!("FAIL: coverage report not found at {}", path.display())
            }
            CoverageFailure::EmptyReport => {
                format!("FAIL: no content on {}", report_name(report))
            }
            CoverageFailure::Undeterminable => format!(
                "FAIL: unable to determine line coverage from {}",
                report_name(report)
            ),
            CoverageFailure::BelowThreshold {
                percent,
                threshold,
                worst_file,
            } => {
                let subject = worst_file
                    .clone()
                    .unwrap_or_else(|| report_name(report).to_string());
                format!(
                    "FAIL: {} coverage under {}% ({:.2}%)",
                    subject, threshold, percent
                )
            }
        }
    }
}

fn report_name(report: &Path) -> &str {
    report
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("coverage.xml")
}

/// Extract the overall line coverage percentage from coverage XML.
pub fn coverage_from_xml(content: &str) -> Option<f64> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut root_line_rate: Option<f64> = None;
    let mut any_line_rate: Option<f64> = None;
    let mut covered: u64 = 0;
    let mut valid: u64 = 0;
    let mut first_element = true;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let mut line_rate: Option<f64> = None;
                let mut elem_covered: Option<f64> = None;
                let mut elem_valid: Option<f64> = None;

                for attr in e.attributes().flatten() {
                    let value = match attr.unescape_value() {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    match attr.key.as_ref() {
                        b"line-rate" => line_rate = value.parse().ok(),
                        b"lines-covered" | b"covered" => elem_covered = value.parse().ok(),
                        b"lines-valid" | b"valid" | b"lines_total" | b"lines-total" => {
                            elem_valid = value.parse().ok()
                        }
                        _ => {}
                    }
                }

                if first_element {
                    root_line_rate = line_rate;
                    first_element = false;
                }
                if any_line_rate.is_none() {
                    any_line_rate = line_rate;
                }
                if let (Some(c), Some(v)) = (elem_covered, elem_valid) {
                    covered += c as u64;
                    valid += v as u64;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    if let Some(rate) = root_line_rate {
        return Some(rate * 100.0);
    }
    if valid > 0 {
        return Some((covered as f64 / valid as f64) * 100.0);
    }
    any_line_rate.map(|rate| rate * 100.0)
}

/// Filenames in the report whose own `line-rate` is below the threshold.
pub fn low_coverage_files(content: &str, threshold: f64) -> Vec<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut low = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let mut filename: Option<String> = None;
                let mut line_rate: Option<f64> = None;
                for attr in e.attributes().flatten() {
                    let Ok(value) = attr.unescape_value() else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"filename" => filename = Some(value.into_owned()),
                        b"line-rate" => line_rate = value.parse().ok(),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rate)) = (filename, line_rate) {
                    if rate * 100.0 < threshold {
                        low.push(name);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    low
}

/// Verify the coverage report at `report` against `threshold` percent.
pub fn check_coverage(report: &Path, threshold: f64) -> Result<CoverageCheck, CheckError> {
    if !report.exists() {
        return Ok(CoverageCheck::Failed(CoverageFailure::MissingReport(
            report.to_path_buf(),
        )));
    }

    let content = std::fs::read_to_string(report)?;
    if content.is_empty() {
        return Ok(CoverageCheck::Failed(CoverageFailure::EmptyReport));
    }

    let Some(percent) = coverage_from_xml(&content) else {
        return Ok(CoverageCheck::Failed(CoverageFailure::Undeterminable));
    };

    if percent < threshold {
        let worst_file = low_coverage_files(&content, threshold).into_iter().next();
        return Ok(CoverageCheck::Failed(CoverageFailure::BelowThreshold {
            percent,
            threshold,
            worst_file,
        }));
    }

    Ok(CoverageCheck::Passed { percent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_root_line_rate_wins() {
        let xml = r#"<coverage line-rate="0.92"><packages/></coverage>"#;
        let pct = coverage_from_xml(xml).unwrap();
        assert!((pct - 92.0).abs() < 1e-9);
    }

    #[test]
    fn test_summed_lines_covered_valid() {
        let xml = r#"<coverage>
            <package lines-covered="40" lines-valid="50"/>
            <package lines-covered="35" lines-valid="50"/>
        </coverage>"#;
        let pct = coverage_from_xml(xml).unwrap();
        assert!((pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_nested_line_rate_fallback() {
        let xml = r#"<coverage><class line-rate="0.5"/></coverage>"#;
        let pct = coverage_from_xml(xml).unwrap();
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_undeterminable() {
        assert!(coverage_from_xml("<coverage><x/></coverage>").is_none());
        assert!(coverage_from_xml("not xml at all <<<").is_none());
    }

    #[test]
    fn test_low_coverage_files() {
        let xml = r#"<coverage line-rate="0.6">
            <class filename="src/uart.c" line-rate="0.95"/>
            <class filename="src/gpio.c" line-rate="0.40"/>
        </coverage>"#;
        let low = low_coverage_files(xml, 80.0);
        assert_eq!(low, vec!["src/gpio.c".to_string()]);
    }

    #[test]
    fn test_check_missing_report() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("coverage.xml");
        let result = check_coverage(&report, 80.0).unwrap();
        assert!(matches!(
            result,
            CoverageCheck::Failed(CoverageFailure::MissingReport(_))
        ));
    }

    #[test]
    fn test_check_empty_report() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("coverage.xml");
        fs::write(&report, "").unwrap();
        let result = check_coverage(&report, 80.0).unwrap();
        assert_eq!(
            result,
            CoverageCheck::Failed(CoverageFailure::EmptyReport)
        );
    }

    #[test]
    fn test_check_below_threshold_names_worst_file() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("coverage.xml");
        fs::write(
            &report,
            r#"<coverage line-rate="0.70">
                <class filename="src/gpio.c" line-rate="0.40"/>
            </coverage>"#,
        )
        .unwrap();
        let result = check_coverage(&report, 80.0).unwrap();
        match result {
            CoverageCheck::Failed(failure @ CoverageFailure::BelowThreshold { .. }) => {
                let msg = failure.render(&report);
                assert!(msg.contains("src/gpio.c"), "message: {}", msg);
                assert!(msg.contains("70.00%"), "message: {}", msg);
            }
            other => panic!("expected below-threshold failure, got {:?}", other),
        }
    }

    #[test]
    fn test_check_passes() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("coverage.xml");
        fs::write(&report, r#"<coverage line-rate="0.85"/>"#).unwrap();
        let result = check_coverage(&report, 80.0).unwrap();
        assert_eq!(result, CoverageCheck::Passed { percent: 85.0 });
    }
}
