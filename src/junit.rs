//! JUnit XML report of a run
//!
//! Results are grouped the way CI systems display them: one test suite per
//! feature and one test case per scenario.

use crate::runner::{RunnerResult, Status};
use quick_junit::{NonSuccessKind, TestCase, TestCaseStatus, TestSuite};
use std::io::Write;
use std::time::Duration;

const REPORT_NAME: &str = "gherkube";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialise JUnit report: {0}")]
    Serialize(#[from] quick_junit::SerializeError),

    #[error("failed to write JUnit report: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
}

/// One scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    pub name: String,
    pub duration: Duration,
    pub result: TestResult,
    /// Failure or skip text, empty on `Pass`
    pub detail: String,
}

/// One feature
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub packages: Vec<Package>,
}

impl Report {
    /// Group results into packages and tests
    ///
    /// Consecutive results of the same feature share a package. Within a
    /// package, consecutive results of the same scenario collapse into one
    /// test that keeps the first outcome.
    pub fn from_results(results: &[RunnerResult]) -> Self {
        let mut packages: Vec<Package> = Vec::new();

        for result in results {
            if packages.last().map_or(true, |p| p.name != result.feature) {
                packages.push(Package {
                    name: result.feature.clone(),
                    tests: Vec::new(),
                });
            }

            if let Some(package) = packages.last_mut() {
                let duplicate = package
                    .tests
                    .last()
                    .is_some_and(|test| test.name == result.scenario);
                if !duplicate {
                    package.tests.push(Test::from_result(result));
                }
            }
        }

        Self { packages }
    }

    /// Number of test cases across all packages
    pub fn test_count(&self) -> usize {
        self.packages.iter().map(|p| p.tests.len()).sum()
    }

    pub fn to_junit(&self) -> quick_junit::Report {
        let mut report = quick_junit::Report::new(REPORT_NAME);

        for package in &self.packages {
            let mut suite = TestSuite::new(package.name.as_str());
            let mut total = Duration::ZERO;

            for test in &package.tests {
                let status = match test.result {
                    TestResult::Pass => TestCaseStatus::success(),
                    TestResult::Fail => {
                        let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                        status.set_description(test.detail.as_str());
                        status
                    }
                    TestResult::Skip => {
                        let mut status = TestCaseStatus::skipped();
                        status.set_message(test.detail.as_str());
                        status
                    }
                };

                let mut case = TestCase::new(test.name.as_str(), status);
                case.set_classname(package.name.as_str());
                case.set_time(test.duration);
                suite.add_test_case(case);
                total += test.duration;
            }

            suite.set_time(total);
            report.add_test_suite(suite);
        }

        report
    }

    /// Serialise as JUnit XML
    pub fn write_xml<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        self.to_junit().serialize(writer)?;
        Ok(())
    }

    /// Write the XML report to `path`
    pub fn write_file(&self, path: &std::path::Path) -> Result<(), ReportError> {
        let file = std::fs::File::create(path)?;
        self.write_xml(std::io::BufWriter::new(file))
    }
}

impl Test {
    fn from_result(result: &RunnerResult) -> Self {
        let (outcome, detail) = match result.status {
            Status::Passed => (TestResult::Pass, String::new()),
            Status::Failed => (TestResult::Fail, result.errors.join("\n")),
            Status::Skipped if result.errors.is_empty() => {
                (TestResult::Skip, "skipped".to_string())
            }
            Status::Skipped => (TestResult::Skip, result.errors.join("\n")),
        };

        Self {
            name: result.scenario.clone(),
            duration: result.duration,
            result: outcome,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(feature: &str, scenario: &str, status: Status) -> RunnerResult {
        RunnerResult {
            feature: feature.to_string(),
            scenario: scenario.to_string(),
            status,
            errors: match status {
                Status::Failed => vec!["boom".to_string()],
                _ => Vec::new(),
            },
            duration: Duration::from_millis(1234),
        }
    }

    fn xml(report: &Report) -> String {
        let mut out = Vec::new();
        report.write_xml(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_report() {
        let report = Report::from_results(&[]);
        assert!(report.packages.is_empty());

        let out = xml(&report);
        assert!(out.contains("<testsuites"));
        assert!(!out.contains("<testsuite "));
    }

    #[test]
    fn test_duplicate_scenario_collapses() {
        let report = Report::from_results(&[
            result("Build", "success", Status::Passed),
            result("Build", "success", Status::Passed),
        ]);

        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.packages[0].name, "Build");
        assert_eq!(report.packages[0].tests.len(), 1);

        let out = xml(&report);
        assert_eq!(out.matches("<testsuite ").count(), 1);
        assert!(out.contains(r#"name="Build""#));
        assert_eq!(out.matches("<testcase ").count(), 1);
        assert!(out.contains(r#"name="success""#));
        assert!(!out.contains("<failure"));
    }

    #[test]
    fn test_first_outcome_wins() {
        let report = Report::from_results(&[
            result("Build", "flaky", Status::Failed),
            result("Build", "flaky", Status::Passed),
        ]);
        assert_eq!(report.packages[0].tests[0].result, TestResult::Fail);
        assert_eq!(report.packages[0].tests[0].detail, "boom");
    }

    #[test]
    fn test_grouping_is_by_contiguous_runs() {
        let report = Report::from_results(&[
            result("A", "one", Status::Passed),
            result("A", "two", Status::Failed),
            result("B", "one", Status::Skipped),
            result("A", "one", Status::Passed),
            result("A", "one", Status::Passed),
            result("A", "two", Status::Passed),
        ]);

        let shape: Vec<(&str, usize)> = report
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.tests.len()))
            .collect();
        assert_eq!(shape, vec![("A", 2), ("B", 1), ("A", 2)]);
        assert_eq!(report.test_count(), 5);
    }

    #[test]
    fn test_xml_statuses_and_time() {
        let report = Report::from_results(&[
            result("Deploy", "ok", Status::Passed),
            result("Deploy", "broken", Status::Failed),
            result("Deploy", "later", Status::Skipped),
        ]);

        let out = xml(&report);
        assert_eq!(out.matches("<failure").count(), 1);
        assert_eq!(out.matches("<skipped").count(), 1);
        assert!(out.contains("boom"));
        assert!(out.contains(r#"classname="Deploy""#));
        assert!(out.contains(r#"time="1.234""#));
        assert_eq!(report.packages[0].tests[2].detail, "skipped");
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xml");
        Report::from_results(&[result("A", "one", Status::Passed)])
            .write_file(&path)
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<testcase "));
    }
}
