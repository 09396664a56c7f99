//! Expected-output fixtures: `<name>.text-only.md` files and their sources.
//!
//! A fixture pairs a stored Markdown file with the PDF it was produced from.
//! The source is `<name>.pdf` next to the fixture, or in a separate source
//! directory. [`compare`] grades a conversion against the stored text:
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | [`FixtureOutcome::Exact`] | byte-for-byte equal |
//! | [`FixtureOutcome::NearExact`] | normalised line similarity ≥ threshold |
//! | [`FixtureOutcome::Mismatch`] | anything else |
//!
//! Normalisation ignores what a Markdown reader would not notice: leading
//! and trailing spaces, repeated inner whitespace, blank lines, and the
//! padding of table cells and separator rows.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::error::Layout2MdError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-name suffix of expected-output fixtures.
pub const FIXTURE_SUFFIX: &str = ".text-only.md";

/// Similarity at or above which a non-identical output still passes.
pub const DEFAULT_NEAR_EXACT_THRESHOLD: f64 = 0.95;

/// One expected-output file and, when found, its source PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// File name without the `.text-only.md` suffix.
    pub name: String,
    pub expected_path: PathBuf,
    pub source_path: Option<PathBuf>,
}

impl Fixture {
    /// Build a fixture from its expected-output path; `None` when the file
    /// name does not carry the fixture suffix.
    pub fn from_expected_path(path: &Path, source_dir: Option<&Path>) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let name = file_name.strip_suffix(FIXTURE_SUFFIX)?;
        if name.is_empty() {
            return None;
        }
        let source_file = format!("{name}.pdf");
        let beside = path.parent().map(|dir| dir.join(&source_file));
        let elsewhere = source_dir.map(|dir| dir.join(&source_file));
        let source_path = beside.into_iter().chain(elsewhere).find(|p| p.is_file());
        Some(Self {
            name: name.to_string(),
            expected_path: path.to_path_buf(),
            source_path,
        })
    }

    /// Read the stored Markdown.
    pub fn expected(&self) -> Result<String, Layout2MdError> {
        std::fs::read_to_string(&self.expected_path).map_err(|source| Layout2MdError::FixtureIo {
            path: self.expected_path.clone(),
            source,
        })
    }
}

/// List every fixture in `dir`, sorted by name.
pub fn discover(dir: &Path, source_dir: Option<&Path>) -> Result<Vec<Fixture>, Layout2MdError> {
    let io_err = |source| Layout2MdError::FixtureIo {
        path: dir.to_path_buf(),
        source,
    };
    let mut fixtures = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(fixture) = Fixture::from_expected_path(&path, source_dir) {
            fixtures.push(fixture);
        }
    }
    fixtures.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(
        "Discovered {} fixtures in {} ({} with sources)",
        fixtures.len(),
        dir.display(),
        fixtures.iter().filter(|f| f.source_path.is_some()).count()
    );
    Ok(fixtures)
}

// ── Comparison ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureOutcome {
    Exact,
    NearExact,
    Mismatch,
}

/// First normalised line where expected and actual output part ways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDifference {
    /// 1-indexed position among the normalised lines.
    pub line: usize,
    pub expected: String,
    pub actual: String,
    /// Normalised Levenshtein similarity of the two lines.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureReport {
    pub outcome: FixtureOutcome,
    /// `2·LCS / (|expected| + |actual|)` over normalised lines.
    pub similarity: f64,
    pub first_difference: Option<LineDifference>,
}

impl FixtureReport {
    /// Exact or near-exact.
    pub fn passed(&self) -> bool {
        self.outcome != FixtureOutcome::Mismatch
    }
}

/// Grade `actual` against `expected`.
pub fn compare(expected: &str, actual: &str, threshold: f64) -> FixtureReport {
    let exp = normalise_lines(expected);
    let act = normalise_lines(actual);

    let similarity = if exp.is_empty() && act.is_empty() {
        1.0
    } else {
        2.0 * lcs_len(&exp, &act) as f64 / (exp.len() + act.len()) as f64
    };

    let first_difference = (0..exp.len().max(act.len()))
        .find(|&i| exp.get(i) != act.get(i))
        .map(|i| {
            let e = exp.get(i).cloned().unwrap_or_default();
            let a = act.get(i).cloned().unwrap_or_default();
            LineDifference {
                line: i + 1,
                similarity: strsim::normalized_levenshtein(&e, &a),
                expected: e,
                actual: a,
            }
        });

    let outcome = if expected == actual {
        FixtureOutcome::Exact
    } else if similarity >= threshold {
        FixtureOutcome::NearExact
    } else {
        FixtureOutcome::Mismatch
    };

    FixtureReport {
        outcome,
        similarity,
        first_difference,
    }
}

/// Lines as a reader sees them; blank lines dropped.
pub fn normalise_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.len() > 1 && line.starts_with('|') && line.ends_with('|') {
                normalise_table_row(line)
            } else {
                line.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        })
        .collect()
}

fn normalise_table_row(line: &str) -> String {
    let inner = &line[1..line.len() - 1];
    let cells: Vec<String> = inner
        .split('|')
        .map(|cell| {
            let cell = cell.trim();
            let is_rule = !cell.is_empty() && cell.chars().all(|c| c == '-' || c == ':');
            if is_rule {
                "---".to_string()
            } else {
                cell.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        })
        .collect();
    format!("| {} |", cells.join(" | "))
}

/// Longest common subsequence length, two-row table.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// ── Verification ─────────────────────────────────────────────────────────

/// Convert the fixture's source PDF and grade the result.
pub async fn verify_fixture(
    fixture: &Fixture,
    config: &ConversionConfig,
    threshold: f64,
) -> Result<FixtureReport, Layout2MdError> {
    let Some(source) = fixture.source_path.as_ref() else {
        let dir = fixture.expected_path.parent().unwrap_or_else(|| Path::new("."));
        return Err(Layout2MdError::FixtureSourceMissing {
            name: fixture.name.clone(),
            expected: dir.join(format!("{}.pdf", fixture.name)),
        });
    };
    let expected = fixture.expected()?;

    let source = source.to_string_lossy().to_string();
    let output = convert(&source, config).await?;
    let report = compare(&expected, &output.markdown, threshold);

    match report.outcome {
        FixtureOutcome::Mismatch => warn!(
            "Fixture {}: mismatch (similarity {:.3}, first difference at line {:?})",
            fixture.name,
            report.similarity,
            report.first_difference.as_ref().map(|d| d.line)
        ),
        outcome => info!(
            "Fixture {}: {:?} (similarity {:.3})",
            fixture.name, outcome, report.similarity
        ),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_exact() {
        let md = "# Title\n\nBody.\n";
        let report = compare(md, md, DEFAULT_NEAR_EXACT_THRESHOLD);
        assert_eq!(report.outcome, FixtureOutcome::Exact);
        assert_eq!(report.similarity, 1.0);
        assert!(report.first_difference.is_none());
    }

    #[test]
    fn whitespace_and_table_padding_are_near_exact() {
        let expected = "# Title\n\n| a   | b   |\n|-----|-----|\n| 1   | 2   |\n";
        let actual = "# Title\n\n\n|a|b|\n|---|:---|\n| 1 |  2 |\n  ";
        let report = compare(expected, actual, DEFAULT_NEAR_EXACT_THRESHOLD);
        assert_eq!(report.outcome, FixtureOutcome::NearExact);
        assert_eq!(report.similarity, 1.0);
    }

    #[test]
    fn different_content_is_a_mismatch_with_first_difference() {
        let expected = "# Title\n\nFirst paragraph.\n\nSecond paragraph.\n";
        let actual = "# Title\n\nFirst paragraf.\n\nSomething else entirely.\n";
        let report = compare(expected, actual, DEFAULT_NEAR_EXACT_THRESHOLD);
        assert_eq!(report.outcome, FixtureOutcome::Mismatch);
        assert!((report.similarity - 2.0 / 6.0).abs() < 1e-9);
        let diff = report.first_difference.unwrap();
        assert_eq!(diff.line, 2);
        assert_eq!(diff.expected, "First paragraph.");
        assert!(diff.similarity > 0.8);
    }

    #[test]
    fn missing_lines_show_as_empty_side() {
        let report = compare("a\nb\n", "a\n", 0.5);
        assert_eq!(report.outcome, FixtureOutcome::NearExact);
        let diff = report.first_difference.unwrap();
        assert_eq!((diff.line, diff.actual.as_str()), (2, ""));
    }

    #[test]
    fn discover_pairs_sources_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.text-only.md"), "B\n").unwrap();
        std::fs::write(dir.path().join("a.text-only.md"), "A\n").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(src.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let fixtures = discover(dir.path(), Some(src.path())).unwrap();
        let names: Vec<_> = fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fixtures[0].source_path, Some(dir.path().join("a.pdf")));
        assert_eq!(fixtures[1].source_path, Some(src.path().join("b.pdf")));
        assert_eq!(fixtures[1].expected().unwrap(), "B\n");
    }

    #[test]
    fn discover_missing_dir_is_fixture_io() {
        let err = discover(Path::new("/no/such/fixture/dir"), None).unwrap_err();
        assert!(matches!(err, Layout2MdError::FixtureIo { .. }));
    }

    #[tokio::test]
    async fn verify_without_source_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2203.01017v2.text-only.md");
        std::fs::write(&path, "x\n").unwrap();
        let fixture = Fixture::from_expected_path(&path, None).unwrap();
        let err = verify_fixture(&fixture, &ConversionConfig::default(), 0.9)
            .await
            .unwrap_err();
        match err {
            Layout2MdError::FixtureSourceMissing { name, expected } => {
                assert_eq!(name, "2203.01017v2");
                assert_eq!(expected, dir.path().join("2203.01017v2.pdf"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
