//! Finds test-case files and runs them, in parallel by default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use super::{TestCase, TestOutcome};

const EXTENSION: &str = "tine";

#[derive(Clone, Debug)]
pub struct TestRunnerConfig {
    /// Only run files whose path contains this text.
    pub filter: Option<String>,
    pub parallel: bool,
    pub verbose: bool,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        TestRunnerConfig {
            filter: None,
            parallel: true,
            verbose: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TestResult {
    pub path: PathBuf,
    pub outcome: TestOutcome,
    pub duration: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct TestSummary {
    pub results: Vec<TestResult>,
    pub duration: Duration,
}

impl TestSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.outcome.is_passed())
    }
}

/// Every `.tine` file under `path` (or `path` itself), sorted.
pub fn discover(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if path.is_file() {
        if path.extension().is_some_and(|e| e == EXTENSION) {
            files.push(path.to_path_buf());
        }
    } else {
        discover_recursive(path, &mut files);
    }
    files.sort();
    files
}

fn discover_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.') || n == "target")
        {
            continue;
        }
        if path.is_dir() {
            discover_recursive(&path, files);
        } else if path.extension().is_some_and(|e| e == EXTENSION) {
            files.push(path);
        }
    }
}

pub struct TestRunner {
    config: TestRunnerConfig,
}

impl TestRunner {
    pub fn new(config: TestRunnerConfig) -> Self {
        TestRunner { config }
    }

    pub fn run(&self, path: &Path) -> TestSummary {
        let start = Instant::now();
        let files: Vec<PathBuf> = discover(path)
            .into_iter()
            .filter(|p| {
                self.config
                    .filter
                    .as_deref()
                    .is_none_or(|f| p.to_string_lossy().contains(f))
            })
            .collect();
        debug!(files = files.len(), parallel = self.config.parallel, "running test cases");

        let results = if self.config.parallel {
            run_parallel(&files)
        } else {
            files.iter().map(|f| run_file(f)).collect()
        };
        TestSummary {
            results,
            duration: start.elapsed(),
        }
    }
}

/// Each file compiles in its own session, so files are independent.
fn run_parallel(files: &[PathBuf]) -> Vec<TestResult> {
    rayon::ThreadPoolBuilder::new()
        // Deeply nested sources recurse in the parser and the passes.
        .stack_size(16 * 1024 * 1024)
        .build_scoped(rayon::ThreadBuilder::run, |pool| {
            pool.install(|| files.par_iter().map(|f| run_file(f)).collect())
        })
        .unwrap_or_else(|e| {
            warn!("failed to create thread pool ({e}), running sequentially");
            files.iter().map(|f| run_file(f)).collect()
        })
}

pub(super) fn run_file(path: &Path) -> TestResult {
    let start = Instant::now();
    let outcome = match fs::read_to_string(path) {
        Ok(source) => match TestCase::parse(&source) {
            Ok(case) => case.run(),
            Err(e) => TestOutcome::Invalid(e.to_string()),
        },
        Err(e) => TestOutcome::Invalid(format!("cannot read file: {e}")),
    };
    TestResult {
        path: path.to_path_buf(),
        outcome,
        duration: start.elapsed(),
    }
}
