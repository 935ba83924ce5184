//! # Content Safety Gate
//!
//! Scans a materialized tree for credential-like content before it is
//! accepted into the meta-repository.
//!
//! The scanner walks the tree, skips noise directories, binaries, oversized
//! files and generated artifacts, and matches each remaining line against a
//! fixed rule set. Matches are reported with a redacted preview so the
//! report itself never repeats a secret.
//!
//! Whether findings fail a component is decided by the caller through
//! [`SecretPolicy`]; the scanner only reports.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

/// Directories never descended into.
const NOISE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    "dist",
    "build",
];

/// File-name globs for generated content that is not worth scanning.
const SKIP_FILE_GLOBS: &[&str] = &["*.lock", "*.min.js", "*.min.css", "*.map"];

/// Files above this size are skipped.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Kind of credential a rule detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretCategory {
    AwsAccessKey,
    PrivateKey,
    GithubToken,
    SlackToken,
    ApiKey,
    Password,
    Token,
}

impl SecretCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretCategory::AwsAccessKey => "aws_access_key",
            SecretCategory::PrivateKey => "private_key",
            SecretCategory::GithubToken => "github_token",
            SecretCategory::SlackToken => "slack_token",
            SecretCategory::ApiKey => "api_key",
            SecretCategory::Password => "password",
            SecretCategory::Token => "token",
        }
    }
}

impl fmt::Display for SecretCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One credential-like match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Path relative to the scanned directory
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub category: SecretCategory,
    /// Redacted preview of the matched value
    pub preview: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.path.display(),
            self.line,
            self.category,
            self.preview
        )
    }
}

/// What to do with findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretPolicy {
    /// Do not scan
    Skip,
    /// Scan and log findings, but accept the tree
    #[default]
    Warn,
    /// Scan and reject the tree if anything is found
    Fail,
}

impl SecretPolicy {
    pub fn from_flags(check: bool, fail: bool) -> Self {
        match (check, fail) {
            (false, _) => SecretPolicy::Skip,
            (true, false) => SecretPolicy::Warn,
            (true, true) => SecretPolicy::Fail,
        }
    }

    pub fn scans(&self) -> bool {
        !matches!(self, SecretPolicy::Skip)
    }
}

struct Rule {
    category: SecretCategory,
    regex: Regex,
    /// Capture group holding the value to preview; 0 is the whole match
    group: usize,
}

/// Credential pattern scanner.
pub struct SecretScanner {
    rules: Vec<Rule>,
    skip_files: Vec<Pattern>,
}

impl SecretScanner {
    /// Compile the built-in rule set.
    pub fn new() -> Result<Self> {
        let specs: [(SecretCategory, &str, usize); 7] = [
            (SecretCategory::AwsAccessKey, r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", 0),
            (
                SecretCategory::PrivateKey,
                r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |ENCRYPTED |PGP )?PRIVATE KEY(?: BLOCK)?-----",
                0,
            ),
            (SecretCategory::GithubToken, r"\bgh[pousr]_[A-Za-z0-9]{36,}\b", 0),
            (SecretCategory::SlackToken, r"\bxox[baprs]-[A-Za-z0-9-]{10,}", 0),
            (
                SecretCategory::ApiKey,
                r#"(?i)(?:^|[^A-Za-z0-9])(?:[A-Za-z0-9]+[_-])*api[_-]?key(?:[_-][A-Za-z0-9]+)*["']?\s*[:=]\s*["']?([A-Za-z0-9_\-]{16,})"#,
                1,
            ),
            (
                SecretCategory::Password,
                r#"(?i)(?:^|[^A-Za-z0-9])(?:[A-Za-z0-9]+[_-])*(?:password|passwd|pwd)(?:[_-][A-Za-z0-9]+)*["']?\s*[:=]\s*["']([^"'\s]{4,})["']"#,
                1,
            ),
            (
                SecretCategory::Token,
                r#"(?i)(?:^|[^A-Za-z0-9])(?:[A-Za-z0-9]+[_-])*(?:secret|auth[_-]?token|access[_-]?token|token)(?:[_-][A-Za-z0-9]+)*["']?\s*[:=]\s*["']([A-Za-z0-9_\-./+=]{8,})["']"#,
                1,
            ),
        ];

        let rules = specs
            .into_iter()
            .map(|(category, pattern, group)| {
                Ok(Rule {
                    category,
                    regex: Regex::new(pattern)?,
                    group,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let skip_files = SKIP_FILE_GLOBS
            .iter()
            .map(|g| Pattern::new(g))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { rules, skip_files })
    }

    /// Scan every eligible file under `dir`.
    pub fn scan_dir(&self, dir: &Path) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_noise_dir(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || self.skip_file(&entry) {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            if let Some(text) = read_text(entry.path())? {
                findings.extend(self.scan_text(relative, &text));
            }
        }

        findings.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        Ok(findings)
    }

    /// Scan in-memory text, attributing findings to `path`.
    pub fn scan_text(&self, path: &Path, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (index, line) in text.lines().enumerate() {
            for rule in &self.rules {
                if let Some(caps) = rule.regex.captures(line) {
                    let value = caps
                        .get(rule.group)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    findings.push(Finding {
                        path: path.to_path_buf(),
                        line: index + 1,
                        category: rule.category,
                        preview: redact(value),
                    });
                }
            }
        }
        findings
    }

    fn skip_file(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if self.skip_files.iter().any(|p| p.matches(&name)) {
            return true;
        }
        entry
            .metadata()
            .map(|m| m.len() > MAX_FILE_SIZE)
            .unwrap_or(true)
    }
}

fn is_noise_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| NOISE_DIRS.contains(&name))
}

/// Read a file as text, or `None` if it looks binary.
fn read_text(path: &Path) -> Result<Option<String>> {
    let mut bytes = Vec::new();
    fs::File::open(path)?.take(MAX_FILE_SIZE).read_to_end(&mut bytes)?;

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Keep the first four characters and mask the rest.
pub fn redact(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    let hidden = value.chars().count().saturating_sub(4).clamp(4, 12);
    format!("{}{}", visible, "*".repeat(hidden))
}
