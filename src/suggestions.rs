//! # Error Suggestions
//!
//! Helpers that turn library errors into CLI errors carrying `hint:` lines.
//! An error should tell the user what went wrong and how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metarepo::suggestions;
//!
//! engine.convert(&options, &mut observer).map_err(suggestions::with_hints)?;
//! ```

use std::path::Path;

use crate::error::Error;

/// Error for a missing manifest.
pub fn manifest_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Manifest not found: {path}\n\n\
         hint: Run metarepo from the meta-repository root, or pass --root\n\
         hint: Use --manifests-dir to point at a different manifests directory\n\
         hint: Set METAREPO_ROOT or METAREPO_MANIFESTS environment variables",
        path = path.display()
    )
}

/// Error for `restore` without a terminal and without `--yes`.
pub fn restore_needs_confirmation(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Refusing to restore backup '{name}' without confirmation\n\n\
         hint: Pass --yes to restore non-interactively"
    )
}

/// Convert a library error, appending hints for the failures users can act on.
pub fn with_hints(error: Error) -> anyhow::Error {
    let hints: Vec<String> = match &error {
        Error::CheckpointNotFound { .. } => vec![
            "Run 'metarepo list-checkpoints' to see resumable conversions".to_string(),
            "Start a fresh conversion without --resume".to_string(),
        ],
        Error::ConversionAborted { checkpoint_id, .. } => vec![
            format!("Fix the problem and run 'metarepo resume --checkpoint {checkpoint_id}'"),
            "Use --continue-on-error to convert the remaining components anyway".to_string(),
        ],
        Error::RolledBack { backup, .. } => vec![
            format!("The workspace was restored from backup '{backup}'"),
            "Use --no-atomic to keep partial progress for 'metarepo resume'".to_string(),
        ],
        Error::CycleDetected { .. } => vec![
            "Remove one of the 'depends_on' entries to break the cycle".to_string(),
        ],
        Error::UnknownDependency { dependency, .. } => {
            vec![format!("Declare '{dependency}' under 'components:' or drop the dependency")]
        }
        Error::ToolValidation { tool, .. } => vec![format!("Install {tool} and make sure it is on PATH")],
        Error::Validation { .. } => vec!["Run 'metarepo validate' for the full report".to_string()],
        Error::SecretDetected { .. } => vec![
            "Remove the credentials upstream, or rerun without --fail-on-secrets".to_string(),
        ],
        Error::BackupNotFound { .. } => {
            vec!["Run 'metarepo list-backups' to see available backups".to_string()]
        }
        _ => Vec::new(),
    };

    if hints.is_empty() {
        return anyhow::Error::new(error);
    }

    let hints = hints
        .iter()
        .map(|h| format!("hint: {h}"))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::anyhow!("{error}\n\n{hints}")
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
pub fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Error for a checkpoint or backup name that does not exist, suggesting a
/// close match from `known`.
pub fn unknown_name(kind: &str, name: &str, known: &[&str]) -> anyhow::Error {
    let did_you_mean = find_similar(name, known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();
    anyhow::anyhow!(
        "No {kind} named '{name}'{did_you_mean}\n\n\
         hint: Run 'metarepo list-{kind}s' to see what exists"
    )
}

/// Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}
