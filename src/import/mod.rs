//! Dotenv-format import.
//!
//! Parsing never fails: malformed lines are counted and skipped so one bad
//! line cannot poison a bulk import. Applying the parsed pairs goes through
//! the store one key at a time; the batch is not atomic and per-key
//! failures are reported alongside the keys that landed.

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::VaultError;
use crate::vault::entry::RevisionReason;
use crate::vault::store::{PutRequest, VaultStore};

/// Parsed dotenv content. Values are plaintext, so the whole set is
/// scrubbed on drop.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Parsed {
    /// Key/value pairs in first-seen order, duplicates collapsed to the
    /// last occurrence.
    pub pairs: Vec<(String, String)>,
    /// Lines that had content but no `=`.
    pub malformed: usize,
}

impl Parsed {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Parse dotenv-format text into key/value pairs.
pub fn parse(content: &str) -> Parsed {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut malformed = 0usize;

    for line in content.lines() {
        let trimmed = line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // Strip optional `export ` prefix
        let line = trimmed
            .strip_prefix("export ")
            .or_else(|| trimmed.strip_prefix("export\t"))
            .unwrap_or(trimmed);

        // Split on first '='
        let Some(eq_pos) = line.find('=') else {
            malformed += 1;
            continue;
        };

        let key = line[..eq_pos].trim().to_string();
        let raw_value = line[eq_pos + 1..].to_string();

        if key.is_empty() {
            continue;
        }

        let value = parse_value(&raw_value);

        // Last occurrence wins, position of the first is kept.
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            pairs.push((key, value));
        }
    }

    Parsed { pairs, malformed }
}

/// Parse a dotenv value, handling quoted and unquoted forms.
fn parse_value(raw: &str) -> String {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return String::new();
    }

    // Double-quoted value: handle escape sequences
    if trimmed.starts_with('"') {
        if let Some(end) = find_closing_quote(trimmed, '"') {
            let inner = &trimmed[1..end];
            return unescape_double_quoted(inner);
        }
    }

    // Single-quoted value: literal (no escaping)
    if trimmed.starts_with('\'') {
        if let Some(end) = find_closing_quote(trimmed, '\'') {
            return trimmed[1..end].to_string();
        }
    }

    // Unquoted value: strip inline comments
    if let Some(comment_pos) = trimmed.find(" #") {
        trimmed[..comment_pos].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Find the position of the closing quote character, respecting backslash escapes.
fn find_closing_quote(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices().skip(1); // skip opening quote
    while let Some((i, c)) = chars.next() {
        if c == '\\' && quote == '"' {
            chars.next(); // skip escaped char
            continue;
        }
        if c == quote {
            return Some(i);
        }
    }
    None
}

/// Unescape double-quoted dotenv values.
fn unescape_double_quoted(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// What an import did.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub key: String,
    pub error: String,
}

/// Apply parsed pairs to one project. Existing keys are skipped unless
/// `overwrite` is set; each pair stands or falls on its own.
pub async fn import(
    store: &VaultStore,
    project: &str,
    parsed: &Parsed,
    overwrite: bool,
    actor: &str,
) -> ImportReport {
    let mut report = ImportReport {
        imported: 0,
        skipped: 0,
        errors: Vec::new(),
    };

    for (key, value) in &parsed.pairs {
        let mut request = PutRequest::new(
            project,
            key,
            secrecy::SecretString::new(value.clone()),
        );
        request.reason = RevisionReason::Import;
        request.actor = actor.to_string();
        if !overwrite {
            // Create-only compare-and-set; an existing key surfaces as a
            // conflict, which is the skip signal.
            request.expected_version = Some(0);
        }

        match store.put(request).await {
            Ok(_) => report.imported += 1,
            Err(VaultError::Conflict { .. }) if !overwrite => report.skipped += 1,
            Err(e) => {
                tracing::warn!(project, key, error = %e, "import pair failed");
                report.errors.push(ImportFailure {
                    key: key.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        project,
        imported = report.imported,
        skipped = report.skipped,
        failed = report.errors.len(),
        "import finished"
    );
    report
}
