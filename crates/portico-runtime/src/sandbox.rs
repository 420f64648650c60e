//! Asset path sandbox: resolves literal paths and single-level globs
//! against a package's asset root and rejects anything that could escape it.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use regex::Regex;

/// Asset extensions treated as file references by [`classify_asset`].
const ASSET_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "css", "html", "htm"];

/// Characters that make an input a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Sorted list of candidate paths, rendered comma-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathList(pub Vec<PathBuf>);

impl fmt::Display for PathList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

/// Sandbox violations. Every variant names the offending input.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("asset path '{input}' contains a '..' segment; paths must stay inside the package")]
    Traversal { input: String },

    #[error("asset path '{input}' is absolute; paths must be relative to the package root")]
    Absolute { input: String },

    #[error("asset path must not be empty")]
    Empty,

    #[error("glob pattern '{pattern}' is invalid: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("glob pattern '{pattern}' matched no files under '{}'", .root.display())]
    NoMatch { pattern: String, root: PathBuf },

    #[error(
        "glob pattern '{pattern}' matched {} files under '{}', expected exactly one: {candidates}",
        .candidates.0.len(),
        .root.display()
    )]
    MultipleMatches {
        pattern: String,
        root: PathBuf,
        candidates: PathList,
    },

    #[error("asset path '{input}' not found under '{}'", .root.display())]
    NotFound { input: String, root: PathBuf },

    #[error("asset path '{input}' is not a regular file")]
    NotAFile { input: String },

    #[error("asset path '{input}' resolves outside the package root '{}'", .root.display())]
    Escape { input: String, root: PathBuf },

    #[error("asset root '{}' is not accessible: {source}", .root.display())]
    Root {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve '{input}': {source}")]
    Io {
        input: String,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a raw slot value supplied at runtime registration should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetClass {
    /// Literal content.
    Inline(String),
    /// Existing file, canonicalised.
    Path(PathBuf),
    /// Looks like a file reference but cannot be used as one.
    Invalid(String),
}

/// Classify a raw `html`/`css`/`js` value without relying on error handling.
///
/// Multi-line text or text containing markup/code characters is inline.
/// Text ending in a known asset extension must name an existing file.
#[must_use]
pub fn classify_asset(raw: &str) -> AssetClass {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(['\n', '<', '{', ';', '(']) {
        return AssetClass::Inline(raw.to_string());
    }

    let path = Path::new(trimmed);
    let has_asset_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !has_asset_ext {
        return AssetClass::Inline(raw.to_string());
    }

    match path.canonicalize() {
        Ok(canonical) if canonical.is_file() => AssetClass::Path(canonical),
        Ok(_) => AssetClass::Invalid(format!("'{trimmed}' is not a regular file")),
        Err(_) => AssetClass::Invalid(format!("file not found: '{trimmed}'")),
    }
}

/// Whether `input` contains glob metacharacters.
#[must_use]
pub fn is_glob(input: &str) -> bool {
    input.contains(GLOB_CHARS)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a literal relative path or glob pattern against `asset_root`.
///
/// Globs must match exactly one file. Literal paths are canonicalised and
/// must still live under the canonical root, so a symlink planted inside the
/// tree cannot point the resolution outside it.
///
/// # Errors
///
/// Returns a [`SandboxError`] naming the offending input on traversal,
/// absolute paths, zero or multiple glob matches, missing files, or escape.
pub fn resolve(input: &str, asset_root: &Path) -> Result<PathBuf, SandboxError> {
    check_relative(input)?;
    let root = asset_root
        .canonicalize()
        .map_err(|source| SandboxError::Root {
            root: asset_root.to_path_buf(),
            source,
        })?;

    if is_glob(input) {
        resolve_glob(input, &root)
    } else {
        resolve_literal(input, &root)
    }
}

/// Reject empty, absolute, and traversing inputs before touching the disk.
///
/// # Errors
///
/// Returns [`SandboxError::Empty`], [`SandboxError::Absolute`], or
/// [`SandboxError::Traversal`].
pub fn check_relative(input: &str) -> Result<(), SandboxError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SandboxError::Empty);
    }

    let has_drive = trimmed.len() >= 2
        && trimmed.as_bytes()[1] == b':'
        && trimmed.as_bytes()[0].is_ascii_alphabetic();
    let is_absolute = trimmed.starts_with(['/', '\\'])
        || has_drive
        || Path::new(trimmed)
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    if is_absolute {
        return Err(SandboxError::Absolute {
            input: input.to_string(),
        });
    }

    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(SandboxError::Traversal {
            input: input.to_string(),
        });
    }

    Ok(())
}

fn resolve_literal(input: &str, root: &Path) -> Result<PathBuf, SandboxError> {
    let joined = root.join(input.trim());
    let canonical = joined.canonicalize().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SandboxError::NotFound {
                input: input.to_string(),
                root: root.to_path_buf(),
            }
        } else {
            SandboxError::Io {
                input: input.to_string(),
                source,
            }
        }
    })?;

    if !canonical.starts_with(root) {
        return Err(SandboxError::Escape {
            input: input.to_string(),
            root: root.to_path_buf(),
        });
    }
    if !canonical.is_file() {
        return Err(SandboxError::NotAFile {
            input: input.to_string(),
        });
    }
    Ok(canonical)
}

fn resolve_glob(pattern: &str, root: &Path) -> Result<PathBuf, SandboxError> {
    let mut frontier = vec![root.to_path_buf()];

    for segment in pattern
        .trim()
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
    {
        let mut next = Vec::new();
        if is_glob(segment) {
            let matcher = glob_segment_regex(segment).map_err(|reason| {
                SandboxError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason,
                }
            })?;
            for dir in &frontier {
                let Ok(entries) = std::fs::read_dir(dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    if matcher.is_match(&name.to_string_lossy()) {
                        next.push(entry.path());
                    }
                }
            }
        } else {
            for dir in &frontier {
                let candidate = dir.join(segment);
                if candidate.symlink_metadata().is_ok() {
                    next.push(candidate);
                }
            }
        }
        frontier = next;
    }

    let mut matches: Vec<PathBuf> = frontier.into_iter().filter(|p| p.is_file()).collect();
    matches.sort();
    matches.dedup();

    match matches.len() {
        0 => Err(SandboxError::NoMatch {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
        }),
        1 => {
            let canonical = matches[0]
                .canonicalize()
                .map_err(|source| SandboxError::Io {
                    input: pattern.to_string(),
                    source,
                })?;
            if canonical.starts_with(root) {
                Ok(canonical)
            } else {
                Err(SandboxError::Escape {
                    input: pattern.to_string(),
                    root: root.to_path_buf(),
                })
            }
        }
        _ => Err(SandboxError::MultipleMatches {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
            candidates: PathList(matches),
        }),
    }
}

/// Translate one path segment of a glob into an anchored regex.
///
/// Supports `*`, `?`, and `[...]` classes (with `!` negation). `**` is
/// treated as `*`: patterns are single-level.
fn glob_segment_regex(segment: &str) -> Result<Regex, String> {
    let mut out = String::from("^");
    let mut chars = segment.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' && !class.is_empty() {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if !closed {
                    return Err("unclosed character class".to_string());
                }
                out.push('[');
                if let Some(rest) = class.strip_prefix('!') {
                    out.push('^');
                    out.push_str(&rest.replace('\\', "\\\\"));
                } else {
                    out.push_str(&class.replace('\\', "\\\\"));
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|e| e.to_string())
}
