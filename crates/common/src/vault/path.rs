//! Path validation and canonicalisation
//!
//! Vault paths are absolute, `/`-separated strings. Incoming paths are
//!  percent-decoded and given a leading slash before anything else looks at
//!  them; writes are further restricted to a conservative character set.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use super::error::VaultError;

/// Name of the vault's self-describing manifest file
pub const MANIFEST_FILENAME: &str = "dpack.json";
pub const MANIFEST_PATH: &str = "/dpack.json";
pub const ROOT: &str = "/";

/// Paths no caller may write, remove or create
const PROTECTED_PATHS: &[&str] = &[MANIFEST_PATH];

fn valid_path_regex() -> &'static Regex {
    static VALID_PATH: OnceLock<Regex> = OnceLock::new();
    VALID_PATH.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9\-._~!$&'()*+,;=:@/\s]+$").expect("static path regex is valid")
    })
}

/// The kind of access a path is being validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAccess {
    Read,
    WriteFile,
    WriteDirectory,
    Remove,
}

impl PathAccess {
    pub fn is_write(&self) -> bool {
        !matches!(self, PathAccess::Read)
    }
}

/// Percent-decode `path` and ensure it starts with `/`
///
/// An empty path becomes the root.
pub fn normalize(path: &str) -> Result<String, VaultError> {
    if path.is_empty() {
        return Ok(ROOT.to_string());
    }
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| VaultError::InvalidPath(format!("{}: {}", path, e)))?;
    if decoded.starts_with('/') {
        Ok(decoded.into_owned())
    } else {
        Ok(format!("/{}", decoded))
    }
}

/// Collapse repeated and trailing separators and `.` segments
///
/// `..` is refused rather than resolved.
pub fn canonicalize(path: &str) -> Result<String, VaultError> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(VaultError::InvalidPath(format!(
                    "{}: parent segments are not allowed",
                    path
                )))
            }
            segment => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return Ok(ROOT.to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Normalize, check and canonicalize a caller supplied path
pub fn validate(path: &str, access: PathAccess) -> Result<String, VaultError> {
    let normalized = normalize(path)?;

    if access == PathAccess::WriteFile && normalized.ends_with('/') {
        return Err(VaultError::InvalidPath(format!(
            "{}: files may not have a trailing slash",
            normalized
        )));
    }
    if access.is_write() && !valid_path_regex().is_match(&normalized) {
        return Err(VaultError::InvalidPath(format!(
            "{}: paths may only contain letters, digits, whitespace and -._~!$&'()*+,;=:@/",
            normalized
        )));
    }

    let canonical = canonicalize(&normalized)?;
    if access.is_write() && is_protected(&canonical) {
        return Err(VaultError::ProtectedPath(canonical));
    }
    Ok(canonical)
}

pub fn is_protected(canonical: &str) -> bool {
    PROTECTED_PATHS.contains(&canonical)
}

/// Parent directory of a canonical path; the root is its own parent
pub fn parent(canonical: &str) -> &str {
    match canonical.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &canonical[..idx],
    }
}

/// Strict ancestors of a canonical path, nearest first, excluding the root
pub fn ancestors(canonical: &str) -> impl Iterator<Item = &str> {
    let mut current = canonical;
    std::iter::from_fn(move || {
        let next = parent(current);
        if next == ROOT || next == current {
            None
        } else {
            current = next;
            Some(next)
        }
    })
}

/// Key prefix shared by every descendant of a canonical directory path
pub fn descendant_prefix(canonical: &str) -> String {
    if canonical == ROOT {
        ROOT.to_string()
    } else {
        format!("{}/", canonical)
    }
}
