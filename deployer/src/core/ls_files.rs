//! Parsing for `git ls-files -v -z` output.
//!
//! Each NUL-terminated entry is `<tag> <path>`, where the tag is a single
//! status character. Lowercase tags mark files with the assume-unchanged bit.

use anyhow::{Result, anyhow};

/// One tracked file as reported by `git ls-files -v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub flag: char,
    pub path: String,
}

/// Parse all entries from NUL-separated `ls-files -v -z` output.
pub fn parse_tracked_files(output: &str) -> Result<Vec<TrackedFile>> {
    output
        .split('\0')
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

/// Paths whose flag equals `marker`, in listing order.
pub fn locked_paths(output: &str, marker: char) -> Result<Vec<String>> {
    let files = parse_tracked_files(output)?;
    Ok(files
        .into_iter()
        .filter(|file| file.flag == marker)
        .map(|file| file.path)
        .collect())
}

fn parse_entry(entry: &str) -> Result<TrackedFile> {
    let mut chars = entry.chars();
    let flag = chars
        .next()
        .ok_or_else(|| anyhow!("empty ls-files entry"))?;
    let path = chars
        .as_str()
        .strip_prefix(' ')
        .filter(|path| !path.is_empty())
        .ok_or_else(|| anyhow!("unexpected ls-files entry: '{entry}'"))?;
    Ok(TrackedFile {
        flag,
        path: path.to_string(),
    })
}
