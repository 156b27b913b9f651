//! Resolving the source string a host hands the viewer.

use crate::error::ViewerError;
use pdf_engine::OpenSource;
use std::path::{Path, PathBuf};

/// Turn a source string into something the engine can open.
///
/// - `http://` and `https://` are fetched as URLs
/// - `file://` is stripped and treated as a path
/// - with an `asset_root`, relative and root-relative (`/pdfs/a.pdf`) paths
///   are served from under that directory
/// - otherwise the string is a filesystem path as-is
pub fn resolve(source: &str, asset_root: Option<&Path>) -> Result<OpenSource, ViewerError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ViewerError::EmptySource);
    }

    let lower = source.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(OpenSource::Url(source.to_owned()));
    }

    if let Some(rest) = strip_prefix_ignore_case(source, "file://") {
        return Ok(OpenSource::Path(PathBuf::from(rest)));
    }

    let path = match asset_root {
        Some(root) => root.join(source.trim_start_matches('/')),
        None => PathBuf::from(source),
    };
    Ok(OpenSource::Path(path))
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &value[prefix.len()..])
}
