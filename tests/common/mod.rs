//! Shared helpers for integration tests.

#![allow(dead_code)]

use fastsite::{Context, ParamValue, Reply};

/// Temporary directories holding template and manifest files
pub mod temp_files {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    /// Create a directory containing `files` as `(name, content)` pairs.
    ///
    /// The directory is removed when the returned guard is dropped.
    pub fn dir_with(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            write(dir.path(), name, content);
        }
        dir
    }

    /// Write one file below `dir`, creating parent directories
    pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

/// Controller answering with a fixed text body
pub fn text(
    body: &'static str,
) -> impl Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static {
    move |_ctx, _params| Ok(Reply::Text(body.to_string()))
}

/// Controller echoing its parameters as a JSON array
pub fn echo_params(_ctx: &mut Context<'_>, params: &[ParamValue]) -> anyhow::Result<Reply> {
    Ok(Reply::Json(serde_json::to_value(params)?))
}
