use std::path::{Path, PathBuf};

use stacked_errors::{bail_locationless, Result, StackableErr};
use tokio::fs;

// `dunce` strips the `\\?\` verbatim prefix that `canonicalize` gives on
// Windows, which the docker CLI does not understand in volume arguments
async fn canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    fs::canonicalize(path)
        .await
        .map(|path| dunce::simplified(&path).to_owned())
}

/// Canonicalizes and checks the existence of a file path. Also adds on better
/// information to errors.
///
/// Note: this does not prevent TOCTOU bugs.
pub async fn acquire_file_path(file_path_str: impl AsRef<Path>) -> Result<PathBuf> {
    let file_path_str = file_path_str.as_ref();
    let path = canonicalize(file_path_str)
        .await
        .stack_err_with_locationless(|| {
            format!("acquire_file_path(file_path_str: {file_path_str:?})")
        })?;
    if path.is_file() {
        Ok(path)
    } else {
        bail_locationless!("acquire_file_path(file_path_str: {file_path_str:?}) -> is not a file")
    }
}

/// Canonicalizes and checks the existence of a directory path. Also adds on
/// better information to errors.
///
/// Note: this does not prevent TOCTOU bugs.
pub async fn acquire_dir_path(dir_path_str: impl AsRef<Path>) -> Result<PathBuf> {
    let dir_path_str = dir_path_str.as_ref();
    let path = canonicalize(dir_path_str)
        .await
        .stack_err_with_locationless(|| {
            format!("acquire_dir_path(dir_path_str: {dir_path_str:?})")
        })?;
    if path.is_dir() {
        Ok(path)
    } else {
        bail_locationless!("acquire_dir_path(dir_path_str: {dir_path_str:?}) -> is not a directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dockerfile.test");
        std::fs::write(&file, "FROM alpine\n").unwrap();

        let acquired = acquire_dir_path(dir.path()).await.unwrap();
        assert!(acquired.is_absolute());
        assert!(acquire_file_path(&file).await.unwrap().is_absolute());

        assert!(acquire_dir_path(&file).await.is_err());
        assert!(acquire_file_path(dir.path()).await.is_err());
        assert!(acquire_dir_path(dir.path().join("nonexistent")).await.is_err());
    }

    #[tokio::test]
    async fn normalization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("botdata")).unwrap();
        let roundabout = dir.path().join("botdata").join("..").join("botdata");
        assert_eq!(
            acquire_dir_path(roundabout).await.unwrap(),
            acquire_dir_path(dir.path().join("botdata")).await.unwrap()
        );
    }
}
