// 下载目录验证

use crate::error::FilesystemError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 路径验证结果
#[derive(Debug, Clone, Serialize)]
pub struct PathValidationResult {
    /// 路径是否完全可用
    pub valid: bool,
    pub exists: bool,
    pub is_directory: bool,
    pub is_writable: bool,
    /// 验证消息
    pub message: String,
}

impl PathValidationResult {
    fn success() -> Self {
        Self {
            valid: true,
            exists: true,
            is_directory: true,
            is_writable: true,
            message: "路径验证通过".to_string(),
        }
    }

    fn failure(exists: bool, is_directory: bool, message: &str) -> Self {
        Self {
            valid: false,
            exists,
            is_directory,
            is_writable: false,
            message: message.to_string(),
        }
    }
}

/// 路径验证器
pub struct PathValidator;

impl PathValidator {
    /// 检查目录是否存在且可写
    pub fn validate(path: &Path) -> PathValidationResult {
        if !path.exists() {
            return PathValidationResult::failure(false, false, "路径不存在");
        }
        if !path.is_dir() {
            return PathValidationResult::failure(true, false, "路径不是目录");
        }
        if !Self::check_writable(path) {
            return PathValidationResult::failure(true, true, "路径不可写");
        }
        PathValidationResult::success()
    }

    /// 通过创建临时文件检测写入权限
    fn check_writable(path: &Path) -> bool {
        let test_file = path.join(format!(".write_test_{}", uuid::Uuid::new_v4()));
        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                true
            }
            Err(_) => false,
        }
    }

    /// 自动创建目录并确认可写
    pub fn ensure_writable(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("无法创建目录: {:?}", path))?;
            info!("自动创建下载目录: {:?}", path);
        }

        let result = Self::validate(path);
        if !result.valid {
            anyhow::bail!("{}: {:?}", result.message, path);
        }
        Ok(())
    }

    /// 依次尝试候选目录，返回第一个可用的
    pub fn first_writable(candidates: &[PathBuf]) -> Result<PathBuf, FilesystemError> {
        for candidate in candidates {
            match Self::ensure_writable(candidate) {
                Ok(()) => {
                    info!("使用下载目录: {:?}", candidate);
                    return Ok(candidate.clone());
                }
                Err(e) => warn!("下载目录不可用，尝试下一个: {:#}", e),
            }
        }

        Err(FilesystemError::NoWritableDirectory {
            tried: candidates.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = PathValidator::validate(temp_dir.path());

        assert!(result.valid, "验证应该通过");
        assert!(result.is_writable, "路径应该可写");
    }

    #[test]
    fn test_validate_non_existing_path() {
        let result = PathValidator::validate(Path::new("/non/existing/path/12345"));
        assert!(!result.valid);
        assert!(!result.exists);
        assert_eq!(result.message, "路径不存在");
    }

    #[test]
    fn test_validate_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_file.txt");
        fs::write(&file_path, "test").unwrap();

        let result = PathValidator::validate(&file_path);
        assert!(!result.valid);
        assert!(result.exists);
        assert_eq!(result.message, "路径不是目录");
    }

    #[test]
    fn test_ensure_writable_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let new_dir = temp_dir.path().join("a/b/KidsNote");

        PathValidator::ensure_writable(&new_dir).unwrap();
        assert!(new_dir.is_dir());
        // 已存在时同样成功
        PathValidator::ensure_writable(&new_dir).unwrap();
    }

    #[test]
    fn test_first_writable_skips_bad_candidates() {
        let temp_dir = TempDir::new().unwrap();
        // 父路径是文件，无法在其下创建目录
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let good = temp_dir.path().join("good");
        let chosen =
            PathValidator::first_writable(&[blocker.join("sub"), blocker.clone(), good.clone()])
                .unwrap();
        assert_eq!(chosen, good);
    }

    #[test]
    fn test_first_writable_all_fail() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let err = PathValidator::first_writable(&[blocker.join("sub")]).unwrap_err();
        let FilesystemError::NoWritableDirectory { tried } = err;
        assert_eq!(tried.len(), 1);
    }
}
