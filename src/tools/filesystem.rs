//! 沙箱文件系统工具
//!
//! SafeFs 绑定 root_dir，所有路径必须落在 root 下（禁止绝对路径与 ../ 逃逸，已存在部分经 canonicalize 防符号链接逃逸）；
//! ReadFileTool / WriteFileTool / ListDirTool 基于 SafeFs 提供 read_file / write_file / list_dir。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// 沙箱文件系统：绑定根目录
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析相对路径；目标可以不存在（写文件），但其最近的已存在祖先必须在根下
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let rel = Path::new(path.trim_start_matches("./"));
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(format!("Path '{}' is outside of the workspace", path));
        }
        let full = self.root_dir.join(rel);

        let mut probe = full.as_path();
        while !probe.exists() {
            match probe.parent() {
                Some(p) => probe = p,
                None => break,
            }
        }
        let canonical = probe
            .canonicalize()
            .map_err(|e| format!("Cannot resolve '{}': {}", path, e))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(full)
        } else {
            Err(format!("Path '{}' is outside of the workspace", path))
        }
    }

    pub async fn read_file(&self, path: &str) -> Result<String, String> {
        let resolved = self.resolve(path)?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| format!("Read failed: {}", e))
    }

    /// 写文件；文件原本存在且非空时返回统一 diff
    pub async fn write_file(&self, path: &str, content: &str) -> Result<Option<String>, String> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Create dir failed: {}", e))?;
        }
        let old = tokio::fs::read_to_string(&resolved).await.unwrap_or_default();
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| format!("Write failed: {}", e))?;

        if old.is_empty() {
            return Ok(None);
        }
        let diff = similar::TextDiff::from_lines(old.as_str(), content)
            .unified_diff()
            .header("old", "new")
            .to_string();
        Ok(Some(diff))
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, String> {
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut dir = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| format!("List failed: {}", e))?;
        let mut entries = Vec::new();
        while let Some(e) = dir.next_entry().await.map_err(|e| e.to_string())? {
            let name = e.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let suffix = match e.file_type().await {
                Ok(t) if t.is_dir() => "/",
                _ => "",
            };
            entries.push(format!("{}{}", name, suffix));
        }
        entries.sort();
        Ok(entries)
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("")
}

/// read_file：读取文件内容
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents. Args: {\"path\": \"file path relative to workspace\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let path = str_arg(&args, "path");
        tracing::info!(path = %path, "read_file tool execute");
        self.fs.read_file(path).await.map(Value::String)
    }
}

/// write_file：写入文件，返回 {result, diff?}
pub struct WriteFileTool {
    fs: SafeFs,
}

impl WriteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file (created if missing). Args: {\"path\": \"...\", \"content\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let path = str_arg(&args, "path");
        let content = str_arg(&args, "content");
        tracing::info!(path = %path, bytes = content.len(), "write_file tool execute");
        let diff = self.fs.write_file(path, content).await?;
        let mut result = serde_json::json!({ "result": "File written successfully." });
        if let Some(d) = diff {
            result["diff"] = Value::String(d);
        }
        Ok(result)
    }
}

/// list_dir：列出目录（隐藏文件除外，目录带 / 后缀）
pub struct ListDirTool {
    fs: SafeFs,
}

impl ListDirTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List a directory. Args: {\"path\": \"directory path, default '.'\"}"
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        tracing::info!(path = %path, "list_dir tool execute");
        let entries = self.fs.list_dir(path).await?;
        Ok(Value::from(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let fs = SafeFs::new(dir.path());
        assert!(fs.resolve("../etc/passwd").is_err());
        assert!(fs.resolve("/etc/passwd").is_err());
        assert!(fs.resolve("notes/new.txt").is_ok());
    }

    #[tokio::test]
    async fn test_write_then_overwrite_yields_diff() {
        let dir = TempDir::new().unwrap();
        let fs = SafeFs::new(dir.path());

        let first = fs.write_file("notes/a.txt", "one\ntwo\n").await.unwrap();
        assert!(first.is_none());

        let diff = fs
            .write_file("notes/a.txt", "one\nthree\n")
            .await
            .unwrap()
            .unwrap();
        assert!(diff.contains("-two"));
        assert!(diff.contains("+three"));
        assert_eq!(fs.read_file("notes/a.txt").await.unwrap(), "one\nthree\n");
    }

    #[tokio::test]
    async fn test_list_dir_marks_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();

        let fs = SafeFs::new(dir.path());
        assert_eq!(fs.list_dir(".").await.unwrap(), vec!["a.txt", "sub/"]);
    }

    #[tokio::test]
    async fn test_write_tool_reports_diff_field() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old\n").unwrap();
        let tool = WriteFileTool::new(SafeFs::new(dir.path()));
        let out = tool
            .execute(serde_json::json!({"path": "a.txt", "content": "new\n"}))
            .await
            .unwrap();
        assert_eq!(out["result"], "File written successfully.");
        assert!(out["diff"].as_str().unwrap().contains("+new"));
    }
}
