//! 파일 수집 모듈
//!
//! 로컬 파일 및 폴더에서 텍스트 문서를 읽어 수집기에 넘깁니다.
//! .gitignore / .ignore 패턴을 존중하고, 텍스트 확장자만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// 텍스트로 취급하는 확장자
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "rst", "adoc", "html", "htm", "csv", "json", "toml", "yaml", "yml",
    "xml", "rs", "py", "ts", "js", "go", "java", "c", "cpp", "h", "sh", "sql",
];

/// 확장자가 텍스트 문서인지 확인
pub fn is_text_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

// ============================================================================
// Text Document
// ============================================================================

/// 읽어들인 텍스트 문서
#[derive(Debug, Clone)]
pub struct TextDocument {
    pub path: PathBuf,
    /// 첫 Markdown 제목, 없으면 파일 이름
    pub title: String,
    pub content: String,
    pub size: u64,
}

impl TextDocument {
    /// 저장소 메타데이터에 쓰는 source 값
    pub fn source(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

fn document_title(path: &Path, content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Collector
// ============================================================================

/// 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// 문서 수집기
pub struct DocumentCollector {
    config: CollectorConfig,
}

impl DocumentCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 폴더를 재귀 탐색하여 텍스트 파일 경로 수집 (정렬됨)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_path);
        }

        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let file_path = entry.path();
            if is_text_path(file_path) && self.within_size_limit(file_path) {
                files.push(file_path.to_path_buf());
            }
        }

        files.sort();
        tracing::info!("Collected {} files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    /// 단일 파일 읽기
    ///
    /// 지원하지 않는 확장자나 크기 초과는 `Ok(None)`입니다.
    pub fn read_document(&self, path: &Path) -> Result<Option<TextDocument>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_file() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }
        if !is_text_path(&abs_path) || !self.within_size_limit(&abs_path) {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("Failed to read file as UTF-8: {:?}", abs_path))?;
        let size = content.len() as u64;

        Ok(Some(TextDocument {
            title: document_title(&abs_path, &content),
            path: abs_path,
            content,
            size,
        }))
    }

    fn within_size_limit(&self, path: &Path) -> bool {
        if self.config.max_file_size == 0 {
            return true;
        }

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size => {
                tracing::debug!("Skipping large file: {:?} ({} bytes)", path, metadata.len());
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to read metadata for {:?}: {}", path, e);
                false
            }
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_text_path() {
        assert!(is_text_path(Path::new("notes.md")));
        assert!(is_text_path(Path::new("README.MD")));
        assert!(!is_text_path(Path::new("photo.png")));
        assert!(!is_text_path(Path::new("Makefile")));
    }

    #[test]
    fn test_collect_directory_filters() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# Alpha\n\nbody").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.txt"), "bravo").unwrap();
        std::fs::write(dir.path().join(".hidden.md"), "secret").unwrap();

        let files = DocumentCollector::with_defaults()
            .collect_directory(dir.path())
            .unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(100)).unwrap();

        let collector = DocumentCollector::new(CollectorConfig {
            max_file_size: 10,
            ..Default::default()
        });
        assert!(collector.collect_directory(dir.path()).unwrap().is_empty());
        assert!(collector
            .read_document(&dir.path().join("big.txt"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_read_document_title() {
        let dir = TempDir::new().unwrap();
        let with_heading = dir.path().join("harbor.md");
        std::fs::write(&with_heading, "intro\n# Harbor History\n\ntext").unwrap();
        let plain = dir.path().join("ferries.txt");
        std::fs::write(&plain, "no heading here").unwrap();

        let collector = DocumentCollector::with_defaults();
        let doc = collector.read_document(&with_heading).unwrap().unwrap();
        assert_eq!(doc.title, "Harbor History");
        assert!(doc.source().starts_with("file://"));

        let doc = collector.read_document(&plain).unwrap().unwrap();
        assert_eq!(doc.title, "ferries");
    }

    #[test]
    fn test_read_missing_file() {
        let collector = DocumentCollector::with_defaults();
        assert!(collector
            .read_document(Path::new("/definitely/not/here.md"))
            .is_err());
    }
}
