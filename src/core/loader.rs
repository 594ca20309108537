use crate::core::splitter::TextSplitter;
use crate::domain::model::{Chunk, SourceDocument};
use crate::utils::error::{RagError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    splitter: TextSplitter,
}

impl DocumentLoader {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Loads every supported file directly under `dir` and splits it into
    /// chunks. A missing directory is created and yields no chunks. Files that
    /// fail to load are logged and skipped.
    pub fn load_documents(&self, dir: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        let dir = dir.as_ref();

        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created data directory: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            if !is_supported(&path) {
                tracing::debug!("Skipping unsupported file: {}", path.display());
                continue;
            }

            tracing::info!("Loading document: {}", path.display());
            match read_document(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!("Error loading {}: {}", path.display(), e),
            }
        }

        if documents.is_empty() {
            tracing::warn!("No documents found in {}", dir.display());
            return Ok(Vec::new());
        }

        let chunks = self.splitter.split_documents(&documents);
        tracing::info!(
            "Loaded {} documents, created {} chunks",
            documents.len(),
            chunks.len()
        );
        Ok(chunks)
    }

    pub fn load_single_document(&self, path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(RagError::DocumentLoadError {
                path: path.display().to_string(),
                message: "file not found".to_string(),
            });
        }
        if !is_supported(path) {
            return Err(RagError::UnsupportedDocument {
                path: path.display().to_string(),
            });
        }

        let document = read_document(path)?;
        Ok(self.splitter.split_documents(std::slice::from_ref(&document)))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn is_supported(path: &Path) -> bool {
    match extension(path).as_deref() {
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => true,
        Some("pdf") => cfg!(feature = "pdf"),
        _ => false,
    }
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let source = path.display().to_string();
    let load_error = |message: String| RagError::DocumentLoadError {
        path: source.clone(),
        message,
    };

    let text = match extension(path).as_deref() {
        Some("pdf") => read_pdf(path).map_err(load_error)?,
        _ => fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?,
    };

    Ok(SourceDocument { source, text })
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> std::result::Result<String, String> {
    pdf_extract::extract_text(path).map_err(|e| e.to_string())
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(_path: &Path) -> std::result::Result<String, String> {
    Err("PDF support is disabled (build with the `pdf` feature)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader() -> DocumentLoader {
        DocumentLoader::new(TextSplitter::new(200, 20))
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");

        let chunks = loader().load_documents(&data_dir).unwrap();

        assert!(chunks.is_empty());
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_loads_supported_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_pricing.txt"), "Professional plan costs $999/month.").unwrap();
        fs::write(dir.path().join("a_faq.md"), "# FAQ\n\nNonprofits get 20% off.").unwrap();
        fs::write(dir.path().join("notes.docx"), "ignored").unwrap();

        let chunks = loader().load_documents(dir.path()).unwrap();

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a_faq.md:0", "b_pricing.txt:0"]);
        assert!(chunks[1].content.contains("$999"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.txt"), "Support is available 24/7.").unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let chunks = loader().load_documents(dir.path()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "good.txt:0");
    }

    #[test]
    fn test_single_document_chunks_carry_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.txt");
        let content = "This is a test document.\n\n".repeat(20);
        fs::write(&path, content).unwrap();

        let chunks = loader().load_single_document(&path).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.id, format!("test.txt:{}", i));
            assert_eq!(chunk.source, path.display().to_string());
        }
    }

    #[test]
    fn test_single_document_errors() {
        let dir = TempDir::new().unwrap();

        let missing = loader().load_single_document(dir.path().join("nope.txt"));
        assert!(matches!(missing, Err(RagError::DocumentLoadError { .. })));

        let docx = dir.path().join("report.docx");
        fs::write(&docx, "x").unwrap();
        let unsupported = loader().load_single_document(&docx);
        assert!(matches!(unsupported, Err(RagError::UnsupportedDocument { .. })));
    }
}
