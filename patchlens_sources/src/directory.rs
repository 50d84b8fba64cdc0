use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use patchlens_api::MethodRef;
use patchlens_source_api::{ProviderCapabilities, SourceError, SourceProvider, SourceResult};
use tracing::debug;

const SOURCE_DIR_ENV: &str = "PATCHLENS_SOURCE_DIR";
const SOURCE_EXTENSION: &str = "cs";

/// Reads pre-decompiled sources from a directory.
///
/// For `Verse.Pawn::Tick` the provider looks for `Verse.Pawn.Tick.cs` first
/// and falls back to the whole-type file `Verse.Pawn.cs`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provider rooted at `PATCHLENS_SOURCE_DIR`, if set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        env::var_os(SOURCE_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }

    /// Root directory of the provider.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, method: &MethodRef) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if method.declaring_type.is_empty() {
            candidates.push(self.file_for(&method.name));
        } else {
            candidates.push(self.file_for(&format!("{}.{}", method.declaring_type, method.name)));
            candidates.push(self.file_for(&method.declaring_type));
        }
        candidates
    }

    fn file_for(&self, stem: &str) -> PathBuf {
        self.root
            .join(format!("{}.{SOURCE_EXTENSION}", sanitize_stem(stem)))
    }
}

impl SourceProvider for DirectorySource {
    fn id(&self) -> &'static str {
        "directory"
    }

    fn label(&self) -> &'static str {
        "Decompiled source directory"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::new(true, false)
    }

    fn fetch(&self, method: &MethodRef) -> SourceResult<Option<String>> {
        for candidate in self.candidates(method) {
            match fs::read_to_string(&candidate) {
                Ok(text) => {
                    debug!(path = %candidate.display(), "loaded decompiled source");
                    return Ok(Some(text));
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(SourceError::message(format!(
                        "failed to read {}: {err}",
                        candidate.display()
                    )))
                }
            }
        }
        Ok(None)
    }
}

/// Replace characters that are unsafe in file names.
fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn prefers_method_file_over_type_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("Verse.Pawn.Tick.cs"), "void Tick() {}").expect("write");
        fs::write(dir.path().join("Verse.Pawn.cs"), "class Pawn {}").expect("write");

        let provider = DirectorySource::new(dir.path());
        let method = MethodRef::parse("Verse.Pawn::Tick").expect("method");
        let text = provider.fetch(&method).expect("fetch");
        assert_eq!(text.as_deref(), Some("void Tick() {}"));
    }

    #[test]
    fn falls_back_to_type_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("Verse.Pawn.cs"), "class Pawn {}").expect("write");

        let provider = DirectorySource::new(dir.path());
        let method = MethodRef::parse("Verse.Pawn::Kill").expect("method");
        let text = provider.fetch(&method).expect("fetch");
        assert_eq!(text.as_deref(), Some("class Pawn {}"));
    }

    #[test]
    fn missing_files_are_not_errors() {
        let dir = TempDir::new().expect("tempdir");
        let provider = DirectorySource::new(dir.path());
        let method = MethodRef::parse("Nope::Nothing").expect("method");
        assert!(provider.fetch(&method).expect("fetch").is_none());
    }

    #[test]
    fn sanitizes_generic_and_nested_names() {
        assert_eq!(sanitize_stem("Outer/Inner`1.Get<T>"), "Outer_Inner_1.Get_T_");
    }
}
