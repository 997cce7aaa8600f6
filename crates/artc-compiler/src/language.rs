//! Source-language families
//!
//! Used in two places: to recognise source files handed to passes that must
//! not see code, and to name the family whose signatures matched inside a
//! model output.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Programming language family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageFamily {
    /// Rust
    Rust,
    /// Python
    Python,
    /// JavaScript and TypeScript
    JavaScript,
    /// C, C++, Java, C#, Go, Kotlin, Swift, Scala
    CFamily,
    /// Ruby
    Ruby,
    /// PHP
    Php,
    /// POSIX shells and PowerShell
    Shell,
}

impl LanguageFamily {
    /// All families, in scan order
    pub const ALL: [LanguageFamily; 7] = [
        LanguageFamily::Rust,
        LanguageFamily::Python,
        LanguageFamily::JavaScript,
        LanguageFamily::CFamily,
        LanguageFamily::Ruby,
        LanguageFamily::Php,
        LanguageFamily::Shell,
    ];

    /// File extensions for this family (without dot)
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            LanguageFamily::Rust => &["rs"],
            LanguageFamily::Python => &["py", "pyi"],
            LanguageFamily::JavaScript => &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
            LanguageFamily::CFamily => &[
                "c", "h", "cc", "cpp", "cxx", "hpp", "java", "kt", "kts", "cs", "go", "swift",
                "scala",
            ],
            LanguageFamily::Ruby => &["rb"],
            LanguageFamily::Php => &["php"],
            LanguageFamily::Shell => &["sh", "bash", "zsh", "ps1"],
        }
    }

    /// Human-readable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LanguageFamily::Rust => "rust",
            LanguageFamily::Python => "python",
            LanguageFamily::JavaScript => "javascript",
            LanguageFamily::CFamily => "c-family",
            LanguageFamily::Ruby => "ruby",
            LanguageFamily::Php => "php",
            LanguageFamily::Shell => "shell",
        }
    }

    /// Family of a source file, judged by extension
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        LanguageFamily::ALL
            .into_iter()
            .find(|family| family.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for LanguageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extensions of prose documents a planning pass may read
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc"];

/// Whether `path` names a prose document
#[must_use]
pub fn is_document(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_family_by_extension() {
        assert_eq!(LanguageFamily::from_path("src/main.rs"), Some(LanguageFamily::Rust));
        assert_eq!(LanguageFamily::from_path("app/views.PY"), Some(LanguageFamily::Python));
        assert_eq!(LanguageFamily::from_path("web/index.tsx"), Some(LanguageFamily::JavaScript));
        assert_eq!(LanguageFamily::from_path("cmd/server.go"), Some(LanguageFamily::CFamily));
        assert_eq!(LanguageFamily::from_path("docs/README.md"), None);
        assert_eq!(LanguageFamily::from_path("Makefile"), None);
    }

    #[test]
    fn extensions_do_not_overlap() {
        for a in LanguageFamily::ALL {
            for b in LanguageFamily::ALL {
                if a != b {
                    assert!(a.extensions().iter().all(|e| !b.extensions().contains(e)));
                }
            }
        }
    }

    #[test]
    fn documents_are_recognised() {
        assert!(is_document("docs/requirements.md"));
        assert!(is_document("NOTES.TXT"));
        assert!(!is_document("src/lib.rs"));
        assert!(!is_document("LICENSE"));
    }
}
