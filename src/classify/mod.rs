//! Extension-based file classification.
//!
//! Maps file extensions to a coarse category (used in listings, search
//! results, and the index) and to a MIME content type (used for HTTP
//! responses). Both mappings are pure, total, and case-insensitive:
//! unknown extensions fall through to [`FileCategory::Other`] and
//! `application/octet-stream`, never an error.

use serde::{Deserialize, Serialize};

/// Image extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tiff", "ico", "raw", "psd",
];

/// Video extensions. Checked before code, so `ts` resolves to video.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "avi", "mov", "mkv", "flv", "wmv", "m4v", "mpg", "mpeg", "3gp", "ts",
];

/// Audio extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "wma", "aiff", "alac", "mid", "midi",
];

/// Plain-document extensions (office formats fall through to archive/other).
const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "rtf", "odt", "ods", "odp", "csv", "log", "tex"];

/// Archive and installer extensions.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "rar", "tar", "gz", "bz2", "7z", "iso", "dmg", "pkg", "deb", "rpm", "exe", "msi", "app",
    "apk", "xz", "tgz", "jar", "war", "ear",
];

/// Source-code and config extensions.
const CODE_EXTENSIONS: &[&str] = &[
    // C/C++ family
    "c", "cpp", "h", "hpp", "cc", "cxx", "hxx", "cu", "cuh",
    // Web development
    "jsx", "tsx", "js", "html", "css", "scss", "sass", "less", "vue", "svelte",
    // Scripting languages
    "py", "rb", "php", "lua", "pl", "pm", "perl", "tcl", "awk",
    // JVM languages
    "java", "kt", "groovy", "scala", "clj", "gradle",
    // Data formats
    "json", "xml", "yaml", "yml", "toml", "proto", "graphql", "gql",
    // Configuration files
    "ini", "conf", "properties", "env", "config",
    // Shell scripts
    "sh", "bash", "zsh", "fish", "ksh",
    // PowerShell
    "powershell", "ps1", "psm1", "psd1", "ps1xml",
    // Other languages
    "go", "rs", "swift", "cs", "fs", "vb", "sql", "r", "dart", "elm", "ex", "exs", "f", "f90",
    "f95", "hs", "lhs", "lisp", "cl", "nim", "ml", "mli", "d", "erl", "hrl",
];

/// Comic book archive extensions.
const COMIC_EXTENSIONS: &[&str] = &[
    "cbz", "cbr", "cb7", "cbt", "cbl", "cbrz", "cbr7", "cbrt", "cblz", "cblt",
];

/// Coarse file category exposed as the `type` field of file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Code,
    Comic,
    Pdf,
    Epub,
    /// Assigned from directory metadata, never from an extension.
    Directory,
    Other,
}

impl FileCategory {
    /// Classify a file extension, with or without the leading dot, any case.
    ///
    /// Categories are checked in a fixed priority order so overlapping
    /// extensions classify deterministically.
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Audio
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Document
        } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Archive
        } else if CODE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Code
        } else if COMIC_EXTENSIONS.contains(&ext.as_str()) {
            Self::Comic
        } else if ext == "pdf" {
            Self::Pdf
        } else if ext == "epub" {
            Self::Epub
        } else {
            Self::Other
        }
    }

    /// Classify a path by its extension (no extension maps to `Other`).
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Other, Self::from_extension)
    }

    /// Stable lowercase name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Comic => "comic",
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Directory => "directory",
            Self::Other => "other",
        }
    }

    /// Parse the stable name back into a category.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            "archive" => Some(Self::Archive),
            "code" => Some(Self::Code),
            "comic" => Some(Self::Comic),
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            "directory" => Some(Self::Directory),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME content type for an extension, for HTTP responses.
///
/// Unknown extensions get the generic binary type.
#[must_use]
pub fn content_type_for_extension(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        // Plain text
        "txt" | "ini" | "cfg" | "conf" | "log" | "env" | "proto" | "graphql" | "gql" | "vue"
        | "svelte" | "rs" | "swift" | "kt" | "dart" | "lua" | "sql" | "r" | "elm" | "ex" | "exs" => {
            "text/plain"
        }

        // Markup and styling
        "html" => "text/html",
        "css" => "text/css",
        "md" => "text/markdown",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "rtf" => "application/rtf",

        // Data formats
        "json" => "application/json",
        "csv" => "text/csv",
        "yaml" | "yml" => "text/yaml",
        "toml" => "text/toml",

        // Programming languages
        "js" | "jsx" => "text/javascript",
        "tsx" => "text/typescript",
        "py" => "text/x-python",
        "java" => "text/x-java",
        "c" => "text/x-c",
        "cpp" => "text/x-c++",
        "cs" => "text/x-csharp",
        "go" => "text/x-go",
        "rb" => "text/x-ruby",
        "php" => "text/x-php",
        "sh" | "bash" | "zsh" | "fish" | "powershell" | "ps1" | "psm1" => "text/x-sh",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "raw" => "image/x-raw",
        "psd" => "image/vnd.adobe.photoshop",

        // Videos
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        "wmv" => "video/x-ms-wmv",
        "m4v" => "video/x-m4v",
        "mpg" | "mpeg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "ts" => "video/mp2t",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" => "audio/x-m4a",
        "wma" => "audio/x-ms-wma",
        "aiff" => "audio/aiff",
        "alac" => "audio/alac",
        "mid" | "midi" => "audio/midi",

        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "tex" => "application/x-tex",
        "epub" => "application/epub+zip",

        // Archives
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        "tar" => "application/x-tar",
        "gz" | "tgz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "7z" => "application/x-7z-compressed",
        "iso" => "application/x-iso9660-image",
        "dmg" => "application/x-apple-diskimage",
        "pkg" => "application/vnd.apple.installer+xml",
        "deb" => "application/x-debian-package",
        "rpm" => "application/x-redhat-package-manager",
        "exe" | "msi" => "application/x-msdownload",
        "app" => "application/x-apple-application",
        "apk" => "application/vnd.android.package-archive",
        "xz" => "application/x-xz",
        "jar" | "war" | "ear" => "application/java-archive",

        // Comic archives
        "cbz" => "application/x-cbz",
        "cbr" => "application/x-cbr",
        "cb7" => "application/x-cb7",
        "cbt" => "application/x-cbt",
        "cbl" => "application/x-cbl",
        "cbrz" => "application/x-cbrz",
        "cbr7" => "application/x-cbr7",
        "cbrt" => "application/x-cbrt",
        "cblz" => "application/x-cblz",
        "cblt" => "application/x-cblt",

        _ => "application/octet-stream",
    }
}

/// MIME content type for a path, based on its extension.
#[must_use]
pub fn content_type_for_path(path: &std::path::Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or("application/octet-stream", content_type_for_extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_common_categories() {
        assert_eq!(FileCategory::from_extension(".jpg"), FileCategory::Image);
        assert_eq!(FileCategory::from_extension(".mp4"), FileCategory::Video);
        assert_eq!(FileCategory::from_extension(".flac"), FileCategory::Audio);
        assert_eq!(FileCategory::from_extension(".txt"), FileCategory::Document);
        assert_eq!(FileCategory::from_extension(".zip"), FileCategory::Archive);
        assert_eq!(FileCategory::from_extension(".rs"), FileCategory::Code);
        assert_eq!(FileCategory::from_extension(".cbz"), FileCategory::Comic);
        assert_eq!(FileCategory::from_extension(".pdf"), FileCategory::Pdf);
        assert_eq!(FileCategory::from_extension(".epub"), FileCategory::Epub);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            FileCategory::from_extension(".JPG"),
            FileCategory::from_extension(".jpg")
        );
        assert_eq!(FileCategory::from_extension("PnG"), FileCategory::Image);
    }

    #[test]
    fn test_leading_dot_optional() {
        assert_eq!(FileCategory::from_extension("webm"), FileCategory::Video);
        assert_eq!(FileCategory::from_extension(".webm"), FileCategory::Video);
    }

    #[test]
    fn test_unknown_and_empty_map_to_other() {
        assert_eq!(FileCategory::from_extension(""), FileCategory::Other);
        assert_eq!(FileCategory::from_extension("."), FileCategory::Other);
        assert_eq!(FileCategory::from_extension(".xyzzy"), FileCategory::Other);
        assert_eq!(FileCategory::from_extension("no-such-ext"), FileCategory::Other);
    }

    #[test]
    fn test_priority_order_video_beats_code() {
        // `ts` is both an MPEG transport stream and TypeScript.
        assert_eq!(FileCategory::from_extension(".ts"), FileCategory::Video);
        // `tsx` only appears in the code list.
        assert_eq!(FileCategory::from_extension(".tsx"), FileCategory::Code);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(FileCategory::from_path(Path::new("a/b/photo.PNG")), FileCategory::Image);
        assert_eq!(FileCategory::from_path(Path::new("no_extension")), FileCategory::Other);
        assert_eq!(FileCategory::from_path(Path::new(".hidden")), FileCategory::Other);
    }

    #[test]
    fn test_every_listed_extension_classifies() {
        for ext in IMAGE_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Image, "{ext}");
        }
        for ext in VIDEO_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Video, "{ext}");
        }
        for ext in AUDIO_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Audio, "{ext}");
        }
        for ext in DOCUMENT_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Document, "{ext}");
        }
        for ext in ARCHIVE_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Archive, "{ext}");
        }
        for ext in COMIC_EXTENSIONS {
            assert_eq!(FileCategory::from_extension(ext), FileCategory::Comic, "{ext}");
        }
    }

    #[test]
    fn test_as_str_parse_round_trip() {
        for cat in [
            FileCategory::Image,
            FileCategory::Video,
            FileCategory::Audio,
            FileCategory::Document,
            FileCategory::Archive,
            FileCategory::Code,
            FileCategory::Comic,
            FileCategory::Pdf,
            FileCategory::Epub,
            FileCategory::Directory,
            FileCategory::Other,
        ] {
            assert_eq!(FileCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(FileCategory::parse("bogus"), None);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&FileCategory::Image).unwrap();
        assert_eq!(json, "\"image\"");
        let back: FileCategory = serde_json::from_str("\"directory\"").unwrap();
        assert_eq!(back, FileCategory::Directory);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_extension(".png"), "image/png");
        assert_eq!(content_type_for_extension(".JPG"), "image/jpeg");
        assert_eq!(content_type_for_extension("mkv"), "video/x-matroska");
        assert_eq!(content_type_for_extension(".epub"), "application/epub+zip");
        assert_eq!(
            content_type_for_extension(".unknown"),
            "application/octet-stream"
        );
        assert_eq!(content_type_for_extension(""), "application/octet-stream");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("movie.mp4")), "video/mp4");
        assert_eq!(
            content_type_for_path(Path::new("README")),
            "application/octet-stream"
        );
    }
}
