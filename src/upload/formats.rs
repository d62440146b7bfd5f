use crate::backend::FileDescriptor;
use std::path::Path;

/// Largest document the upload zone accepts.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// A document format the knowledge base can index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedFormat {
    pub label: &'static str,
    pub description: &'static str,
    pub extension: &'static str,
    pub media_type: &'static str,
}

pub const ACCEPTED_FORMATS: &[AcceptedFormat] = &[
    AcceptedFormat {
        label: "PDF",
        description: "PDF Documents",
        extension: "pdf",
        media_type: "application/pdf",
    },
    AcceptedFormat {
        label: "DOCX",
        description: "Word Documents",
        extension: "docx",
        media_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    },
    AcceptedFormat {
        label: "TXT",
        description: "Text Files",
        extension: "txt",
        media_type: "text/plain",
    },
    AcceptedFormat {
        label: "HTML",
        description: "Web Pages",
        extension: "html",
        media_type: "text/html",
    },
];

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Media type for a file name, `application/octet-stream` when unknown.
pub fn guess_media_type(name: &str) -> &'static str {
    let ext = extension_of(name);
    let ext = if ext == "htm" { "html".to_string() } else { ext };
    ACCEPTED_FORMATS
        .iter()
        .find(|f| f.extension == ext)
        .map(|f| f.media_type)
        .unwrap_or("application/octet-stream")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedType(String),
    TooLarge { size_bytes: u64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::UnsupportedType(ext) => write!(f, "Unsupported file type: .{}", ext),
            Rejection::TooLarge { size_bytes } => write!(
                f,
                "File is {} (limit {})",
                format_file_size(*size_bytes),
                format_file_size(MAX_UPLOAD_BYTES)
            ),
        }
    }
}

/// Check a single file against the accepted formats and size limit.
pub fn check_file(file: &FileDescriptor) -> Result<(), Rejection> {
    let ext = extension_of(&file.name);
    let by_ext = ACCEPTED_FORMATS
        .iter()
        .any(|f| f.extension == ext || (ext == "htm" && f.extension == "html"));
    let by_type = ACCEPTED_FORMATS
        .iter()
        .any(|f| f.media_type.eq_ignore_ascii_case(&file.media_type));

    if !by_ext && !by_type {
        return Err(Rejection::UnsupportedType(ext));
    }
    if file.size_bytes > MAX_UPLOAD_BYTES {
        return Err(Rejection::TooLarge {
            size_bytes: file.size_bytes,
        });
    }
    Ok(())
}

/// Split a dropped batch into files the tracker should accept and those it
/// should not, preserving input order in both.
pub fn partition_accepted(
    files: Vec<FileDescriptor>,
) -> (Vec<FileDescriptor>, Vec<(FileDescriptor, Rejection)>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for file in files {
        match check_file(&file) {
            Ok(()) => accepted.push(file),
            Err(reason) => rejected.push((file, reason)),
        }
    }
    (accepted, rejected)
}

/// Human-readable size, 1024-based.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // two decimals, trailing zeros dropped
    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn test_partition_keeps_order() {
        let files = vec![
            FileDescriptor::from_name("a.pdf", vec![1u8; 4]),
            FileDescriptor::from_name("setup.exe", vec![1u8; 4]),
            FileDescriptor::from_name("b.TXT", vec![1u8; 4]),
            FileDescriptor::metadata("huge.pdf", "application/pdf", MAX_UPLOAD_BYTES + 1),
        ];
        let (accepted, rejected) = partition_accepted(files);

        let names: Vec<_> = accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.TXT"]);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].1, Rejection::UnsupportedType("exe".into()));
        assert!(matches!(rejected[1].1, Rejection::TooLarge { .. }));
    }

    #[test]
    fn test_media_type_match_without_extension() {
        let file = FileDescriptor::new("notes", "text/plain", b"hello".to_vec());
        assert!(check_file(&file).is_ok());
        assert_eq!(guess_media_type("index.htm"), "text/html");
    }
}
