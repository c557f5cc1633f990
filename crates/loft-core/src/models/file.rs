use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a stored file, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Unknown,
    Directory,
    WordDocument,
    ExcelDocument,
    PowerPointDocument,
    #[serde(rename = "PDF")]
    Pdf,
    Video,
    Image,
    CompressedFile,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Directory => "Directory",
            FileKind::WordDocument => "WordDocument",
            FileKind::ExcelDocument => "ExcelDocument",
            FileKind::PowerPointDocument => "PowerPointDocument",
            FileKind::Pdf => "PDF",
            FileKind::Video => "Video",
            FileKind::Image => "Image",
            FileKind::CompressedFile => "CompressedFile",
            FileKind::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Directory" => FileKind::Directory,
            "WordDocument" => FileKind::WordDocument,
            "ExcelDocument" => FileKind::ExcelDocument,
            "PowerPointDocument" => FileKind::PowerPointDocument,
            "PDF" => FileKind::Pdf,
            "Video" => FileKind::Video,
            "Image" => FileKind::Image,
            "CompressedFile" => FileKind::CompressedFile,
            _ => FileKind::Unknown,
        }
    }

    /// Classify a filename by its extension.
    pub fn from_filename(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "doc" | "docx" => FileKind::WordDocument,
            "xls" | "xlsx" => FileKind::ExcelDocument,
            "ppt" | "pptx" => FileKind::PowerPointDocument,
            "pdf" => FileKind::Pdf,
            "mp4" | "avi" | "mov" | "wmv" | "flv" | "webm" | "mkv" | "m4v" | "3gp" | "mts"
            | "m2ts" => FileKind::Video,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" => FileKind::Image,
            "zip" | "tar" | "gz" | "7z" | "rar" => FileKind::CompressedFile,
            _ => FileKind::Unknown,
        }
    }
}

/// A persisted file record. Persistence itself is the metadata store's
/// concern; the upload core only produces the bytes, the placement, and the
/// derived URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub parent_directory_id: Option<Uuid>,
    pub kind: FileKind,
    pub url: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of a file listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePage {
    pub files: Vec<FileRecord>,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(FileKind::from_filename("report.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_filename("deck.PPTX"), FileKind::PowerPointDocument);
        assert_eq!(FileKind::from_filename("clip.mkv"), FileKind::Video);
        assert_eq!(FileKind::from_filename("archive.tar"), FileKind::CompressedFile);
        assert_eq!(FileKind::from_filename("noext"), FileKind::Unknown);
    }

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            FileKind::Directory,
            FileKind::Pdf,
            FileKind::Video,
            FileKind::Unknown,
        ] {
            assert_eq!(FileKind::parse(kind.as_str()), kind);
        }
    }
}
