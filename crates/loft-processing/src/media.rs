//! Media-file recognition

use uuid::Uuid;

/// Extensions eligible for background compression.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "wmv", "flv", "webm", "mkv", "m4v", "3gp", "mts", "m2ts",
];

pub fn is_video_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Compressed output filename for a file id. The output container is always
/// mp4, whatever the source was.
pub fn compressed_filename(file_id: Uuid) -> String {
    format!("{}_compressed.mp4", file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_video_extensions_case_insensitively() {
        assert!(is_video_file("clip.mp4"));
        assert!(is_video_file("CLIP.MKV"));
        assert!(is_video_file("holiday.m2ts"));
        assert!(!is_video_file("report.pdf"));
        assert!(!is_video_file("noext"));
        assert!(!is_video_file("mp4"));
    }

    #[test]
    fn compressed_output_is_always_mp4() {
        let id = Uuid::now_v7();
        assert_eq!(compressed_filename(id), format!("{}_compressed.mp4", id));
    }
}
