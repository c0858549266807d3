//! `cv-data.json` export: the current document, pretty-printed with 2-space indentation.

use crate::cv::schema::CvDocument;
use crate::export::{ExportArtifact, ExportError};

pub const JSON_FILE_NAME: &str = "cv-data.json";

pub fn export_json(document: &CvDocument) -> Result<ExportArtifact, ExportError> {
    Ok(ExportArtifact {
        file_name: JSON_FILE_NAME.to_string(),
        content_type: "application/json",
        bytes: serde_json::to_vec_pretty(document)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::schema::sample_document;

    #[test]
    fn test_export_is_an_exact_mirror() {
        let doc = sample_document();
        let artifact = export_json(&doc).unwrap();
        assert_eq!(artifact.file_name, "cv-data.json");

        let parsed: CvDocument = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_export_uses_two_space_indentation() {
        let artifact = export_json(&sample_document()).unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("{\n  \"personalInfo\": {\n    \"name\": \"Ada Lovelace\""));
        assert!(!text.contains("\"website\""));
    }
}
