// Export pipeline: JSON download, text PDF and raster PDF.
// PDF layout and image work is CPU-bound and runs inside tokio::task::spawn_blocking.

pub mod font_metrics;
pub mod json;
pub mod pdf;
pub mod raster;
pub mod text;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub use raster::{CaptureRasterizer, Rasterizer};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to decode preview capture: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to write PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to serialise document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no '{0}' capture of the preview was supplied")]
    MissingCapture(&'static str),

    #[error("preview did not finish rendering in time")]
    RenderTimeout,

    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),

    #[error("export task failed: {0}")]
    Task(String),
}

/// A finished download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl IntoResponse for ExportArtifact {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name);
        (
            [
                (header::CONTENT_TYPE, self.content_type.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// `<Name_With_Underscores>[_ATS]_CV.pdf`; an empty name gives `CV.pdf` / `ATS_CV.pdf`.
pub fn pdf_file_name(name: &str, ats: bool) -> String {
    let stem = name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !c.is_control() && !matches!(c, '"' | '/' | '\\'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if !stem.is_empty() {
        parts.push(&stem);
    }
    if ats {
        parts.push("ATS");
    }
    parts.push("CV");
    format!("{}.pdf", parts.join("_"))
}

/// Runs CPU-bound export work off the async runtime.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ExportError>
where
    F: FnOnce() -> Result<T, ExportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_file_name_replaces_whitespace() {
        assert_eq!(pdf_file_name("Ada Lovelace", false), "Ada_Lovelace_CV.pdf");
        assert_eq!(pdf_file_name("Ada Lovelace", true), "Ada_Lovelace_ATS_CV.pdf");
        assert_eq!(
            pdf_file_name("  Ada   King  Lovelace ", false),
            "Ada_King_Lovelace_CV.pdf"
        );
    }

    #[test]
    fn test_pdf_file_name_without_a_name() {
        assert_eq!(pdf_file_name("", false), "CV.pdf");
        assert_eq!(pdf_file_name("   ", true), "ATS_CV.pdf");
    }

    #[test]
    fn test_pdf_file_name_strips_header_breaking_characters() {
        assert_eq!(pdf_file_name("A\"da /Love", false), "Ada_Love_CV.pdf");
    }

    #[test]
    fn test_artifact_response_is_an_attachment() {
        let artifact = ExportArtifact {
            file_name: "cv-data.json".to_string(),
            content_type: "application/json",
            bytes: b"{}".to_vec(),
        };
        let response = artifact.into_response();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cv-data.json\""
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_results() {
        let value = run_blocking(|| Ok(41 + 1)).await.unwrap();
        assert_eq!(value, 42);
        let err = run_blocking::<(), _>(|| Err(ExportError::RenderTimeout))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::RenderTimeout));
    }
}
