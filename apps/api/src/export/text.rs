//! Text PDF export: the document laid out as real PDF text on A4 pages.
//!
//! Unlike the raster export, every word is a text object, so the file can be searched,
//! copied and parsed by applicant tracking systems. Layout is a single column that flows
//! top to bottom and breaks to a new page when the next line would cross the bottom
//! margin. Section headings are kept with the line that follows them.

use std::sync::Arc;

use lopdf::content::Operation;
use tracing::warn;

use crate::builder::preview::Labels;
use crate::cv::schema::{Customization, CvDocument};
use crate::export::font_metrics::{get_metrics, wrap_lines, PageConfig, Weight};
use crate::export::pdf::{fill_rgb, stroke_rgb, text_operand, win_ansi_replacements, PdfWriter};
use crate::export::{pdf_file_name, run_blocking, ExportArtifact, ExportError, PDF_CONTENT_TYPE};

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

const BLACK: [u8; 3] = [0, 0, 0];
const INK: [u8; 3] = [33, 37, 41];
const MUTED: [u8; 3] = [90, 98, 107];

const BULLET: &str = "\u{2022}";
const SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy)]
struct Style {
    weight: Weight,
    size: f32,
    color: [u8; 3],
}

/// Flowing single-column layout that collects one operation list per page.
struct Layout {
    config: PageConfig,
    ats: bool,
    accent: [u8; 3],
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    /// Top of the next line.
    y: f32,
    replaced: usize,
}

/// Laid-out pages, plus how many characters had no WinAnsi code and print as `?`.
struct TextLayout {
    pages: Vec<Vec<Operation>>,
    replaced: usize,
}

impl Layout {
    fn new(config: PageConfig, customization: &Customization, ats: bool) -> Self {
        let accent = customization.accent_rgb();
        Self {
            config,
            ats,
            accent,
            pages: Vec::new(),
            ops: Vec::new(),
            y: config.page_height_pt - config.margin_pt,
            replaced: 0,
        }
    }

    // ── Styles ──────────────────────────────────────────────────────────────

    fn body(&self) -> Style {
        Style {
            weight: Weight::Regular,
            size: self.config.font_size_pt,
            color: if self.ats { BLACK } else { INK },
        }
    }

    fn muted(&self) -> Style {
        Style {
            color: if self.ats { BLACK } else { MUTED },
            ..self.body()
        }
    }

    fn strong(&self, scale: f32) -> Style {
        Style {
            weight: Weight::Bold,
            size: self.config.font_size_pt * scale,
            ..self.body()
        }
    }

    fn heading(&self) -> Style {
        Style {
            color: if self.ats { BLACK } else { self.accent },
            ..self.strong(1.25)
        }
    }

    // ── Geometry ────────────────────────────────────────────────────────────

    fn top(&self) -> f32 {
        self.config.page_height_pt - self.config.margin_pt
    }

    fn at_page_top(&self) -> bool {
        (self.y - self.top()).abs() < f32::EPSILON
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = self.top();
    }

    /// Starts a new page unless `height` still fits above the bottom margin.
    fn ensure(&mut self, height: f32) {
        if self.y - height < self.config.margin_pt && !self.at_page_top() {
            self.break_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if !self.at_page_top() {
            self.y -= height;
        }
    }

    // ── Drawing ─────────────────────────────────────────────────────────────

    fn draw_text(&mut self, text: &str, style: Style, x: f32, baseline: f32) {
        let font = match style.weight {
            Weight::Regular => REGULAR,
            Weight::Bold => BOLD,
        };
        self.replaced += win_ansi_replacements(text);
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), style.size.into()]),
            fill_rgb(style.color),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new("Tj", vec![text_operand(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn line(&mut self, text: &str, style: Style, indent: f32) {
        let leading = self.config.leading(style.size);
        self.ensure(leading);
        let baseline = self.y - style.size;
        self.draw_text(text, style, self.config.margin_pt + indent, baseline);
        self.y -= leading;
    }

    fn paragraph(&mut self, text: &str, style: Style, indent: f32) {
        let table = get_metrics(self.config.face, style.weight);
        let width = self.config.text_width_pt() - indent;
        for line in wrap_lines(text, table, style.size, width) {
            self.line(&line, style, indent);
        }
    }

    fn bullet(&mut self, text: &str, style: Style) {
        let indent = style.size * 1.2;
        let table = get_metrics(self.config.face, style.weight);
        let lines = wrap_lines(text, table, style.size, self.config.text_width_pt() - indent);
        for (i, line) in lines.iter().enumerate() {
            if i == 0 {
                let leading = self.config.leading(style.size);
                self.ensure(leading);
                let baseline = self.y - style.size;
                self.draw_text(BULLET, style, self.config.margin_pt + style.size * 0.3, baseline);
            }
            self.line(line, style, indent);
        }
    }

    fn section(&mut self, title: &str) {
        let heading = self.heading();
        let keep_with_next = self.config.leading(heading.size) + self.config.leading(self.body().size);
        self.gap(self.config.font_size_pt * 0.8);
        self.ensure(keep_with_next);
        self.line(title, heading, 0.0);

        if !self.ats {
            let y = self.y + self.config.leading(heading.size) * 0.15;
            let (x0, x1) = (
                self.config.margin_pt,
                self.config.page_width_pt - self.config.margin_pt,
            );
            self.ops.extend([
                stroke_rgb(self.accent),
                Operation::new("w", vec![0.75_f32.into()]),
                Operation::new("m", vec![x0.into(), y.into()]),
                Operation::new("l", vec![x1.into(), y.into()]),
                Operation::new("S", vec![]),
            ]);
        }
        self.gap(self.config.font_size_pt * 0.3);
    }

    fn finish(mut self) -> TextLayout {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.ops);
        }
        TextLayout {
            pages: self.pages,
            replaced: self.replaced,
        }
    }
}

fn joined(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Lays the document out and returns the drawing operations of every page.
fn layout_document(doc: &CvDocument, customization: &Customization, labels: &Labels, ats: bool) -> TextLayout {
    let mut layout = Layout::new(PageConfig::from_customization(customization), customization, ats);
    let body = layout.body();
    let muted = layout.muted();
    let entry_gap = layout.config.font_size_pt * 0.5;

    // Header
    let info = &doc.personal_info;
    layout.paragraph(&info.name, layout.strong(2.0), 0.0);
    layout.paragraph(&info.title, layout.strong(1.15), 0.0);
    let contacts = joined(
        &[
            info.email.as_str(),
            info.phone.as_deref().unwrap_or_default(),
            info.location.as_str(),
            info.linkedin.as_deref().unwrap_or_default(),
            info.github.as_deref().unwrap_or_default(),
            info.website.as_deref().unwrap_or_default(),
        ],
        SEPARATOR,
    );
    layout.paragraph(&contacts, muted, 0.0);

    if !doc.summary.trim().is_empty() {
        layout.section(labels.summary);
        layout.paragraph(&doc.summary, body, 0.0);
    }

    if !doc.skills.is_empty() {
        layout.section(labels.skills);
        for group in doc.skills.iter() {
            let items = group.items.join(", ");
            let line = if group.category.is_empty() {
                items
            } else {
                format!("{}: {}", group.category, items)
            };
            layout.paragraph(&line, body, 0.0);
        }
    }

    if !doc.experience.is_empty() {
        layout.section(labels.experience);
        for (i, entry) in doc.experience.iter().enumerate() {
            if i > 0 {
                layout.gap(entry_gap);
            }
            layout.paragraph(&entry.title, layout.strong(1.05), 0.0);
            layout.paragraph(
                &joined(&[entry.company.as_str(), entry.location.as_str(), entry.period.as_str()], SEPARATOR),
                muted,
                0.0,
            );
            layout.paragraph(&entry.description, body, 0.0);
            for achievement in entry.achievements.iter() {
                layout.bullet(achievement, body);
            }
            if !entry.technologies.is_empty() {
                let line = format!("{}: {}", labels.technologies, entry.technologies.join(", "));
                layout.paragraph(&line, muted, 0.0);
            }
        }
    }

    if !doc.projects.is_empty() {
        layout.section(labels.projects);
        for (i, project) in doc.projects.iter().enumerate() {
            if i > 0 {
                layout.gap(entry_gap);
            }
            layout.paragraph(&project.name, layout.strong(1.05), 0.0);
            if let Some(url) = project.url.as_deref() {
                layout.paragraph(url, muted, 0.0);
            }
            layout.paragraph(&project.description, body, 0.0);
            for achievement in project.achievements.iter() {
                layout.bullet(achievement, body);
            }
            if !project.technologies.is_empty() {
                let line = format!("{}: {}", labels.technologies, project.technologies.join(", "));
                layout.paragraph(&line, muted, 0.0);
            }
        }
    }

    if !doc.education.is_empty() {
        layout.section(labels.education);
        for (i, entry) in doc.education.iter().enumerate() {
            if i > 0 {
                layout.gap(entry_gap);
            }
            layout.paragraph(&entry.degree, layout.strong(1.05), 0.0);
            layout.paragraph(
                &joined(&[entry.institution.as_str(), entry.location.as_str(), entry.period.as_str()], SEPARATOR),
                muted,
                0.0,
            );
            if let Some(description) = entry.description.as_deref() {
                layout.paragraph(description, body, 0.0);
            }
        }
    }

    if !doc.certifications.is_empty() {
        layout.section(labels.certifications);
        for cert in doc.certifications.iter() {
            layout.paragraph(&joined(&[cert.name.as_str(), cert.issuer.as_str(), cert.date.as_str()], SEPARATOR), body, 0.0);
        }
    }

    if !doc.languages.is_empty() {
        layout.section(labels.languages);
        for entry in doc.languages.iter() {
            let line = joined(&[entry.language.as_str(), entry.proficiency.as_str()], ": ");
            layout.paragraph(&line, body, 0.0);
        }
    }

    layout.finish()
}

/// Renders the document to a complete text PDF.
pub fn render_text_pdf(
    doc: &CvDocument,
    customization: &Customization,
    labels: &Labels,
    ats: bool,
) -> Result<Vec<u8>, ExportError> {
    let config = PageConfig::from_customization(customization);
    let mut writer = PdfWriter::new();
    writer.add_font(REGULAR, get_metrics(config.face, Weight::Regular).base_font);
    writer.add_font(BOLD, get_metrics(config.face, Weight::Bold).base_font);

    let laid = layout_document(doc, customization, labels, ats);
    if laid.replaced > 0 {
        warn!(
            "{} character(s) have no WinAnsi code and print as '?' in the text PDF",
            laid.replaced
        );
    }
    for page in laid.pages {
        writer.add_page(page, &[])?;
    }
    writer.finish(&format!("{} CV", doc.personal_info.name))
}

/// Text PDF download, laid out on the blocking pool.
pub async fn export_text_pdf(
    doc: Arc<CvDocument>,
    customization: Customization,
    labels: &'static Labels,
    ats: bool,
) -> Result<ExportArtifact, ExportError> {
    let file_name = pdf_file_name(&doc.personal_info.name, ats);
    let bytes = run_blocking(move || render_text_pdf(&doc, &customization, labels, ats)).await?;
    Ok(ExportArtifact {
        file_name,
        content_type: PDF_CONTENT_TYPE,
        bytes,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::preview::labels_for;
    use crate::cv::schema::{sample_document, texts, ExperienceEntry};

    fn make_pdf(doc: &CvDocument, ats: bool) -> Vec<u8> {
        render_text_pdf(doc, &Customization::default(), labels_for("en"), ats).unwrap()
    }

    fn operators(pages: &[Vec<Operation>]) -> Vec<&str> {
        pages
            .iter()
            .flatten()
            .map(|op| op.operator.as_str())
            .collect()
    }

    #[test]
    fn test_pdf_text_is_extractable() {
        let bytes = make_pdf(&sample_document(), false);
        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        for needle in ["Lovelace", "Experience", "Mentored", "Babbage", "Analytical"] {
            assert!(text.contains(needle), "missing {needle} in {text}");
        }
    }

    #[test]
    fn test_ats_layout_has_no_rules_or_color() {
        let doc = sample_document();
        let c = Customization::default();
        let standard = layout_document(&doc, &c, labels_for("en"), false).pages;
        let ats = layout_document(&doc, &c, labels_for("en"), true).pages;

        assert!(operators(&standard).contains(&"S"));
        assert!(!operators(&ats).contains(&"S"));
        assert!(!operators(&ats).contains(&"RG"));

        // Same text objects in the same order.
        let shown = |pages: &[Vec<Operation>]| -> Vec<Vec<u8>> {
            pages
                .iter()
                .flatten()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| op.operands.first()?.as_str().ok().map(<[u8]>::to_vec))
                .collect()
        };
        assert_eq!(shown(&standard), shown(&ats));
    }

    #[test]
    fn test_long_documents_flow_onto_more_pages() {
        let mut doc = sample_document();
        let entry = ExperienceEntry {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Built and operated services. ".repeat(12),
            achievements: texts(&["Shipped a thing that mattered to a lot of people"; 6]),
            ..Default::default()
        };
        doc.experience = Arc::new((0..12).map(|_| Arc::new(entry.clone())).collect());

        let bytes = make_pdf(&doc, true);
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(parsed.get_pages().len() > 1);
    }

    #[test]
    fn test_empty_document_still_has_one_page() {
        let bytes = make_pdf(&CvDocument::default(), false);
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_text_stays_inside_margins() {
        let doc = sample_document();
        let c = Customization::default();
        let config = PageConfig::from_customization(&c);
        let pages = layout_document(&doc, &c, labels_for("en"), false).pages;
        for op in pages.iter().flatten().filter(|op| op.operator == "Td") {
            let y = op.operands[1].as_float().unwrap();
            assert!(y >= config.margin_pt - 1.0, "baseline {y} below margin");
            assert!(y <= config.page_height_pt - config.margin_pt);
        }
    }

    #[test]
    fn test_layout_counts_characters_printed_as_question_marks() {
        let c = Customization::default();
        let baseline = layout_document(&sample_document(), &c, labels_for("en"), false).replaced;

        let mut doc = sample_document();
        doc.summary = "Привет".to_string();
        let laid = layout_document(&doc, &c, labels_for("en"), false);
        assert_eq!(laid.replaced, baseline + 6);
        assert_eq!(baseline, 0);
    }

    #[tokio::test]
    async fn test_export_text_pdf_names_file() {
        let artifact = export_text_pdf(
            Arc::new(sample_document()),
            Customization::default(),
            labels_for("en"),
            false,
        )
        .await
        .unwrap();
        assert_eq!(artifact.file_name, "Ada_Lovelace_CV.pdf");
        assert!(artifact.bytes.starts_with(b"%PDF-1.5"));
    }
}
