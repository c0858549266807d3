//! Résumé document schema and presentation customization.
//!
//! JSON field names mirror the front-end contract (camelCase). Every record and every
//! sequence sits behind an `Arc` so that a persistent update can rebuild only the spine
//! from the root to the edited leaf while sibling subtrees stay pointer-equal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered sequence of plain strings (achievements, technologies, skill items).
pub type Texts = Arc<Vec<String>>;

/// Ordered sequence of records.
pub type Records<T> = Arc<Vec<Arc<T>>>;

// ────────────────────────────────────────────────────────────────────────────
// Document
// ────────────────────────────────────────────────────────────────────────────

/// Root of the résumé tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvDocument {
    pub personal_info: Arc<PersonalInfo>,
    pub summary: String,
    pub skills: Records<SkillGroup>,
    pub experience: Records<ExperienceEntry>,
    pub projects: Records<ProjectEntry>,
    pub education: Records<EducationEntry>,
    pub certifications: Records<Certification>,
    pub languages: Records<LanguageEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Profile photo URL. Only shown by the standard (non-ATS) rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub category: String,
    pub items: Texts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_logo: Option<String>,
    pub location: String,
    pub period: String,
    pub description: String,
    pub achievements: Texts,
    pub technologies: Texts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
    pub technologies: Texts,
    pub achievements: Texts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub location: String,
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub language: String,
    pub proficiency: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Customization
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Default,
    Professional,
    Modern,
    Creative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Inter,
    Roboto,
    Merriweather,
    Playfair,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    Compact,
    #[default]
    Normal,
    Relaxed,
}

impl ColorScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorScheme::Default => "default",
            ColorScheme::Professional => "professional",
            ColorScheme::Modern => "modern",
            ColorScheme::Creative => "creative",
        }
    }
}

impl FontFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            FontFamily::Inter => "inter",
            FontFamily::Roboto => "roboto",
            FontFamily::Merriweather => "merriweather",
            FontFamily::Playfair => "playfair",
        }
    }
}

impl FontSize {
    pub fn as_str(self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }
}

impl Spacing {
    pub fn as_str(self) -> &'static str {
        match self {
            Spacing::Compact => "compact",
            Spacing::Normal => "normal",
            Spacing::Relaxed => "relaxed",
        }
    }
}

pub const DEFAULT_ACCENT_COLOR: &str = "#2563eb";
const DEFAULT_ACCENT_RGB: [u8; 3] = [0x25, 0x63, 0xeb];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomizationError {
    #[error("accent color '{0}' is not a #rrggbb or #rgb hex color")]
    InvalidAccentColor(String),
}

/// Parses `#rrggbb` or `#rgb`.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
        3 => {
            let mut rgb = [0u8; 3];
            for (slot, c) in rgb.iter_mut().zip(hex.chars()) {
                let v = c.to_digit(16)? as u8;
                *slot = v * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}

fn check_accent(value: &str) -> Result<(), CustomizationError> {
    match parse_hex_color(value) {
        Some(_) => Ok(()),
        None => Err(CustomizationError::InvalidAccentColor(value.to_string())),
    }
}

/// Presentation settings, independent of document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub color_scheme: ColorScheme,
    pub font_family: FontFamily,
    pub font_size: FontSize,
    pub spacing: Spacing,
    pub accent_color: String,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            color_scheme: ColorScheme::default(),
            font_family: FontFamily::default(),
            font_size: FontSize::default(),
            spacing: Spacing::default(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
        }
    }
}

/// Partial customization update. Supplied fields overwrite, absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationPatch {
    #[serde(default)]
    pub color_scheme: Option<ColorScheme>,
    #[serde(default)]
    pub font_family: Option<FontFamily>,
    #[serde(default)]
    pub font_size: Option<FontSize>,
    #[serde(default)]
    pub spacing: Option<Spacing>,
    #[serde(default)]
    pub accent_color: Option<String>,
}

impl CustomizationPatch {
    /// Rejects values that cannot be rendered. Run before [`Customization::apply`].
    pub fn validate(&self) -> Result<(), CustomizationError> {
        match &self.accent_color {
            Some(accent) => check_accent(accent),
            None => Ok(()),
        }
    }
}

impl Customization {
    pub fn validate(&self) -> Result<(), CustomizationError> {
        check_accent(&self.accent_color)
    }

    /// Accent color as RGB; the default accent if the stored value does not parse.
    pub fn accent_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.accent_color).unwrap_or(DEFAULT_ACCENT_RGB)
    }

    pub fn apply(&mut self, patch: CustomizationPatch) {
        if let Some(scheme) = patch.color_scheme {
            self.color_scheme = scheme;
        }
        if let Some(family) = patch.font_family {
            self.font_family = family;
        }
        if let Some(size) = patch.font_size {
            self.font_size = size;
        }
        if let Some(spacing) = patch.spacing {
            self.spacing = spacing;
        }
        if let Some(accent) = patch.accent_color {
            self.accent_color = accent;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test fixtures
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn texts(items: &[&str]) -> Texts {
    Arc::new(items.iter().map(|s| s.to_string()).collect())
}

/// A small but complete document used across the test modules.
#[cfg(test)]
pub(crate) fn sample_document() -> CvDocument {
    CvDocument {
        personal_info: Arc::new(PersonalInfo {
            name: "Ada Lovelace".to_string(),
            title: "Systems Engineer".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            location: "London".to_string(),
            linkedin: Some("linkedin.com/in/ada".to_string()),
            github: Some("github.com/ada".to_string()),
            website: None,
            photo: Some("https://example.com/ada.jpg".to_string()),
        }),
        summary: "Engineer who enjoys analytical engines.".to_string(),
        skills: Arc::new(vec![
            Arc::new(SkillGroup {
                category: "Languages".to_string(),
                items: texts(&["A", "B"]),
            }),
            Arc::new(SkillGroup {
                category: "Tools".to_string(),
                items: texts(&["Git", "Docker"]),
            }),
        ]),
        experience: Arc::new(vec![
            Arc::new(ExperienceEntry {
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                company_logo: Some("https://example.com/acme.png".to_string()),
                location: "Remote".to_string(),
                period: "2020 - Present".to_string(),
                description: "Builds engines.".to_string(),
                achievements: texts(&["Shipped X", "Cut costs by 20%", "Mentored 4 engineers"]),
                technologies: texts(&["Rust", "Postgres"]),
            }),
            Arc::new(ExperienceEntry {
                title: "Intern".to_string(),
                company: "Babbage & Co".to_string(),
                company_logo: None,
                location: "London".to_string(),
                period: "2018 - 2019".to_string(),
                description: "Assisted with the difference engine.".to_string(),
                achievements: texts(&["Wrote the first program"]),
                technologies: texts(&["Punch cards"]),
            }),
        ]),
        projects: Arc::new(vec![Arc::new(ProjectEntry {
            name: "Engine".to_string(),
            description: "A general purpose computer.".to_string(),
            technologies: texts(&["Brass"]),
            achievements: texts(&["Designed the mill"]),
            url: None,
        })]),
        education: Arc::new(vec![Arc::new(EducationEntry {
            degree: "Mathematics".to_string(),
            institution: "Home tutoring".to_string(),
            location: "London".to_string(),
            period: "1830 - 1835".to_string(),
            description: None,
        })]),
        certifications: Arc::new(vec![Arc::new(Certification {
            name: "Analytical Engines".to_string(),
            issuer: "Royal Society".to_string(),
            date: "1843".to_string(),
        })]),
        languages: Arc::new(vec![Arc::new(LanguageEntry {
            language: "English".to_string(),
            proficiency: "Native".to_string(),
        })]),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
