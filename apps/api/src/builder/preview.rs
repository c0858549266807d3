//! Preview surface: renders the current document into an element tree.
//!
//! Standard and ATS renders come from the same document snapshot and contain the same
//! text nodes in the same order. ATS mode only drops decoration (icons, photo, company
//! logos, pill styling, accent colors), none of which carries text.
//!
//! Once mounted, the preview keeps one cached element per section. A document change
//! re-renders just the sections bound to an affected path, and every refresh publishes a
//! numbered [`Frame`] on a watch channel. Exports wait on that channel for the first
//! frame in the mode they need instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::builder::dom::{Element, Node};
use crate::builder::editable::{EditableField, EditableList, ListControls};
use crate::builder::store::{BuilderStore, Change};
use crate::cv::path::{Path, PathError};
use crate::cv::schema::CvDocument;
use crate::export::ExportError;

/// `id` of the preview's root element.
pub const PREVIEW_ROOT_ID: &str = "cv-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Standard,
    Ats,
}

impl RenderMode {
    pub fn from_ats(ats: bool) -> Self {
        if ats {
            RenderMode::Ats
        } else {
            RenderMode::Standard
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Standard => "standard",
            RenderMode::Ats => "ats",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Section headings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Labels {
    pub summary: &'static str,
    pub skills: &'static str,
    pub experience: &'static str,
    pub projects: &'static str,
    pub education: &'static str,
    pub certifications: &'static str,
    pub languages: &'static str,
    pub technologies: &'static str,
    pub controls: ListControls,
}

static LABELS_EN: Labels = Labels {
    summary: "Professional Summary",
    skills: "Skills",
    experience: "Experience",
    projects: "Projects",
    education: "Education",
    certifications: "Certifications",
    languages: "Languages",
    technologies: "Technologies",
    controls: ListControls {
        add: "Add",
        remove: "Remove",
    },
};

static LABELS_ES: Labels = Labels {
    summary: "Resumen Profesional",
    skills: "Habilidades",
    experience: "Experiencia",
    projects: "Proyectos",
    education: "Educación",
    certifications: "Certificaciones",
    languages: "Idiomas",
    technologies: "Tecnologías",
    controls: ListControls {
        add: "Añadir",
        remove: "Eliminar",
    },
};

/// Headings for `locale` (`es`, `es-MX`, ...); anything unknown falls back to English.
pub fn labels_for(locale: &str) -> &'static Labels {
    match locale.split(|c| c == '-' || c == '_').next() {
        Some("es") => &LABELS_ES,
        _ => &LABELS_EN,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Summary,
    Skills,
    Experience,
    Projects,
    Education,
    Certifications,
    Languages,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Header,
        Section::Summary,
        Section::Skills,
        Section::Experience,
        Section::Projects,
        Section::Education,
        Section::Certifications,
        Section::Languages,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Summary => "summary",
            Section::Skills => "skills",
            Section::Experience => "experience",
            Section::Projects => "projects",
            Section::Education => "education",
            Section::Certifications => "certifications",
            Section::Languages => "languages",
        }
    }

    /// Document property the section renders.
    pub fn bound_path(self) -> Path {
        match self {
            Section::Header => Path::root("personalInfo"),
            other => Path::root(other.key()),
        }
    }

    fn title(self, labels: &Labels) -> &'static str {
        match self {
            Section::Header => "",
            Section::Summary => labels.summary,
            Section::Skills => labels.skills,
            Section::Experience => labels.experience,
            Section::Projects => labels.projects,
            Section::Education => labels.education,
            Section::Certifications => labels.certifications,
            Section::Languages => labels.languages,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Section::Header => "user",
            Section::Summary => "file-text",
            Section::Skills => "code",
            Section::Experience => "briefcase",
            Section::Projects => "folder",
            Section::Education => "graduation-cap",
            Section::Certifications => "award",
            Section::Languages => "globe",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

/// Everything a section renderer reads, taken from one store snapshot.
pub struct RenderContext<'a> {
    store: &'a BuilderStore,
    doc: &'a CvDocument,
    mode: RenderMode,
    editing: bool,
    labels: &'static Labels,
}

impl<'a> RenderContext<'a> {
    pub fn new(store: &'a BuilderStore, labels: &'static Labels) -> Self {
        Self {
            store,
            doc: store.current().as_ref(),
            mode: RenderMode::from_ats(store.ats_mode()),
            editing: store.is_editing(),
            labels,
        }
    }

    fn decorative(&self) -> bool {
        self.mode == RenderMode::Standard
    }

    /// Binds a list whose edit controls are captioned in the session's language.
    fn list<'b, T>(&self, path: &str, items: &'b [T]) -> Result<EditableList<'b, T>, PathError> {
        Ok(EditableList::bind(self.store, path, items)?.controls(self.labels.controls))
    }

    fn field(&self, path: Path, value: &str) -> EditableField {
        EditableField::new(path, value)
    }

    fn optional(&self, path: Path, value: Option<&str>, tag: &'static str, class: &str) -> Option<Element> {
        let value = match value {
            Some(value) => value,
            None if self.editing => "",
            None => return None,
        };
        Some(self.field(path, value).tag(tag).class(class).render(self.editing))
    }

    fn section(&self, section: Section) -> Element {
        let mut heading = Element::new("h2").class("section-title");
        if self.decorative() {
            heading = heading.child(icon(section.icon()));
        }
        Element::new("section")
            .class(format!("cv-section cv-{}", section.key()))
            .attr("data-section", section.key())
            .child(heading.text(section.title(self.labels)))
    }

    fn bullets(&self, path: &Path, items: &[String]) -> Result<Element, PathError> {
        Ok(self.list(&path.to_string(), items)?
            .class("bullets")
            .render_fields(self.editing, "span"))
    }

    fn tags(&self, path: &Path, items: &[String]) -> Result<Element, PathError> {
        let class = if self.decorative() { "tag pill" } else { "tag" };
        Ok(self.list(&path.to_string(), items)?
            .class("tags")
            .render(self.editing, |item, _, item_path| {
                self.field(item_path.clone(), item)
                    .class(class)
                    .render(self.editing)
                    .into()
            }))
    }

    fn meta(&self, base: &Path, parts: &[(&str, &'static str, &str)]) -> Element {
        let mut meta = Element::new("p").class("entry-meta");
        for (name, icon_name, value) in parts {
            if self.decorative() {
                meta = meta.child(icon(icon_name));
            }
            meta = meta.child(
                self.field(base.child(name), value)
                    .class(format!("meta-{name}"))
                    .render(self.editing),
            );
        }
        meta
    }
}

fn icon(name: &str) -> Element {
    Element::new("i")
        .class(format!("icon icon-{name}"))
        .attr("aria-hidden", "true")
}

fn image(class: &'static str, src: &str) -> Element {
    Element::new("img").class(class).attr("src", src).attr("alt", "")
}

/// Renders one section, or `None` when it has nothing to show.
pub fn render_section(cx: &RenderContext<'_>, section: Section) -> Result<Option<Element>, PathError> {
    match section {
        Section::Header => Ok(Some(header(cx))),
        Section::Summary => Ok(summary(cx)),
        Section::Skills => skills(cx),
        Section::Experience => experience(cx),
        Section::Projects => projects(cx),
        Section::Education => education(cx),
        Section::Certifications => certifications(cx),
        Section::Languages => languages(cx),
    }
}

/// Wraps rendered sections in the root element carrying the customization.
pub fn render_root<I>(store: &BuilderStore, sections: I) -> Element
where
    I: IntoIterator<Item = Element>,
{
    let mode = RenderMode::from_ats(store.ats_mode());
    let c = store.customization();
    let mut root = Element::new("article")
        .attr("id", PREVIEW_ROOT_ID)
        .attr("data-mode", mode.as_str())
        .class(format!(
            "cv font-{} size-{} spacing-{}",
            c.font_family.as_str(),
            c.font_size.as_str(),
            c.spacing.as_str()
        ));
    if mode == RenderMode::Standard {
        root = root
            .attr("data-scheme", c.color_scheme.as_str())
            .attr("style", format!("--accent-color: {}", c.accent_color));
    }
    if store.is_editing() {
        root = root.attr("data-editing", "true");
    }
    root.children_from(sections)
}

/// Full render of the store's current state.
pub fn render_preview(store: &BuilderStore, labels: &'static Labels) -> Result<Element, PathError> {
    let cx = RenderContext::new(store, labels);
    let mut sections = Vec::with_capacity(Section::ALL.len());
    for section in Section::ALL {
        sections.extend(render_section(&cx, section)?);
    }
    Ok(render_root(store, sections))
}

fn header(cx: &RenderContext<'_>) -> Element {
    let info = &cx.doc.personal_info;
    let base = Path::root("personalInfo");

    let mut header = Element::new("header").class(if cx.decorative() {
        "cv-header accent-band"
    } else {
        "cv-header"
    });
    if cx.decorative() {
        if let Some(photo) = &info.photo {
            header = header.child(image("photo", photo));
        }
    }
    header = header
        .child(
            cx.field(base.child("name"), &info.name)
                .tag("h1")
                .class("name")
                .render(cx.editing),
        )
        .child(
            cx.field(base.child("title"), &info.title)
                .tag("p")
                .class("headline")
                .render(cx.editing),
        );

    let contacts: [(&str, &str, Option<&str>); 6] = [
        ("email", "mail", Some(info.email.as_str())),
        ("phone", "phone", info.phone.as_deref()),
        ("location", "map-pin", Some(info.location.as_str())),
        ("linkedin", "linkedin", info.linkedin.as_deref()),
        ("github", "github", info.github.as_deref()),
        ("website", "globe", info.website.as_deref()),
    ];
    let mut list = Element::new("ul").class("contacts");
    for (name, icon_name, value) in contacts {
        let Some(field) = cx.optional(base.child(name), value, "span", "contact-value") else {
            continue;
        };
        let mut item = Element::new("li").class(format!("contact contact-{name}"));
        if cx.decorative() {
            item = item.child(icon(icon_name));
        }
        list = list.child(item.child(field));
    }
    header.child(list)
}

fn summary(cx: &RenderContext<'_>) -> Option<Element> {
    if cx.doc.summary.is_empty() && !cx.editing {
        return None;
    }
    Some(
        cx.section(Section::Summary).child(
            cx.field(Path::root("summary"), &cx.doc.summary)
                .tag("p")
                .class("summary")
                .multiline()
                .render(cx.editing),
        ),
    )
}

fn skills(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let groups = &cx.doc.skills;
    if groups.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("skills", groups.as_slice())?
        .tag("div")
        .class("skill-groups")
        .try_render(cx.editing, |group, _, path| -> Result<Node, PathError> {
            Ok(Element::new("div")
                .class("skill-group")
                .child(
                    cx.field(path.child("category"), &group.category)
                        .tag("h3")
                        .class("skill-category")
                        .render(cx.editing),
                )
                .child(cx.tags(&path.child("items"), group.items.as_slice())?)
                .into())
        })?;
    Ok(Some(cx.section(Section::Skills).child(body)))
}

fn experience(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let entries = &cx.doc.experience;
    if entries.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("experience", entries.as_slice())?
        .tag("div")
        .class("entries")
        .try_render(cx.editing, |entry, _, path| -> Result<Node, PathError> {
            let mut head = Element::new("div").class("entry-head");
            if cx.decorative() {
                if let Some(logo) = &entry.company_logo {
                    head = head.child(image("company-logo", logo));
                }
            }
            head = head
                .child(
                    cx.field(path.child("title"), &entry.title)
                        .tag("h3")
                        .class("entry-title")
                        .render(cx.editing),
                )
                .child(
                    cx.field(path.child("company"), &entry.company)
                        .tag("p")
                        .class("entry-org")
                        .render(cx.editing),
                )
                .child(cx.meta(
                    path,
                    &[
                        ("location", "map-pin", entry.location.as_str()),
                        ("period", "calendar", entry.period.as_str()),
                    ],
                ));
            Ok(Element::new("article")
                .class("entry")
                .child(head)
                .child(
                    cx.field(path.child("description"), &entry.description)
                        .tag("p")
                        .class("entry-description")
                        .multiline()
                        .render(cx.editing),
                )
                .child(cx.bullets(&path.child("achievements"), entry.achievements.as_slice())?)
                .child(cx.tags(&path.child("technologies"), entry.technologies.as_slice())?)
                .into())
        })?;
    Ok(Some(cx.section(Section::Experience).child(body)))
}

fn projects(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let entries = &cx.doc.projects;
    if entries.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("projects", entries.as_slice())?
        .tag("div")
        .class("entries")
        .try_render(cx.editing, |project, _, path| -> Result<Node, PathError> {
            Ok(Element::new("article")
                .class("entry")
                .child(
                    cx.field(path.child("name"), &project.name)
                        .tag("h3")
                        .class("entry-title")
                        .render(cx.editing),
                )
                .children_from(cx.optional(path.child("url"), project.url.as_deref(), "p", "entry-url"))
                .child(
                    cx.field(path.child("description"), &project.description)
                        .tag("p")
                        .class("entry-description")
                        .multiline()
                        .render(cx.editing),
                )
                .child(cx.bullets(&path.child("achievements"), project.achievements.as_slice())?)
                .child(cx.tags(&path.child("technologies"), project.technologies.as_slice())?)
                .into())
        })?;
    Ok(Some(cx.section(Section::Projects).child(body)))
}

fn education(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let entries = &cx.doc.education;
    if entries.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("education", entries.as_slice())?
        .tag("div")
        .class("entries")
        .try_render(cx.editing, |entry, _, path| -> Result<Node, PathError> {
            Ok(Element::new("article")
                .class("entry")
                .child(
                    cx.field(path.child("degree"), &entry.degree)
                        .tag("h3")
                        .class("entry-title")
                        .render(cx.editing),
                )
                .child(
                    cx.field(path.child("institution"), &entry.institution)
                        .tag("p")
                        .class("entry-org")
                        .render(cx.editing),
                )
                .child(cx.meta(
                    path,
                    &[
                        ("location", "map-pin", entry.location.as_str()),
                        ("period", "calendar", entry.period.as_str()),
                    ],
                ))
                .children_from(cx.optional(
                    path.child("description"),
                    entry.description.as_deref(),
                    "p",
                    "entry-description",
                ))
                .into())
        })?;
    Ok(Some(cx.section(Section::Education).child(body)))
}

fn certifications(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let entries = &cx.doc.certifications;
    if entries.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("certifications", entries.as_slice())?
        .class("certifications")
        .render(cx.editing, |cert, _, path| {
            Element::new("div")
                .class("certification")
                .child(
                    cx.field(path.child("name"), &cert.name)
                        .tag("strong")
                        .render(cx.editing),
                )
                .child(
                    cx.field(path.child("issuer"), &cert.issuer)
                        .class("issuer")
                        .render(cx.editing),
                )
                .child(
                    cx.field(path.child("date"), &cert.date)
                        .class("date")
                        .render(cx.editing),
                )
                .into()
        });
    Ok(Some(cx.section(Section::Certifications).child(body)))
}

fn languages(cx: &RenderContext<'_>) -> Result<Option<Element>, PathError> {
    let entries = &cx.doc.languages;
    if entries.is_empty() && !cx.editing {
        return Ok(None);
    }
    let body = cx.list("languages", entries.as_slice())?
        .class("languages")
        .render(cx.editing, |entry, _, path| {
            Element::new("div")
                .class("language")
                .child(
                    cx.field(path.child("language"), &entry.language)
                        .tag("strong")
                        .render(cx.editing),
                )
                .child(
                    cx.field(path.child("proficiency"), &entry.proficiency)
                        .class(if cx.decorative() { "proficiency badge" } else { "proficiency" })
                        .render(cx.editing),
                )
                .into()
        });
    Ok(Some(cx.section(Section::Languages).child(body)))
}

// ────────────────────────────────────────────────────────────────────────────
// Mounted preview and frames
// ────────────────────────────────────────────────────────────────────────────

/// One published render of the preview.
#[derive(Debug, Clone)]
pub struct Frame {
    pub generation: u64,
    pub mode: RenderMode,
    pub root: Arc<Element>,
}

/// What changed since the last frame.
#[derive(Debug, Clone, Copy)]
pub enum Refresh<'a> {
    /// The document was replaced wholesale (reset).
    Everything,
    /// A single document edit.
    Document(&'a Change),
    /// Flags or customization only.
    Presentation,
}

struct SectionCache {
    mode: RenderMode,
    editing: bool,
    sections: Vec<(Section, Option<Element>)>,
}

pub struct Preview {
    frames: watch::Sender<Option<Frame>>,
    generation: u64,
    labels: &'static Labels,
    cache: Option<SectionCache>,
}

impl Preview {
    pub fn new(locale: &str) -> Self {
        let (frames, _) = watch::channel(None);
        Self {
            frames,
            generation: 0,
            labels: labels_for(locale),
            cache: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.cache.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn latest(&self) -> Option<Frame> {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Frame>> {
        self.frames.subscribe()
    }

    /// Renders every section and publishes the first frame. Mounting again re-renders.
    pub fn mount(&mut self, store: &BuilderStore) -> Result<Frame, PathError> {
        let cx = RenderContext::new(store, self.labels);
        let sections = Section::ALL
            .into_iter()
            .map(|section| Ok((section, render_section(&cx, section)?)))
            .collect::<Result<Vec<_>, PathError>>()?;
        self.cache = Some(SectionCache {
            mode: cx.mode,
            editing: cx.editing,
            sections,
        });
        Ok(self.publish(store))
    }

    /// Re-renders what `what` invalidates and publishes a new frame.
    ///
    /// Returns `None` while the preview is not mounted.
    pub fn refresh(&mut self, store: &BuilderStore, what: Refresh<'_>) -> Result<Option<Frame>, PathError> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(None);
        };
        let cx = RenderContext::new(store, self.labels);
        let stale = cache.mode != cx.mode || cache.editing != cx.editing;

        for (section, rendered) in cache.sections.iter_mut() {
            let dirty = stale
                || match what {
                    Refresh::Everything => true,
                    Refresh::Presentation => false,
                    Refresh::Document(change) => change.affects(&section.bound_path()),
                };
            if dirty {
                *rendered = render_section(&cx, *section)?;
            }
        }
        cache.mode = cx.mode;
        cache.editing = cx.editing;

        Ok(Some(self.publish(store)))
    }

    fn publish(&mut self, store: &BuilderStore) -> Frame {
        let sections = self
            .cache
            .iter()
            .flat_map(|cache| cache.sections.iter())
            .filter_map(|(_, rendered)| rendered.clone());
        let root = render_root(store, sections);

        self.generation += 1;
        let frame = Frame {
            generation: self.generation,
            mode: RenderMode::from_ats(store.ats_mode()),
            root: Arc::new(root),
        };
        self.frames.send_replace(Some(frame.clone()));
        frame
    }
}

/// Waits for the first frame rendered in `mode` with a generation above `after`.
pub async fn settled(
    mut frames: watch::Receiver<Option<Frame>>,
    mode: RenderMode,
    after: u64,
    timeout: Duration,
) -> Result<Frame, ExportError> {
    let wait = frames.wait_for(|frame| {
        frame
            .as_ref()
            .is_some_and(|f| f.mode == mode && f.generation > after)
    });
    let frame = match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(frame)) => (*frame).clone(),
        Ok(Err(_)) | Err(_) => None,
    };
    frame.ok_or(ExportError::RenderTimeout)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
