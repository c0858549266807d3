//! Per-record navigation: how each schema type exposes its properties to a path walk
//! and how it rebuilds itself with exactly one property replaced.
//!
//! Reading goes through `Node::slot` (dynamic, borrowed). Writing goes through
//! `Rebuild::rebuild`, which shallow-copies the record, recurses into the one property
//! named by the cursor and leaves every other property shared.

use std::sync::Arc;

use crate::cv::mutator::{Edit, FieldValue};
use crate::cv::path::{PathError, Selector, Step};
use crate::cv::schema::{
    Certification, CvDocument, EducationEntry, ExperienceEntry, LanguageEntry, PersonalInfo,
    ProjectEntry, Records, SkillGroup, Texts,
};

// ────────────────────────────────────────────────────────────────────────────
// Read side
// ────────────────────────────────────────────────────────────────────────────

/// Borrowed view of one named property of a record.
pub enum Slot<'a> {
    Text(&'a str),
    OptionalText(Option<&'a str>),
    Texts(&'a [String]),
    Record(&'a dyn Node),
    Records(Vec<&'a dyn Node>),
}

impl Slot<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Slot::Text(_) => "text",
            Slot::OptionalText(_) => "optional text",
            Slot::Texts(_) => "list of text",
            Slot::Record(node) => node.kind(),
            Slot::Records(_) => "list of records",
        }
    }
}

pub trait Node: Send + Sync {
    /// Human-readable type name used in error messages.
    fn kind(&self) -> &'static str;
    /// Property names in rendering order.
    fn fields(&self) -> &'static [&'static str];
    fn slot(&self, name: &str) -> Option<Slot<'_>>;
}

// ────────────────────────────────────────────────────────────────────────────
// Write side
// ────────────────────────────────────────────────────────────────────────────

/// Position of a rebuild inside a path.
#[derive(Clone, Copy)]
pub struct Cursor<'p> {
    steps: &'p [Step],
    depth: usize,
}

impl<'p> Cursor<'p> {
    pub fn start(steps: &'p [Step]) -> Self {
        Self { steps, depth: 0 }
    }

    pub fn step(&self) -> &'p Step {
        &self.steps[self.depth]
    }

    pub fn name(&self) -> &'p str {
        &self.step().name
    }

    pub fn is_last(&self) -> bool {
        self.depth + 1 == self.steps.len()
    }

    pub fn next(self) -> Self {
        Self {
            steps: self.steps,
            depth: self.depth + 1,
        }
    }

    /// Path text up to and including the current step.
    pub fn trail(&self) -> String {
        trail(&self.steps[..=self.depth])
    }

    pub fn unknown(&self, container: &'static str) -> PathError {
        PathError::Resolution {
            path: self.trail(),
            container,
            name: self.name().to_string(),
        }
    }

    pub fn mismatch(&self, expected: &'static str, found: &'static str) -> PathError {
        PathError::TypeMismatch {
            path: self.trail(),
            expected,
            found,
        }
    }

    pub fn out_of_range(&self, index: usize, len: usize) -> PathError {
        PathError::IndexOutOfRange {
            path: self.trail(),
            index,
            len,
        }
    }

    /// The positional index of the current step, if any.
    fn index(&self) -> Result<Option<usize>, PathError> {
        match self.step().selector {
            None => Ok(None),
            Some(Selector::Index(i)) => Ok(Some(i)),
            Some(Selector::Id(_)) => Err(PathError::UnresolvedId { path: self.trail() }),
        }
    }
}

pub fn trail(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

pub trait Rebuild: Node + Clone + Default + 'static {
    /// Returns a copy of `self` with the property named by the cursor's step edited.
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError>;
}

fn edit_text(cursor: Cursor<'_>, edit: Edit) -> Result<String, PathError> {
    if cursor.step().selector.is_some() {
        return Err(cursor.mismatch("list", "text"));
    }
    if !cursor.is_last() {
        return Err(cursor.next().unknown("text"));
    }
    match edit {
        Edit::Set(FieldValue::Text(value)) => Ok(value),
        other => Err(cursor.mismatch(other.expects(), "text")),
    }
}

fn edit_optional_text(cursor: Cursor<'_>, edit: Edit) -> Result<Option<String>, PathError> {
    if cursor.step().selector.is_some() {
        return Err(cursor.mismatch("list", "optional text"));
    }
    if !cursor.is_last() {
        return Err(cursor.next().unknown("optional text"));
    }
    match edit {
        Edit::Set(FieldValue::Text(value)) => Ok(Some(value)),
        Edit::Set(FieldValue::Unset) => Ok(None),
        other => Err(cursor.mismatch(other.expects(), "optional text")),
    }
}

fn edit_texts(current: &Texts, cursor: Cursor<'_>, edit: Edit) -> Result<Texts, PathError> {
    match cursor.index()? {
        None => {
            if !cursor.is_last() {
                return Err(cursor.next().unknown("list of text"));
            }
            match edit {
                Edit::Set(FieldValue::List(items)) => Ok(Arc::new(items)),
                Edit::Push(item) => {
                    let mut items = (**current).clone();
                    items.push(item);
                    Ok(Arc::new(items))
                }
                Edit::Remove(index) => {
                    if index >= current.len() {
                        return Err(cursor.out_of_range(index, current.len()));
                    }
                    let mut items = (**current).clone();
                    items.remove(index);
                    Ok(Arc::new(items))
                }
                other => Err(cursor.mismatch(other.expects(), "list of text")),
            }
        }
        Some(index) => {
            if index >= current.len() {
                return Err(cursor.out_of_range(index, current.len()));
            }
            if !cursor.is_last() {
                return Err(cursor.next().unknown("text"));
            }
            match edit {
                Edit::Set(FieldValue::Text(value)) => {
                    let mut items = (**current).clone();
                    items[index] = value;
                    Ok(Arc::new(items))
                }
                other => Err(cursor.mismatch(other.expects(), "text")),
            }
        }
    }
}

fn edit_record<T: Rebuild>(
    current: &Arc<T>,
    cursor: Cursor<'_>,
    edit: Edit,
) -> Result<Arc<T>, PathError> {
    if cursor.step().selector.is_some() {
        return Err(cursor.mismatch("list", current.kind()));
    }
    if cursor.is_last() {
        return Err(cursor.mismatch(edit.expects(), current.kind()));
    }
    Ok(Arc::new(current.rebuild(cursor.next(), edit)?))
}

fn edit_records<T: Rebuild>(
    current: &Records<T>,
    cursor: Cursor<'_>,
    edit: Edit,
) -> Result<Records<T>, PathError> {
    match cursor.index()? {
        None => {
            if !cursor.is_last() {
                return Err(cursor.next().unknown("list of records"));
            }
            match edit {
                Edit::PushEntry => {
                    let mut items = (**current).clone();
                    items.push(Arc::new(T::default()));
                    Ok(Arc::new(items))
                }
                Edit::Remove(index) => {
                    if index >= current.len() {
                        return Err(cursor.out_of_range(index, current.len()));
                    }
                    let mut items = (**current).clone();
                    items.remove(index);
                    Ok(Arc::new(items))
                }
                other => Err(cursor.mismatch(other.expects(), "list of records")),
            }
        }
        Some(index) => {
            let Some(item) = current.get(index) else {
                return Err(cursor.out_of_range(index, current.len()));
            };
            if cursor.is_last() {
                return Err(cursor.mismatch(edit.expects(), item.kind()));
            }
            let rebuilt = Arc::new(item.rebuild(cursor.next(), edit)?);
            let mut items = (**current).clone();
            items[index] = rebuilt;
            Ok(Arc::new(items))
        }
    }
}

fn nodes<T: Node + 'static>(items: &Records<T>) -> Vec<&dyn Node> {
    items.iter().map(|item| item.as_ref() as &dyn Node).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Schema implementations
// ────────────────────────────────────────────────────────────────────────────

impl Node for CvDocument {
    fn kind(&self) -> &'static str {
        "document"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "personalInfo",
            "summary",
            "skills",
            "experience",
            "projects",
            "education",
            "certifications",
            "languages",
        ]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "personalInfo" => Slot::Record(self.personal_info.as_ref()),
            "summary" => Slot::Text(&self.summary),
            "skills" => Slot::Records(nodes(&self.skills)),
            "experience" => Slot::Records(nodes(&self.experience)),
            "projects" => Slot::Records(nodes(&self.projects)),
            "education" => Slot::Records(nodes(&self.education)),
            "certifications" => Slot::Records(nodes(&self.certifications)),
            "languages" => Slot::Records(nodes(&self.languages)),
            _ => return None,
        })
    }
}

impl Rebuild for CvDocument {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "personalInfo" => next.personal_info = edit_record(&self.personal_info, cursor, edit)?,
            "summary" => next.summary = edit_text(cursor, edit)?,
            "skills" => next.skills = edit_records(&self.skills, cursor, edit)?,
            "experience" => next.experience = edit_records(&self.experience, cursor, edit)?,
            "projects" => next.projects = edit_records(&self.projects, cursor, edit)?,
            "education" => next.education = edit_records(&self.education, cursor, edit)?,
            "certifications" => {
                next.certifications = edit_records(&self.certifications, cursor, edit)?
            }
            "languages" => next.languages = edit_records(&self.languages, cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for PersonalInfo {
    fn kind(&self) -> &'static str {
        "personal info"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "name", "title", "email", "phone", "location", "linkedin", "github", "website",
            "photo",
        ]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "name" => Slot::Text(&self.name),
            "title" => Slot::Text(&self.title),
            "email" => Slot::Text(&self.email),
            "phone" => Slot::OptionalText(self.phone.as_deref()),
            "location" => Slot::Text(&self.location),
            "linkedin" => Slot::OptionalText(self.linkedin.as_deref()),
            "github" => Slot::OptionalText(self.github.as_deref()),
            "website" => Slot::OptionalText(self.website.as_deref()),
            "photo" => Slot::OptionalText(self.photo.as_deref()),
            _ => return None,
        })
    }
}

impl Rebuild for PersonalInfo {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "name" => next.name = edit_text(cursor, edit)?,
            "title" => next.title = edit_text(cursor, edit)?,
            "email" => next.email = edit_text(cursor, edit)?,
            "phone" => next.phone = edit_optional_text(cursor, edit)?,
            "location" => next.location = edit_text(cursor, edit)?,
            "linkedin" => next.linkedin = edit_optional_text(cursor, edit)?,
            "github" => next.github = edit_optional_text(cursor, edit)?,
            "website" => next.website = edit_optional_text(cursor, edit)?,
            "photo" => next.photo = edit_optional_text(cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for SkillGroup {
    fn kind(&self) -> &'static str {
        "skill group"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["category", "items"]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "category" => Slot::Text(&self.category),
            "items" => Slot::Texts(&self.items),
            _ => return None,
        })
    }
}

impl Rebuild for SkillGroup {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "category" => next.category = edit_text(cursor, edit)?,
            "items" => next.items = edit_texts(&self.items, cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for ExperienceEntry {
    fn kind(&self) -> &'static str {
        "experience entry"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "title",
            "company",
            "companyLogo",
            "location",
            "period",
            "description",
            "achievements",
            "technologies",
        ]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "title" => Slot::Text(&self.title),
            "company" => Slot::Text(&self.company),
            "companyLogo" => Slot::OptionalText(self.company_logo.as_deref()),
            "location" => Slot::Text(&self.location),
            "period" => Slot::Text(&self.period),
            "description" => Slot::Text(&self.description),
            "achievements" => Slot::Texts(&self.achievements),
            "technologies" => Slot::Texts(&self.technologies),
            _ => return None,
        })
    }
}

impl Rebuild for ExperienceEntry {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "title" => next.title = edit_text(cursor, edit)?,
            "company" => next.company = edit_text(cursor, edit)?,
            "companyLogo" => next.company_logo = edit_optional_text(cursor, edit)?,
            "location" => next.location = edit_text(cursor, edit)?,
            "period" => next.period = edit_text(cursor, edit)?,
            "description" => next.description = edit_text(cursor, edit)?,
            "achievements" => next.achievements = edit_texts(&self.achievements, cursor, edit)?,
            "technologies" => next.technologies = edit_texts(&self.technologies, cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for ProjectEntry {
    fn kind(&self) -> &'static str {
        "project entry"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "description", "technologies", "achievements", "url"]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "name" => Slot::Text(&self.name),
            "description" => Slot::Text(&self.description),
            "technologies" => Slot::Texts(&self.technologies),
            "achievements" => Slot::Texts(&self.achievements),
            "url" => Slot::OptionalText(self.url.as_deref()),
            _ => return None,
        })
    }
}

impl Rebuild for ProjectEntry {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "name" => next.name = edit_text(cursor, edit)?,
            "description" => next.description = edit_text(cursor, edit)?,
            "technologies" => next.technologies = edit_texts(&self.technologies, cursor, edit)?,
            "achievements" => next.achievements = edit_texts(&self.achievements, cursor, edit)?,
            "url" => next.url = edit_optional_text(cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for EducationEntry {
    fn kind(&self) -> &'static str {
        "education entry"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["degree", "institution", "location", "period", "description"]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "degree" => Slot::Text(&self.degree),
            "institution" => Slot::Text(&self.institution),
            "location" => Slot::Text(&self.location),
            "period" => Slot::Text(&self.period),
            "description" => Slot::OptionalText(self.description.as_deref()),
            _ => return None,
        })
    }
}

impl Rebuild for EducationEntry {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "degree" => next.degree = edit_text(cursor, edit)?,
            "institution" => next.institution = edit_text(cursor, edit)?,
            "location" => next.location = edit_text(cursor, edit)?,
            "period" => next.period = edit_text(cursor, edit)?,
            "description" => next.description = edit_optional_text(cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for Certification {
    fn kind(&self) -> &'static str {
        "certification"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "issuer", "date"]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "name" => Slot::Text(&self.name),
            "issuer" => Slot::Text(&self.issuer),
            "date" => Slot::Text(&self.date),
            _ => return None,
        })
    }
}

impl Rebuild for Certification {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "name" => next.name = edit_text(cursor, edit)?,
            "issuer" => next.issuer = edit_text(cursor, edit)?,
            "date" => next.date = edit_text(cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}

impl Node for LanguageEntry {
    fn kind(&self) -> &'static str {
        "language entry"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["language", "proficiency"]
    }

    fn slot(&self, name: &str) -> Option<Slot<'_>> {
        Some(match name {
            "language" => Slot::Text(&self.language),
            "proficiency" => Slot::Text(&self.proficiency),
            _ => return None,
        })
    }
}

impl Rebuild for LanguageEntry {
    fn rebuild(&self, cursor: Cursor<'_>, edit: Edit) -> Result<Self, PathError> {
        let mut next = self.clone();
        match cursor.name() {
            "language" => next.language = edit_text(cursor, edit)?,
            "proficiency" => next.proficiency = edit_text(cursor, edit)?,
            _ => return Err(cursor.unknown(self.kind())),
        }
        Ok(next)
    }
}
