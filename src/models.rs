use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::validate::{ValidationErrors, Validator};

/// Server-assigned identifier. Opaque to the client: only compared and echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Numeric ids are accepted too; they are kept in their decimal form.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => EntityId(s),
            Raw::Signed(n) => EntityId(n.to_string()),
            Raw::Unsigned(n) => EntityId(n.to_string()),
        })
    }
}

/// Snapshot of the creator taken at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Author {
    pub fn from_identity(identity: &Identity) -> Self {
        Author {
            name: identity.name.clone(),
            avatar: initials(&identity.name),
            email: Some(identity.email.clone()).filter(|e| !e.is_empty()),
        }
    }
}

/// "Alex Johnson" -> "AJ"
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// A persisted entity: server fields plus the flattened resource fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<D> {
    pub id: EntityId,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub created_at: String,
    #[serde(flatten)]
    pub fields: D,
}

/// Request body for create and update: the draft plus its author snapshot.
#[derive(Debug, Serialize)]
pub struct Submission<'a, D> {
    pub author: &'a Author,
    #[serde(flatten)]
    pub draft: &'a D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Multiline,
    Choice,
    Percent,
    Toggle,
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

/// The user-editable part of a resource family.
pub trait Draft: Serialize + DeserializeOwned + Clone + Default + fmt::Debug + PartialEq {
    /// Collection path under the API base, e.g. `skill-posts`.
    const RESOURCE: &'static str;
    /// Singular noun for messages.
    const NOUN: &'static str;

    fn title(&self) -> &str;

    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Form layout used by the dialog, in display order.
    fn fields() -> &'static [FieldSpec];

    fn field_text(&self, key: &str) -> String;

    /// Mutable access to free-text fields; `None` for every other kind.
    fn field_text_mut(&mut self, key: &str) -> Option<&mut String>;

    /// Steps a choice, percent or toggle field.
    fn cycle_field(&mut self, _key: &str, _forward: bool) {}

    fn tags(&self) -> Option<&[String]> {
        None
    }

    fn tags_mut(&mut self) -> Option<&mut Vec<String>> {
        None
    }

    /// Completion percentage, for families that track one.
    fn percent(&self) -> Option<i64> {
        None
    }

    fn is_milestone_completed(&self) -> bool {
        false
    }

    /// Server-maintained counters, already formatted for display.
    fn stats(&self) -> Option<String> {
        None
    }

    /// Runs when a blank create form is opened.
    fn prepare_create(&mut self) {}
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Followers,
    Private,
}

impl Visibility {
    const ALL: [Visibility; 3] = [Visibility::Public, Visibility::Followers, Visibility::Private];

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Followers => "followers",
            Visibility::Private => "private",
        }
    }

    fn step(self, forward: bool) -> Self {
        step_choice(&Self::ALL, self, forward)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    #[default]
    Course,
    Project,
    Skill,
}

impl Template {
    const ALL: [Template; 3] = [Template::Course, Template::Project, Template::Skill];

    pub fn as_str(self) -> &'static str {
        match self {
            Template::Course => "course",
            Template::Project => "project",
            Template::Skill => "skill",
        }
    }

    pub fn title_prefix(self) -> &'static str {
        match self {
            Template::Course => "Completed Course: ",
            Template::Project => "Project Progress: ",
            Template::Skill => "Skill Development: ",
        }
    }

    pub fn default_milestone(self) -> &'static str {
        match self {
            Template::Course => "Course Completion",
            Template::Project => "Project Milestone",
            Template::Skill => "Skill Mastery",
        }
    }

    fn step(self, forward: bool) -> Self {
        step_choice(&Self::ALL, self, forward)
    }
}

fn step_choice<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let i = all.iter().position(|c| *c == current).unwrap_or(0);
    let next = if forward {
        (i + 1) % all.len()
    } else if i == 0 {
        all.len() - 1
    } else {
        i - 1
    };
    all[next]
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

fn count(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub allow_comments: bool,
    pub visibility: Visibility,
    /// Read-only counters; the server owns them.
    pub likes: u64,
    pub comments: u64,
}

impl Default for PostDraft {
    fn default() -> Self {
        PostDraft {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            allow_comments: true,
            visibility: Visibility::Public,
            likes: 0,
            comments: 0,
        }
    }
}

impl Draft for PostDraft {
    const RESOURCE: &'static str = "skill-posts";
    const NOUN: &'static str = "post";

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.text_length("title", "Title", &self.title, 5, 100)
            .text_length("description", "Description", &self.description, 10, 500)
            .required("category", &self.category, "Please select a category");
        v.finish()
    }

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            field("title", "Title", FieldKind::Text),
            field("description", "Description", FieldKind::Multiline),
            field("category", "Category", FieldKind::Text),
            field("visibility", "Visibility", FieldKind::Choice),
            field("allowComments", "Allow comments", FieldKind::Toggle),
            field("tags", "Tags", FieldKind::Tags),
        ];
        FIELDS
    }

    fn field_text(&self, key: &str) -> String {
        match key {
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "category" => self.category.clone(),
            "visibility" => self.visibility.as_str().to_string(),
            "allowComments" => yes_no(self.allow_comments),
            "tags" => self.tags.join(", "),
            _ => String::new(),
        }
    }

    fn field_text_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "title" => Some(&mut self.title),
            "description" => Some(&mut self.description),
            "category" => Some(&mut self.category),
            _ => None,
        }
    }

    fn cycle_field(&mut self, key: &str, forward: bool) {
        match key {
            "visibility" => self.visibility = self.visibility.step(forward),
            "allowComments" => self.allow_comments = !self.allow_comments,
            _ => {}
        }
    }

    fn tags(&self) -> Option<&[String]> {
        Some(&self.tags)
    }

    fn tags_mut(&mut self) -> Option<&mut Vec<String>> {
        Some(&mut self.tags)
    }

    fn stats(&self) -> Option<String> {
        Some(format!(
            "{}, {}",
            count(self.likes, "like"),
            count(self.comments, "comment")
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressDraft {
    pub title: String,
    pub description: String,
    pub milestone: String,
    pub progress_percent: i64,
    pub template: Template,
}

impl ProgressDraft {
    pub const PERCENT_STEP: i64 = 5;

    /// Selects `template` and prefills title and milestone when they are empty.
    pub fn apply_template(&mut self, template: Template) {
        self.template = template;
        if self.title.is_empty() {
            self.title = template.title_prefix().to_string();
        }
        if self.milestone.is_empty() {
            self.milestone = template.default_milestone().to_string();
        }
    }

    /// Like `apply_template`, but also replaces values that are still the
    /// current template's untouched prefill.
    pub fn switch_template(&mut self, template: Template) {
        if self.title == self.template.title_prefix() {
            self.title.clear();
        }
        if self.milestone == self.template.default_milestone() {
            self.milestone.clear();
        }
        self.apply_template(template);
    }
}

impl Draft for ProgressDraft {
    const RESOURCE: &'static str = "learning-progress";
    const NOUN: &'static str = "progress update";

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.text_length("title", "Title", &self.title, 5, 100)
            .text_length("description", "Description", &self.description, 10, 500)
            .min_chars("milestone", &self.milestone, 3, "Milestone must be specified")
            .range(
                "progressPercent",
                self.progress_percent,
                0,
                100,
                "Progress must be between 0 and 100",
            );
        v.finish()
    }

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            field("template", "Update template", FieldKind::Choice),
            field("title", "Title", FieldKind::Text),
            field("description", "Description", FieldKind::Multiline),
            field("milestone", "Milestone", FieldKind::Text),
            field("progressPercent", "Progress", FieldKind::Percent),
        ];
        FIELDS
    }

    fn field_text(&self, key: &str) -> String {
        match key {
            "template" => self.template.as_str().to_string(),
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "milestone" => self.milestone.clone(),
            "progressPercent" => format!("{}%", self.progress_percent),
            _ => String::new(),
        }
    }

    fn field_text_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "title" => Some(&mut self.title),
            "description" => Some(&mut self.description),
            "milestone" => Some(&mut self.milestone),
            _ => None,
        }
    }

    fn cycle_field(&mut self, key: &str, forward: bool) {
        match key {
            "template" => self.apply_template(self.template.step(forward)),
            "progressPercent" => {
                let delta = if forward {
                    Self::PERCENT_STEP
                } else {
                    -Self::PERCENT_STEP
                };
                self.progress_percent = (self.progress_percent + delta).clamp(0, 100);
            }
            _ => {}
        }
    }

    fn percent(&self) -> Option<i64> {
        Some(self.progress_percent)
    }

    fn is_milestone_completed(&self) -> bool {
        self.progress_percent == 100
    }

    fn prepare_create(&mut self) {
        self.apply_template(self.template);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanDraft {
    pub title: String,
    pub description: String,
    pub duration: String,
    pub topics: Vec<String>,
    /// Starts at zero on create; the server counts follows afterwards.
    pub followers: u64,
}

impl Draft for PlanDraft {
    const RESOURCE: &'static str = "learning-plans";
    const NOUN: &'static str = "learning plan";

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.text_length("title", "Title", &self.title, 5, 100)
            .text_length("description", "Description", &self.description, 10, 500)
            .required("duration", &self.duration, "Duration must be specified")
            .non_empty("topics", &self.topics, "At least one topic must be added");
        v.finish()
    }

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            field("title", "Title", FieldKind::Text),
            field("description", "Description", FieldKind::Multiline),
            field("duration", "Duration", FieldKind::Text),
            field("topics", "Topics", FieldKind::Tags),
        ];
        FIELDS
    }

    fn field_text(&self, key: &str) -> String {
        match key {
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "duration" => self.duration.clone(),
            "topics" => self.topics.join(", "),
            _ => String::new(),
        }
    }

    fn field_text_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "title" => Some(&mut self.title),
            "description" => Some(&mut self.description),
            "duration" => Some(&mut self.duration),
            _ => None,
        }
    }

    fn tags(&self) -> Option<&[String]> {
        Some(&self.topics)
    }

    fn tags_mut(&mut self) -> Option<&mut Vec<String>> {
        Some(&mut self.topics)
    }

    fn stats(&self) -> Option<String> {
        Some(count(self.followers, "follower"))
    }
}

/// Session identity as reported by the auth check endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub status: String,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        self.status == "Authenticated"
    }
}

/// Extended profile fields stored under `/users/{email}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
}

/// Identity data merged with the stored profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub identity: Identity,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A dismissable, user-visible outcome message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

#[derive(Debug, Clone)]
pub struct ConfigItem {
    pub key_name: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupMode {
    None,
    Dialog,
    ConfirmDelete,
}
