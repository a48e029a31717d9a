use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::models::{Draft, PlanDraft, PostDraft, ProgressDraft, Template, Visibility};
use crate::tags::{add_tag, remove_tag};

#[derive(Parser)]
#[command(author, version, about = "Terminal client for SkillSync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Share and manage skill posts
    Posts {
        #[command(subcommand)]
        action: ResourceAction<PostFields>,
    },
    /// Track learning progress updates
    Progress {
        #[command(subcommand)]
        action: ResourceAction<ProgressFields>,
    },
    /// Manage learning plans
    Plans {
        #[command(subcommand)]
        action: ResourceAction<PlanFields>,
    },
    /// Show who the stored session belongs to
    Whoami,
    /// Open the login page in a browser
    Login,
    /// Show or update your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Set a configuration value
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Get a configuration value
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// List all configuration values
    ConfigList,
    /// Delete a configuration value
    ConfigDelete {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Launch TUI interface
    Tui,
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ResourceAction<F: Args> {
    /// List all entries
    List,
    /// Create a new entry
    #[command(visible_alias = "add")]
    Create {
        #[command(flatten)]
        fields: F,
    },
    /// Edit one of your entries, by id or title
    Edit {
        #[arg(value_name = "TARGET")]
        target: String,
        #[command(flatten)]
        fields: F,
    },
    /// Delete one of your entries, by id or title
    Delete {
        #[arg(value_name = "TARGET")]
        target: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Command-line values that overwrite a draft's fields.
pub trait ApplyFields<D: Draft> {
    fn apply(&self, draft: &mut D);
}

fn set(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn edit_tags(tags: &mut Vec<String>, add: &[String], remove: &[String]) {
    for tag in remove {
        remove_tag(tags, tag);
    }
    for tag in add {
        add_tag(tags, tag);
    }
}

#[derive(Args, Debug, Default)]
pub struct PostFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
    /// Add a tag (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Remove a tag (repeatable)
    #[arg(long = "remove-tag", value_name = "TAG")]
    pub remove_tags: Vec<String>,
    #[arg(long, value_enum)]
    pub visibility: Option<Visibility>,
    /// Whether other members may comment
    #[arg(long, value_name = "BOOL")]
    pub comments: Option<bool>,
}

impl ApplyFields<PostDraft> for PostFields {
    fn apply(&self, draft: &mut PostDraft) {
        set(&mut draft.title, &self.title);
        set(&mut draft.description, &self.description);
        set(&mut draft.category, &self.category);
        edit_tags(&mut draft.tags, &self.tags, &self.remove_tags);
        if let Some(visibility) = self.visibility {
            draft.visibility = visibility;
        }
        if let Some(comments) = self.comments {
            draft.allow_comments = comments;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ProgressFields {
    /// Prefills an empty title and milestone
    #[arg(long, value_enum)]
    pub template: Option<Template>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub milestone: Option<String>,
    /// Completion percentage, 0 to 100
    #[arg(short, long, value_name = "PERCENT", allow_negative_numbers = true)]
    pub percent: Option<i64>,
}

impl ApplyFields<ProgressDraft> for ProgressFields {
    fn apply(&self, draft: &mut ProgressDraft) {
        set(&mut draft.title, &self.title);
        set(&mut draft.description, &self.description);
        set(&mut draft.milestone, &self.milestone);
        if let Some(template) = self.template {
            draft.switch_template(template);
        }
        if let Some(percent) = self.percent {
            draft.progress_percent = percent;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PlanFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Free text, e.g. "3 weeks"
    #[arg(long)]
    pub duration: Option<String>,
    /// Add a topic (repeatable)
    #[arg(short, long = "topic", value_name = "TOPIC")]
    pub topics: Vec<String>,
    /// Remove a topic (repeatable)
    #[arg(long = "remove-topic", value_name = "TOPIC")]
    pub remove_topics: Vec<String>,
}

impl ApplyFields<PlanDraft> for PlanFields {
    fn apply(&self, draft: &mut PlanDraft) {
        set(&mut draft.title, &self.title);
        set(&mut draft.description, &self.description);
        set(&mut draft.duration, &self.duration);
        edit_tags(&mut draft.topics, &self.topics, &self.remove_topics);
    }
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show your identity and profile
    Show,
    /// Update extended profile fields
    Update(ProfileFields),
}

#[derive(Args, Debug, Default)]
pub struct ProfileFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    #[arg(long)]
    pub github: Option<String>,
    #[arg(long)]
    pub linkedin: Option<String>,
    /// Add a skill (repeatable)
    #[arg(short, long = "skill", value_name = "SKILL")]
    pub skills: Vec<String>,
    /// Remove a skill (repeatable)
    #[arg(long = "remove-skill", value_name = "SKILL")]
    pub remove_skills: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::CrudDialog;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_is_an_alias_for_create() {
        let cli = Cli::try_parse_from([
            "skillsync", "plans", "add", "--title", "Advanced Git", "-t", "Git", "-t", "GitHub",
        ])
        .unwrap();
        let Some(Commands::Plans {
            action: ResourceAction::Create { fields },
        }) = cli.command
        else {
            panic!("expected plans create");
        };
        let mut draft = PlanDraft::default();
        fields.apply(&mut draft);
        assert_eq!(draft.title, "Advanced Git");
        assert_eq!(draft.topics, vec!["Git", "GitHub"]);
    }

    #[test]
    fn edit_keeps_unspecified_fields() {
        let cli = Cli::try_parse_from([
            "skillsync", "posts", "edit", "42", "--visibility", "private", "--comments", "false",
            "--remove-tag", "CSS", "--tag", "Grid",
        ])
        .unwrap();
        let Some(Commands::Posts {
            action: ResourceAction::Edit { target, fields },
        }) = cli.command
        else {
            panic!("expected posts edit");
        };
        assert_eq!(target, "42");

        let mut draft = PostDraft {
            title: "Tailwind layouts".into(),
            tags: vec!["CSS".into(), "Tailwind".into()],
            ..Default::default()
        };
        fields.apply(&mut draft);
        assert_eq!(draft.title, "Tailwind layouts");
        assert_eq!(draft.tags, vec!["Tailwind", "Grid"]);
        assert_eq!(draft.visibility, Visibility::Private);
        assert!(!draft.allow_comments);
    }

    #[test]
    fn unknown_choices_are_rejected() {
        assert!(Cli::try_parse_from(["skillsync", "progress", "add", "--template", "book"]).is_err());
        assert!(Cli::try_parse_from(["skillsync", "posts", "add", "--visibility", "team"]).is_err());
    }

    #[test]
    fn template_prefills_before_percent() {
        let cli = Cli::try_parse_from([
            "skillsync", "progress", "add", "--template", "skill", "-p", "100",
        ])
        .unwrap();
        let Some(Commands::Progress {
            action: ResourceAction::Create { fields },
        }) = cli.command
        else {
            panic!("expected progress create");
        };
        let mut dialog = CrudDialog::<ProgressDraft>::new();
        dialog.open_create();
        fields.apply(&mut dialog.draft);
        assert_eq!(dialog.draft.title, "Skill Development: ");
        assert_eq!(dialog.draft.milestone, "Skill Mastery");
        assert!(dialog.draft.is_milestone_completed());
    }
}
