use anyhow::{Context, Result};
use chrono::Utc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, RemoteCollection};
use crate::cli::{ApplyFields, ProfileFields};
use crate::dialog::SubmitOutcome;
use crate::display::{detail_lines, relative_time};
use crate::models::{Draft, EntityId, ProfileView};
use crate::page::CollectionPage;
use crate::resolve::{confirm, pick};
use crate::session::{redirect_to_login, Session};
use crate::settings::{ClientConfig, Settings, KNOWN_KEYS};
use crate::tags::{add_tag, remove_tag};

/// Runs remote commands on behalf of one session.
pub struct Client {
    rt: Runtime,
    api: ApiClient,
    config: ClientConfig,
    session: Session,
}

impl Client {
    /// Builds the HTTP client and resolves the session once.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let rt = Runtime::new().context("failed to start async runtime")?;
        let api = ApiClient::new(&config).context("failed to build HTTP client")?;
        let session = rt.block_on(Session::establish(&api, &CancellationToken::new()));
        Ok(Client {
            rt,
            api,
            config,
            session,
        })
    }

    fn login_required(&self) -> bool {
        if self.session.is_authenticated() {
            return false;
        }
        self.rt.block_on(redirect_to_login(&self.config));
        true
    }

    fn load_page<D: Draft, C: RemoteCollection<D>>(&self, remote: &C) -> Option<CollectionPage<D>> {
        let mut page = CollectionPage::new();
        if self.rt.block_on(page.load(remote)) {
            Some(page)
        } else {
            if let Some(notice) = page.take_notice() {
                println!("{}", notice.message);
            }
            None
        }
    }

    pub fn list<D: Draft>(&self) -> Result<()> {
        let remote = self.api.collection::<D>();
        let Some(page) = self.load_page::<D, _>(&remote) else {
            return Ok(());
        };

        if page.store.is_empty() {
            println!("No {}s yet.", D::NOUN);
            return Ok(());
        }

        let now = Utc::now();
        println!("{} {}(s):", page.store.len(), D::NOUN);
        for record in page.store.iter() {
            let marker = if page.can_modify(record, &self.session) {
                " [yours]"
            } else {
                ""
            };
            println!();
            println!("[{}] {}{}", record.id, record.fields.title(), marker);
            for line in detail_lines(record, now).iter().skip(1) {
                println!("    {}", line);
            }
        }
        Ok(())
    }

    fn report_submit<D: Draft>(&self, page: &mut CollectionPage<D>, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Saved => {
                if let Some(notice) = page.take_notice() {
                    println!("{}", notice.message);
                }
            }
            SubmitOutcome::Invalid => {
                println!("Cannot save {}:", D::NOUN);
                for error in page.dialog.errors().iter() {
                    println!("  {}", error);
                }
            }
            SubmitOutcome::Unauthenticated => {
                if let Some(notice) = page.dialog.notice() {
                    println!("{}", notice.message);
                }
                self.rt.block_on(redirect_to_login(&self.config));
            }
            SubmitOutcome::Failed(message) => println!("{}", message),
            SubmitOutcome::Busy | SubmitOutcome::NotOpen | SubmitOutcome::Discarded => {
                log::debug!("submit ended as {:?}", outcome);
            }
        }
    }

    pub fn create<D: Draft>(&self, fields: &impl ApplyFields<D>) -> Result<()> {
        if self.login_required() {
            return Ok(());
        }
        let remote = self.api.collection::<D>();
        let mut page = CollectionPage::<D>::new();
        page.open_create();
        fields.apply(&mut page.dialog.draft);

        let outcome = self.rt.block_on(page.submit(&remote, &self.session));
        if outcome == SubmitOutcome::Saved {
            if let Some(record) = page.store.at(0) {
                println!("Created {} with id {}", D::NOUN, record.id);
            }
        }
        self.report_submit(&mut page, outcome);
        Ok(())
    }

    fn pick_id<D: Draft>(&self, page: &CollectionPage<D>, target: &str) -> Result<Option<EntityId>> {
        let record = pick(page.store.as_slice(), target).context("failed to read confirmation")?;
        Ok(record.map(|r| r.id.clone()))
    }

    pub fn edit<D: Draft>(&self, target: &str, fields: &impl ApplyFields<D>) -> Result<()> {
        if self.login_required() {
            return Ok(());
        }
        let remote = self.api.collection::<D>();
        let Some(mut page) = self.load_page::<D, _>(&remote) else {
            return Ok(());
        };
        let Some(id) = self.pick_id(&page, target)? else {
            return Ok(());
        };

        if !page.open_edit(&id, &self.session) {
            if let Some(notice) = page.take_notice() {
                println!("{}", notice.message);
            }
            return Ok(());
        }
        let before = page.dialog.draft.clone();
        fields.apply(&mut page.dialog.draft);
        if page.dialog.draft == before {
            println!("Nothing to update.");
            return Ok(());
        }

        let outcome = self.rt.block_on(page.submit(&remote, &self.session));
        self.report_submit(&mut page, outcome);
        Ok(())
    }

    pub fn delete<D: Draft>(&self, target: &str, yes: bool) -> Result<()> {
        if self.login_required() {
            return Ok(());
        }
        let remote = self.api.collection::<D>();
        let Some(mut page) = self.load_page::<D, _>(&remote) else {
            return Ok(());
        };
        let Some(id) = self.pick_id(&page, target)? else {
            return Ok(());
        };

        if let Some(record) = page.store.get(&id) {
            let prompt = format!("Delete {} '{}'?", D::NOUN, record.fields.title());
            if !yes && !confirm(&prompt).context("failed to read confirmation")? {
                println!("Operation cancelled.");
                return Ok(());
            }
        }

        self.rt.block_on(page.delete(&remote, &id, &self.session));
        if let Some(notice) = page.take_notice() {
            println!("{}", notice.message);
        }
        Ok(())
    }

    pub fn whoami(&self) -> Result<()> {
        match self.session.viewer() {
            Some(identity) => {
                println!("Name: {}", identity.name);
                println!("Email: {}", identity.email);
                if let Some(picture) = &identity.picture {
                    println!("Picture: {}", picture);
                }
            }
            None => println!("Not logged in."),
        }
        Ok(())
    }

    pub fn login(&self) -> Result<()> {
        if let Some(identity) = self.session.viewer() {
            println!("Already logged in as {} <{}>.", identity.name, identity.email);
            return Ok(());
        }
        self.rt.block_on(redirect_to_login(&self.config));
        Ok(())
    }

    fn profile_view(&self) -> Result<Option<ProfileView>> {
        let Ok(identity) = self.session.require() else {
            self.rt.block_on(redirect_to_login(&self.config));
            return Ok(None);
        };
        let profile = match self
            .rt
            .block_on(self.api.get_profile(&identity.email, &CancellationToken::new()))
        {
            Ok(profile) => profile,
            Err(e) if e.status() == Some(404) => {
                log::debug!("no stored profile for {}", identity.email);
                Default::default()
            }
            Err(e) => return Err(e).context("failed to load profile"),
        };
        Ok(Some(ProfileView {
            identity: identity.clone(),
            profile,
        }))
    }

    pub fn profile_show(&self) -> Result<()> {
        let Some(view) = self.profile_view()? else {
            return Ok(());
        };
        print_profile(&view);
        Ok(())
    }

    pub fn profile_update(&self, fields: &ProfileFields) -> Result<()> {
        let Some(view) = self.profile_view()? else {
            return Ok(());
        };
        let mut profile = view.profile.clone();
        let replace = |target: &mut Option<String>, value: &Option<String>| {
            if let Some(value) = value {
                *target = Some(value.clone()).filter(|v| !v.is_empty());
            }
        };
        replace(&mut profile.title, &fields.title);
        replace(&mut profile.location, &fields.location);
        replace(&mut profile.bio, &fields.bio);
        replace(&mut profile.github, &fields.github);
        replace(&mut profile.linkedin, &fields.linkedin);
        for skill in &fields.remove_skills {
            remove_tag(&mut profile.skills, skill);
        }
        for skill in &fields.skills {
            add_tag(&mut profile.skills, skill);
        }

        if profile == view.profile {
            println!("Nothing to update.");
            return Ok(());
        }

        let email = &view.identity.email;
        match self
            .rt
            .block_on(self.api.put_profile(email, &profile, &CancellationToken::new()))
        {
            Ok(saved) => {
                println!("Profile updated successfully!");
                print_profile(&ProfileView {
                    identity: view.identity,
                    profile: saved,
                });
            }
            Err(e) => {
                log::warn!("failed to update profile: {}", e);
                println!("Failed to update profile. Please try again.");
            }
        }
        Ok(())
    }
}

fn print_profile(view: &ProfileView) {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("{} <{}>", view.identity.name, view.identity.email);
    println!("Title: {}", optional(&view.profile.title));
    println!("Location: {}", optional(&view.profile.location));
    println!("Bio: {}", optional(&view.profile.bio));
    if view.profile.skills.is_empty() {
        println!("Skills: -");
    } else {
        println!("Skills: {}", view.profile.skills.join(", "));
    }
    println!("GitHub: {}", optional(&view.profile.github));
    println!("LinkedIn: {}", optional(&view.profile.linkedin));
}

pub fn set_config(settings: &Settings, key: &str, value: &str) -> Result<()> {
    settings.set(key, value)?;
    if !KNOWN_KEYS.iter().any(|(name, _, _)| *name == key) {
        println!("Note: '{}' is not a key skillsync reads.", key);
    }
    println!("Config '{}' set to '{}'", key, value);
    Ok(())
}

pub fn get_config(settings: &Settings, key: &str) -> Result<()> {
    match settings.get(key)? {
        Some(value) => println!("{}", value),
        None => println!("Config '{}' not found", key),
    }
    Ok(())
}

pub fn list_configs(settings: &Settings) -> Result<()> {
    let items = settings.list()?;
    if items.is_empty() {
        println!("No configuration values set.");
        return Ok(());
    }

    let now = Utc::now();
    println!("Configuration values:");
    for item in items {
        println!(
            "  {} = {} (updated {})",
            item.key_name,
            item.value,
            relative_time(&item.updated_at, now)
        );
        if let Some(description) = item.description {
            println!("      {}", description);
        }
    }
    Ok(())
}

pub fn delete_config(settings: &Settings, key: &str) -> Result<()> {
    if settings.delete(key)? {
        println!("Config '{}' deleted", key);
    } else {
        println!("Config '{}' not found", key);
    }
    Ok(())
}
