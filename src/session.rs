use std::process::Command;

use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::AuthError;
use crate::models::{Author, Identity};
use crate::settings::ClientConfig;

/// Who is using the client. Resolved once at start and then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Session { identity: None }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Session {
            identity: Some(identity),
        }
    }

    /// Runs the identity check. Transport failures are logged and treated
    /// like a missing session so listing still works.
    pub async fn establish(api: &ApiClient, cancel: &CancellationToken) -> Self {
        match api.auth_check(cancel).await {
            Ok(identity) => {
                log::debug!("session established for {}", identity.email);
                Session::authenticated(identity)
            }
            Err(AuthError::Unauthenticated) => Session::anonymous(),
            Err(e) => {
                log::warn!("{}", e);
                Session::anonymous()
            }
        }
    }

    pub fn viewer(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Author snapshot for newly created content.
    pub fn author(&self) -> Option<Author> {
        self.identity.as_ref().map(Author::from_identity)
    }

    pub fn require(&self) -> Result<&Identity, AuthError> {
        self.identity.as_ref().ok_or(AuthError::Unauthenticated)
    }
}

fn opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    }
}

/// Hands `url` to the platform opener.
pub fn open_login_page(url: &str) -> bool {
    match Command::new(opener()).arg(url).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            log::warn!("{} exited with status: {:?}", opener(), status);
            false
        }
        Err(e) => {
            log::warn!("failed to launch {}: {}", opener(), e);
            false
        }
    }
}

/// Shows the "please log in" state, waits briefly, then opens the login page.
pub async fn redirect_to_login(config: &ClientConfig) {
    println!("Please log in to continue.");
    println!("Redirecting to the login page...");
    tokio::time::sleep(config.login_delay).await;

    let url = config.login_url.as_str();
    if !open_login_page(url) {
        println!("Open {} in your browser to log in.", url);
    }
    println!(
        "After logging in, store the session with: skillsync set session_cookie <VALUE>"
    );
}
