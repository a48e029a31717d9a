use crate::models::{Author, Identity, Record};

/// Whether `viewer` may edit or delete content written by `author`.
///
/// Records that carry the author's email are matched on it; display names
/// are only compared for records created without one. An unknown viewer
/// never owns anything.
pub fn is_author(author: &Author, viewer: Option<&Identity>) -> bool {
    let Some(viewer) = viewer else {
        return false;
    };
    match author.email.as_deref().filter(|e| !e.is_empty()) {
        Some(email) => !viewer.email.is_empty() && email.eq_ignore_ascii_case(&viewer.email),
        None => !viewer.name.is_empty() && author.name == viewer.name,
    }
}

pub fn is_owner<D>(record: &Record<D>, viewer: Option<&Identity>) -> bool {
    is_author(&record.author, viewer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, PostDraft};

    fn record(name: &str, email: Option<&str>) -> Record<PostDraft> {
        Record {
            id: EntityId::new("1"),
            author: Author {
                name: name.into(),
                avatar: String::new(),
                email: email.map(Into::into),
            },
            created_at: String::new(),
            fields: PostDraft::default(),
        }
    }

    fn viewer(name: &str, email: &str) -> Identity {
        Identity {
            status: "Authenticated".into(),
            name: name.into(),
            email: email.into(),
            picture: None,
        }
    }

    #[test]
    fn unknown_viewer_is_never_owner() {
        assert!(!is_owner(&record("Alex Johnson", None), None));
        assert!(!is_owner(&record("Alex Johnson", Some("alex@example.com")), None));
    }

    #[test]
    fn legacy_records_match_on_name() {
        let post = record("Alex Johnson", None);
        let author_name = post.author.name.clone();
        assert!(is_owner(&post, Some(&viewer(&author_name, "alex@example.com"))));
        assert!(!is_owner(&post, Some(&viewer("Sam Taylor", "sam@example.com"))));
    }

    #[test]
    fn email_wins_over_matching_display_names() {
        let post = record("Alex Johnson", Some("alex@example.com"));
        assert!(is_owner(&post, Some(&viewer("Alex J.", "ALEX@example.com"))));
        assert!(!is_owner(&post, Some(&viewer("Alex Johnson", "other@example.com"))));
    }

    #[test]
    fn blank_names_do_not_match() {
        let post = record("", None);
        assert!(!is_owner(&post, Some(&viewer("", ""))));
    }
}
