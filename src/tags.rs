/// Appends `raw` (trimmed) unless it is blank or already present.
/// Returns whether the list changed.
pub fn add_tag(tags: &mut Vec<String>, raw: &str) -> bool {
    let tag = raw.trim();
    if tag.is_empty() || tags.iter().any(|t| t == tag) {
        return false;
    }
    tags.push(tag.to_string());
    true
}

pub fn remove_tag(tags: &mut Vec<String>, tag: &str) -> bool {
    let before = tags.len();
    tags.retain(|t| t != tag);
    tags.len() != before
}

/// Staging text for the "add tag/topic" control of a dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInput {
    pub buffer: String,
}

impl TagInput {
    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn pop(&mut self) {
        self.buffer.pop();
    }

    /// Moves the staged text into `tags`. The buffer is only cleared when the
    /// tag was actually added, so a duplicate stays visible for correction.
    pub fn commit(&mut self, tags: &mut Vec<String>) -> bool {
        let added = add_tag(tags, &self.buffer);
        if added {
            self.buffer.clear();
        }
        added
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tag_leaves_list_unchanged() {
        let mut tags = vec!["React".to_string()];
        assert!(!add_tag(&mut tags, "React"));
        assert!(!add_tag(&mut tags, "  React "));
        assert_eq!(tags, vec!["React"]);
    }

    #[test]
    fn distinct_tags_keep_insertion_order() {
        let mut tags = Vec::new();
        add_tag(&mut tags, "Git");
        add_tag(&mut tags, " CI/CD ");
        add_tag(&mut tags, "Branching");
        assert_eq!(tags, vec!["Git", "CI/CD", "Branching"]);
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut tags = Vec::new();
        assert!(!add_tag(&mut tags, "   "));
        assert!(tags.is_empty());
    }

    #[test]
    fn commit_clears_buffer_only_on_append() {
        let mut tags = vec!["Rust".to_string()];
        let mut input = TagInput::default();
        "Rust".chars().for_each(|c| input.push(c));
        assert!(!input.commit(&mut tags));
        assert_eq!(input.buffer, "Rust");

        input.clear();
        "Tokio".chars().for_each(|c| input.push(c));
        assert!(input.commit(&mut tags));
        assert!(input.buffer.is_empty());
        assert_eq!(tags, vec!["Rust", "Tokio"]);
    }

    #[test]
    fn chips_are_removed_individually() {
        let mut tags = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(remove_tag(&mut tags, "b"));
        assert!(!remove_tag(&mut tags, "b"));
        assert_eq!(tags, vec!["a", "c"]);
    }
}
