use std::io::{self, Write};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::models::{Draft, Record};

/// How a command-line target maps onto the listed records.
#[derive(Debug, PartialEq)]
pub enum Resolution<'a, D> {
    Exact(&'a Record<D>),
    Suggested { record: &'a Record<D>, score: i64 },
    NotFound,
}

/// Looks `target` up by id, then by exact title, then by fuzzy title match.
pub fn resolve<'a, D: Draft>(records: &'a [Record<D>], target: &str) -> Resolution<'a, D> {
    let target = target.trim();
    if target.is_empty() {
        return Resolution::NotFound;
    }

    if let Some(record) = records.iter().find(|r| r.id.as_str() == target) {
        return Resolution::Exact(record);
    }
    if let Some(record) = records
        .iter()
        .find(|r| r.fields.title().trim().eq_ignore_ascii_case(target))
    {
        return Resolution::Exact(record);
    }

    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &Record<D>)> = None;
    for record in records {
        if let Some(score) = matcher.fuzzy_match(record.fields.title(), target) {
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, record));
            }
        }
    }

    match best {
        Some((score, record)) => Resolution::Suggested { record, score },
        None => Resolution::NotFound,
    }
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer == "y" || answer == "yes"
}

/// Asks a y/n question on stdin.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} (y/n): ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(is_yes(&input))
}

/// Resolves `target`, asking before accepting a fuzzy suggestion.
/// Prints why nothing was picked and returns `None` in that case.
pub fn pick<'a, D: Draft>(records: &'a [Record<D>], target: &str) -> io::Result<Option<&'a Record<D>>> {
    match resolve(records, target) {
        Resolution::Exact(record) => Ok(Some(record)),
        Resolution::Suggested { record, score } => {
            log::debug!("fuzzy match '{}' -> {} (score {})", target, record.id, score);
            let prompt = format!("'{}' not found. Did you mean '{}'?", target, record.fields.title());
            if confirm(&prompt)? {
                Ok(Some(record))
            } else {
                println!("Operation cancelled.");
                Ok(None)
            }
        }
        Resolution::NotFound => {
            println!("No {} matching '{}'.", D::NOUN, target);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, PlanDraft};
    use crate::testing::{author, CREATED_AT};

    fn plan(id: &str, title: &str) -> Record<PlanDraft> {
        Record {
            id: EntityId::new(id),
            author: author(),
            created_at: CREATED_AT.into(),
            fields: PlanDraft {
                title: title.into(),
                ..Default::default()
            },
        }
    }

    fn plans() -> Vec<Record<PlanDraft>> {
        vec![
            plan("101", "Full Stack React & Spring Boot"),
            plan("102", "Advanced Git & GitHub Workflow"),
            plan("103", "UI/UX Design Fundamentals"),
        ]
    }

    #[test]
    fn id_and_title_are_exact() {
        let plans = plans();
        assert_eq!(resolve(&plans, "102"), Resolution::Exact(&plans[1]));
        assert_eq!(
            resolve(&plans, "ui/ux design fundamentals"),
            Resolution::Exact(&plans[2])
        );
    }

    #[test]
    fn fragments_are_suggested() {
        let plans = plans();
        match resolve(&plans, "git workflow") {
            Resolution::Suggested { record, .. } => assert_eq!(record.id.as_str(), "102"),
            other => panic!("expected a suggestion, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_targets_are_not_found() {
        let plans = plans();
        assert_eq!(resolve(&plans, "kubernetes"), Resolution::NotFound);
        assert_eq!(resolve(&plans, "   "), Resolution::NotFound);
        assert_eq!(resolve::<PlanDraft>(&[], "101"), Resolution::NotFound);
    }

    #[test]
    fn only_yes_answers_confirm() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }
}
