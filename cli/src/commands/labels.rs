use anyhow::Result;
use serde::Serialize;

use haus_core::db::Database;
use haus_core::models::{Label, LabelKind, ReapSummary};

use super::helpers::print_label_table;

#[derive(Serialize)]
struct LabelUsage<'a> {
    #[serde(flatten)]
    label: &'a Label,
    ideas: i64,
}

pub(crate) fn cmd_labels(db: &Database, kind: LabelKind, json: bool) -> Result<()> {
    let labels = db.list_labels(kind)?;
    let usage = labels
        .iter()
        .map(|l| db.count_ideas_for(kind, l.id))
        .collect::<Result<Vec<i64>, _>>()?;

    if json {
        let rows: Vec<LabelUsage> = labels
            .iter()
            .zip(&usage)
            .map(|(label, &ideas)| LabelUsage { label, ideas })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if labels.is_empty() {
        eprintln!("No {kind}s yet");
    } else {
        print_label_table(&labels, &usage);
    }

    Ok(())
}

/// Delete every tag and ingredient that no idea references.
pub(crate) fn cmd_reap(db: &Database, json: bool) -> Result<()> {
    let summary: ReapSummary = db.reap_all_orphans()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let ReapSummary {
            removed,
            kept,
            failed,
        } = summary;
        println!("Removed {removed} orphaned labels ({kept} kept, {failed} failed)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use haus_core::models::IdeaInput;

    #[test]
    fn test_cmd_reap_removes_orphans() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_idea(&IdeaInput {
                name: "Chili".to_string(),
                ..IdeaInput::default()
            })
            .unwrap();
        let spicy = db.find_or_create_label(LabelKind::Tag, "Spicy").unwrap();
        db.find_or_create_label(LabelKind::Tag, "Unused").unwrap();
        db.set_idea_tags(id, &[spicy.id]).unwrap();

        cmd_reap(&db, true).unwrap();

        let tags = db.list_labels(LabelKind::Tag).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Spicy");
    }

    #[test]
    fn test_cmd_labels_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(cmd_labels(&db, LabelKind::Ingredient, false).is_ok());
    }
}
