use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use haus_core::models::{Label, LabelKind, RecipeIdea};

pub(crate) fn print_idea_table(ideas: &[RecipeIdea]) {
    #[derive(Tabled)]
    struct IdeaRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Ingredients")]
        ingredients: String,
        #[tabled(rename = "Tags")]
        tags: String,
    }

    let rows: Vec<IdeaRow> = ideas
        .iter()
        .map(|idea| IdeaRow {
            id: idea.id,
            name: truncate(&idea.name, 35),
            category: idea
                .category
                .as_ref()
                .and_then(|c| c.name.as_deref())
                .map(|n| truncate(n, 20))
                .unwrap_or_else(|| "-".to_string()),
            ingredients: truncate(&join_names(idea.labels(LabelKind::Ingredient)), 40),
            tags: truncate(&join_names(idea.labels(LabelKind::Tag)), 30),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_label_table(labels: &[Label], usage: &[i64]) {
    #[derive(Tabled)]
    struct LabelRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Ideas")]
        ideas: i64,
    }

    let rows: Vec<LabelRow> = labels
        .iter()
        .zip(usage)
        .map(|(label, &ideas)| LabelRow {
            id: label.id,
            name: truncate(&label.name, 35),
            ideas,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn join_names(labels: &[Label]) -> String {
    if labels.is_empty() {
        return "-".to_string();
    }
    labels
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str) -> Label {
        Label {
            id: 1,
            name: name.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_join_names() {
        assert_eq!(join_names(&[]), "-");
        assert_eq!(join_names(&[label("Beans"), label("Rice")]), "Beans, Rice");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Jalapeño", 10), "Jalapeño");
    }
}
