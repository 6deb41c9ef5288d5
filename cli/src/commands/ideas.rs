use anyhow::Result;
use std::process;

use haus_core::db::Database;
use haus_core::models::IdeaFilter;

use super::helpers::print_idea_table;

pub(crate) fn cmd_ideas(db: &Database, filter: &IdeaFilter, json: bool) -> Result<()> {
    let ideas = db.list_ideas(filter)?;

    if ideas.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipe ideas found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ideas)?);
    } else {
        print_idea_table(&ideas);
    }

    Ok(())
}
