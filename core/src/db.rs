use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};

use crate::error::{Error, Result};
use crate::models::{
    IdeaFilter, IdeaInput, Label, LabelKind, NewRecipeCategory, RecipeCategory, RecipeIdea,
};

pub struct Database {
    pub(crate) conn: Connection,
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// `?, ?, ?` for `n` positional parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    fn configure(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipe_categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT,
                    sort_order INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT,
                    domain TEXT,
                    title TEXT,
                    description TEXT,
                    image TEXT,
                    category_id INTEGER REFERENCES recipe_categories(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ideas (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    body TEXT,
                    category_id INTEGER REFERENCES recipe_categories(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS main_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_idea_ingredients (
                    idea_id INTEGER NOT NULL REFERENCES recipe_ideas(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES main_ingredients(id) ON DELETE CASCADE,
                    PRIMARY KEY (idea_id, ingredient_id)
                );

                CREATE TABLE IF NOT EXISTS recipe_idea_tags (
                    idea_id INTEGER NOT NULL REFERENCES recipe_ideas(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES recipe_tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (idea_id, tag_id)
                );

                CREATE INDEX IF NOT EXISTS idx_recipe_ideas_category ON recipe_ideas(category_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_idea_ingredients_ingredient ON recipe_idea_ingredients(ingredient_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_idea_tags_tag ON recipe_idea_tags(tag_id);

                CREATE TABLE IF NOT EXISTS food_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL UNIQUE,
                    breakfast TEXT,
                    lunch TEXT,
                    dinner TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS notes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL UNIQUE,
                    content TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    content TEXT,
                    done INTEGER NOT NULL DEFAULT 0,
                    type TEXT NOT NULL,
                    person TEXT,
                    due_date TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_type_date ON tasks(type, date);

                CREATE TABLE IF NOT EXISTS reminders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    content TEXT,
                    is_repeating INTEGER,
                    person TEXT,
                    repeat_unit TEXT NOT NULL CHECK (repeat_unit IN ('day', 'week', 'month')),
                    repeat_interval INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Run `f` inside a transaction on this connection.
    ///
    /// Every `Database` call made from `f` joins the transaction. An `Err`
    /// from `f` rolls everything back.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // --- Row mapping helpers ---

    fn category_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeCategory> {
        Ok(RecipeCategory {
            id: row.get(0)?,
            name: row.get(1)?,
            order: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    pub(crate) fn label_from_row(row: &rusqlite::Row) -> rusqlite::Result<Label> {
        Ok(Label {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    // Associations are attached separately, see `attach_associations`.
    fn idea_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeIdea> {
        Ok(RecipeIdea {
            id: row.get(0)?,
            name: row.get(1)?,
            body: row.get(2)?,
            category_id: row.get(3)?,
            category: None,
            ingredients: Vec::new(),
            tags: Vec::new(),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // --- Recipe categories ---

    pub fn list_categories(&self) -> Result<Vec<RecipeCategory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sort_order, created_at, updated_at FROM recipe_categories ORDER BY id",
        )?;
        let categories = stmt
            .query_map([], Self::category_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn find_category(&self, id: i64) -> Result<Option<RecipeCategory>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, sort_order, created_at, updated_at FROM recipe_categories WHERE id = ?1",
                params![id],
                Self::category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    pub fn get_category(&self, id: i64) -> Result<RecipeCategory> {
        self.find_category(id)?
            .ok_or_else(|| Error::not_found("Recipe category", id))
    }

    pub fn insert_category(&self, category: &NewRecipeCategory) -> Result<RecipeCategory> {
        let now = now();
        self.conn.execute(
            "INSERT INTO recipe_categories (name, sort_order, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![category.name, category.order, now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_category(id)
    }

    /// Delete a category. Recipes and ideas in it keep existing with no category.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM recipe_categories WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found("Recipe category", id));
        }
        Ok(())
    }

    // --- Recipe ideas ---

    fn name_taken(err: Error, name: &str) -> Error {
        match err {
            Error::ConstraintViolation(_) => {
                Error::ConstraintViolation(format!("A recipe idea named '{name}' already exists"))
            }
            other => other,
        }
    }

    /// Insert the idea's scalar attributes. Associations are set separately.
    pub fn insert_idea(&self, idea: &IdeaInput) -> Result<i64> {
        let now = now();
        self.conn
            .execute(
                "INSERT INTO recipe_ideas (name, body, category_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![idea.name, idea.body, idea.category_id, now, now],
            )
            .map_err(|e| Self::name_taken(e.into(), &idea.name))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_idea_attributes(&self, id: i64, idea: &IdeaInput) -> Result<()> {
        let now = now();
        let rows = self
            .conn
            .execute(
                "UPDATE recipe_ideas SET name = ?1, body = ?2, category_id = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![idea.name, idea.body, idea.category_id, now, id],
            )
            .map_err(|e| Self::name_taken(e.into(), &idea.name))?;
        if rows == 0 {
            return Err(Error::not_found("Recipe idea", id));
        }
        Ok(())
    }

    /// The idea row without associations.
    pub fn find_idea(&self, id: i64) -> Result<Option<RecipeIdea>> {
        let idea = self
            .conn
            .query_row(
                "SELECT id, name, body, category_id, created_at, updated_at
                 FROM recipe_ideas WHERE id = ?1",
                params![id],
                Self::idea_from_row,
            )
            .optional()?;
        Ok(idea)
    }

    /// The idea with its category, ingredients and tags loaded.
    pub fn get_idea(&self, id: i64) -> Result<RecipeIdea> {
        let idea = self
            .find_idea(id)?
            .ok_or_else(|| Error::not_found("Recipe idea", id))?;
        self.attach_associations(vec![idea])?
            .pop()
            .ok_or_else(|| Error::not_found("Recipe idea", id))
    }

    /// Delete an idea. Join rows go with it; its tags and ingredients stay.
    pub fn delete_idea(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM recipe_ideas WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found("Recipe idea", id));
        }
        Ok(())
    }

    /// List ideas matching `filter`, associations loaded.
    ///
    /// Tag and ingredient filters are resolved to an id set first (any of the
    /// named labels matches; both filters must match when both are given).
    /// The full records are then loaded for that id set only, so the label
    /// filters never trim the association lists that come back.
    pub fn list_ideas(&self, filter: &IdeaFilter) -> Result<Vec<RecipeIdea>> {
        let mut restrict: Option<HashSet<i64>> = None;
        for kind in LabelKind::ALL {
            let names = filter.names(kind);
            if names.is_empty() {
                continue;
            }
            let ids = self.idea_ids_with_labels(kind, names)?;
            restrict = Some(match restrict {
                Some(prev) => prev.intersection(&ids).copied().collect(),
                None => ids,
            });
        }
        if restrict.as_ref().is_some_and(HashSet::is_empty) {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT id, name, body, category_id, created_at, updated_at FROM recipe_ideas WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let escaped = search
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            values.push(Value::Text(format!("%{escaped}%")));
        }
        if let Some(category) = filter.category {
            sql.push_str(" AND category_id = ?");
            values.push(Value::Integer(category));
        }
        if let Some(ids) = &restrict {
            let mut ids: Vec<i64> = ids.iter().copied().collect();
            ids.sort_unstable();
            sql.push_str(&format!(" AND id IN ({})", placeholders(ids.len())));
            values.extend(ids.into_iter().map(Value::Integer));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let ideas = stmt
            .query_map(params_from_iter(values.iter()), Self::idea_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.attach_associations(ideas)
    }

    /// Ids of ideas associated with at least one label of `kind` named in `names`.
    pub fn idea_ids_with_labels(&self, kind: LabelKind, names: &[String]) -> Result<HashSet<i64>> {
        if names.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT DISTINCT j.idea_id FROM {join} j
             JOIN {table} l ON l.id = j.{column}
             WHERE l.name IN ({marks})",
            join = kind.join_table(),
            table = kind.table(),
            column = kind.join_column(),
            marks = placeholders(names.len()),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(names.iter()), |row| row.get(0))?
            .collect::<std::result::Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    /// Load categories, ingredients and tags for a batch of ideas, one query per relation.
    fn attach_associations(&self, mut ideas: Vec<RecipeIdea>) -> Result<Vec<RecipeIdea>> {
        if ideas.is_empty() {
            return Ok(ideas);
        }

        let category_ids: Vec<i64> = ideas
            .iter()
            .filter_map(|i| i.category_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let mut categories: HashMap<i64, RecipeCategory> = HashMap::new();
        if !category_ids.is_empty() {
            let sql = format!(
                "SELECT id, name, sort_order, created_at, updated_at FROM recipe_categories WHERE id IN ({})",
                placeholders(category_ids.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            for category in stmt.query_map(params_from_iter(category_ids.iter()), Self::category_from_row)? {
                let category = category?;
                categories.insert(category.id, category);
            }
        }

        let idea_ids: Vec<i64> = ideas.iter().map(|i| i.id).collect();
        let mut labels: HashMap<(LabelKind, i64), Vec<Label>> = HashMap::new();
        for kind in LabelKind::ALL {
            let sql = format!(
                "SELECT j.idea_id, l.id, l.name, l.created_at, l.updated_at
                 FROM {join} j JOIN {table} l ON l.id = j.{column}
                 WHERE j.idea_id IN ({marks})
                 ORDER BY l.name",
                join = kind.join_table(),
                table = kind.table(),
                column = kind.join_column(),
                marks = placeholders(idea_ids.len()),
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(idea_ids.iter()), |row| {
                let idea_id: i64 = row.get(0)?;
                Ok((
                    idea_id,
                    Label {
                        id: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    },
                ))
            })?;
            for row in rows {
                let (idea_id, label) = row?;
                labels.entry((kind, idea_id)).or_default().push(label);
            }
        }

        for idea in &mut ideas {
            idea.category = idea.category_id.and_then(|c| categories.get(&c).cloned());
            idea.ingredients = labels
                .remove(&(LabelKind::Ingredient, idea.id))
                .unwrap_or_default();
            idea.tags = labels
                .remove(&(LabelKind::Tag, idea.id))
                .unwrap_or_default();
        }
        Ok(ideas)
    }

    // --- Idea associations ---

    pub fn idea_label_ids(&self, kind: LabelKind, idea_id: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT {column} FROM {join} WHERE idea_id = ?1 ORDER BY {column}",
            column = kind.join_column(),
            join = kind.join_table(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![idea_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn idea_labels(&self, kind: LabelKind, idea_id: i64) -> Result<Vec<Label>> {
        let sql = format!(
            "SELECT l.id, l.name, l.created_at, l.updated_at
             FROM {table} l JOIN {join} j ON l.id = j.{column}
             WHERE j.idea_id = ?1
             ORDER BY l.name",
            table = kind.table(),
            join = kind.join_table(),
            column = kind.join_column(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let labels = stmt
            .query_map(params![idea_id], Self::label_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    pub fn idea_ingredients(&self, idea_id: i64) -> Result<Vec<Label>> {
        self.idea_labels(LabelKind::Ingredient, idea_id)
    }

    pub fn idea_tags(&self, idea_id: i64) -> Result<Vec<Label>> {
        self.idea_labels(LabelKind::Tag, idea_id)
    }

    /// Replace the idea's association set of `kind` with exactly `label_ids`.
    pub fn set_idea_labels(&self, kind: LabelKind, idea_id: i64, label_ids: &[i64]) -> Result<()> {
        let join = kind.join_table();
        let column = kind.join_column();
        self.conn.execute(
            &format!("DELETE FROM {join} WHERE idea_id = ?1"),
            params![idea_id],
        )?;
        let mut stmt = self.conn.prepare(&format!(
            "INSERT OR IGNORE INTO {join} (idea_id, {column}) VALUES (?1, ?2)"
        ))?;
        for label_id in label_ids {
            stmt.execute(params![idea_id, label_id])?;
        }
        Ok(())
    }

    pub fn set_idea_ingredients(&self, idea_id: i64, ingredient_ids: &[i64]) -> Result<()> {
        self.set_idea_labels(LabelKind::Ingredient, idea_id, ingredient_ids)
    }

    pub fn set_idea_tags(&self, idea_id: i64, tag_ids: &[i64]) -> Result<()> {
        self.set_idea_labels(LabelKind::Tag, idea_id, tag_ids)
    }

    // --- Tags / ingredients ---

    pub fn list_labels(&self, kind: LabelKind) -> Result<Vec<Label>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, created_at, updated_at FROM {} ORDER BY name",
            kind.table()
        ))?;
        let labels = stmt
            .query_map([], Self::label_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    pub fn find_label(&self, kind: LabelKind, id: i64) -> Result<Option<Label>> {
        let label = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name, created_at, updated_at FROM {} WHERE id = ?1",
                    kind.table()
                ),
                params![id],
                Self::label_from_row,
            )
            .optional()?;
        Ok(label)
    }

    pub fn find_label_by_name(&self, kind: LabelKind, name: &str) -> Result<Option<Label>> {
        let label = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name, created_at, updated_at FROM {} WHERE name = ?1",
                    kind.table()
                ),
                params![name],
                Self::label_from_row,
            )
            .optional()?;
        Ok(label)
    }

    /// Number of ideas currently associated with the label.
    pub fn count_ideas_for(&self, kind: LabelKind, label_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                kind.join_table(),
                kind.join_column()
            ),
            params![label_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_label(&self, kind: LabelKind, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        Ok(rows > 0)
    }
}
