//! Single-table household records: food plans, notes, tasks, reminders and saved recipes.

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use crate::db::{Database, now};
use crate::error::{Error, Result};
use crate::models::{
    FoodPlan, NewFoodPlan, NewRecipe, Note, Recipe, Reminder, ReminderInput, RepeatUnit, Task,
    TaskInput, format_date,
};

fn date_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_date_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

const TASK_COLUMNS: &str =
    "id, date, content, done, type, person, due_date, created_at, updated_at";
const REMINDER_COLUMNS: &str = "id, date, content, is_repeating, person, repeat_unit, repeat_interval, created_at, updated_at";
const RECIPE_COLUMNS: &str =
    "id, url, domain, title, description, image, category_id, created_at, updated_at";

impl Database {
    // --- Row mapping helpers ---

    fn food_plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodPlan> {
        Ok(FoodPlan {
            id: row.get(0)?,
            date: date_at(row, 1)?,
            breakfast: row.get(2)?,
            lunch: row.get(3)?,
            dinner: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn note_from_row(row: &rusqlite::Row) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            date: date_at(row, 1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        Ok(Task {
            id: row.get(0)?,
            date: date_at(row, 1)?,
            content: row.get(2)?,
            done: row.get(3)?,
            task_type: row.get(4)?,
            person: row.get(5)?,
            due_date: optional_date_at(row, 6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn reminder_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reminder> {
        let unit: String = row.get(5)?;
        let repeat_unit = unit
            .parse::<RepeatUnit>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
        Ok(Reminder {
            id: row.get(0)?,
            date: date_at(row, 1)?,
            content: row.get(2)?,
            is_repeating: row.get(3)?,
            person: row.get(4)?,
            repeat_unit,
            repeat_interval: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            url: row.get(1)?,
            domain: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            image: row.get(5)?,
            category_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // --- Food plans ---

    /// Insert or replace the plan for `plan.date`.
    pub fn upsert_food_plan(&self, plan: &NewFoodPlan) -> Result<()> {
        let now = now();
        self.conn.execute(
            "INSERT INTO food_plans (date, breakfast, lunch, dinner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(date) DO UPDATE SET
                breakfast = excluded.breakfast,
                lunch = excluded.lunch,
                dinner = excluded.dinner,
                updated_at = excluded.updated_at",
            params![
                format_date(plan.date),
                plan.breakfast,
                plan.lunch,
                plan.dinner,
                now,
                now
            ],
        )?;
        Ok(())
    }

    /// Plans dated within `[from, to]`, oldest first.
    pub fn food_plans_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<FoodPlan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, breakfast, lunch, dinner, created_at, updated_at
             FROM food_plans WHERE date BETWEEN ?1 AND ?2 ORDER BY date",
        )?;
        let plans = stmt
            .query_map(
                params![format_date(from), format_date(to)],
                Self::food_plan_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    // --- Notes ---

    pub fn upsert_note(&self, date: NaiveDate, content: Option<&str>) -> Result<()> {
        let now = now();
        self.conn.execute(
            "INSERT INTO notes (date, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![format_date(date), content, now, now],
        )?;
        Ok(())
    }

    /// The earliest note dated within `[from, to]`.
    pub fn note_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT id, date, content, created_at, updated_at
                 FROM notes WHERE date BETWEEN ?1 AND ?2 ORDER BY date LIMIT 1",
                params![format_date(from), format_date(to)],
                Self::note_from_row,
            )
            .optional()?;
        Ok(note)
    }

    // --- Tasks ---

    pub fn insert_task(&self, task: &TaskInput) -> Result<i64> {
        task.validate()?;
        let now = now();
        self.conn.execute(
            "INSERT INTO tasks (date, content, done, type, person, due_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                format_date(task.date),
                task.content,
                task.done,
                task.task_type,
                task.person,
                task.due_date.map(format_date),
                now,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                Self::task_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("Task", id))
    }

    pub fn update_task(&self, id: i64, task: &TaskInput) -> Result<()> {
        task.validate()?;
        let rows = self.conn.execute(
            "UPDATE tasks SET date = ?1, content = ?2, done = ?3, type = ?4, person = ?5,
                due_date = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                format_date(task.date),
                task.content,
                task.done,
                task.task_type,
                task.person,
                task.due_date.map(format_date),
                now(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("Task", id));
        }
        Ok(())
    }

    pub fn delete_task(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found("Task", id));
        }
        Ok(())
    }

    /// Tasks of `task_type`, optionally restricted to dates within `range`.
    pub fn list_tasks(
        &self,
        task_type: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Task>> {
        let tasks = if let Some((from, to)) = range {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE type = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date, id"
            ))?;
            stmt.query_map(
                params![task_type, format_date(from), format_date(to)],
                Self::task_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE type = ?1 ORDER BY date, id"
            ))?;
            stmt.query_map(params![task_type], Self::task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(tasks)
    }

    // --- Reminders ---

    pub fn list_reminders(&self) -> Result<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY date, id"
        ))?;
        let reminders = stmt
            .query_map([], Self::reminder_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    pub fn get_reminder(&self, id: i64) -> Result<Reminder> {
        self.conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                params![id],
                Self::reminder_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("Reminder", id))
    }

    pub fn insert_reminder(&self, reminder: &ReminderInput) -> Result<i64> {
        reminder.validate()?;
        let now = now();
        self.conn.execute(
            "INSERT INTO reminders (date, content, is_repeating, person, repeat_unit, repeat_interval, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                format_date(reminder.date),
                reminder.content,
                reminder.is_repeating,
                reminder.person,
                reminder.repeat_unit.as_str(),
                reminder.repeat_interval,
                now,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_reminder(&self, id: i64, reminder: &ReminderInput) -> Result<()> {
        reminder.validate()?;
        let rows = self.conn.execute(
            "UPDATE reminders SET date = ?1, content = ?2, is_repeating = ?3, person = ?4,
                repeat_unit = ?5, repeat_interval = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                format_date(reminder.date),
                reminder.content,
                reminder.is_repeating,
                reminder.person,
                reminder.repeat_unit.as_str(),
                reminder.repeat_interval,
                now(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("Reminder", id));
        }
        Ok(())
    }

    pub fn delete_reminder(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found("Reminder", id));
        }
        Ok(())
    }

    // --- Saved recipes ---

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY id"
        ))?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
                params![id],
                Self::recipe_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("Recipe", id))
    }

    /// Store a scraped recipe. A `category_id` that does not exist is dropped.
    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let category_id = match recipe.category_id {
            Some(id) => self.find_category(id)?.map(|c| c.id),
            None => None,
        };
        let now = now();
        self.conn.execute(
            "INSERT INTO recipes (url, domain, title, description, image, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                recipe.url,
                recipe.domain,
                recipe.title,
                recipe.description,
                recipe.image,
                category_id,
                now,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe(id)
    }

    pub fn delete_recipe(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found("Recipe", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRecipeCategory, WeekStart, week_bounds};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(date: NaiveDate, task_type: &str, content: &str) -> TaskInput {
        TaskInput {
            date,
            content: Some(content.to_string()),
            done: false,
            task_type: task_type.to_string(),
            person: None,
            due_date: None,
        }
    }

    fn reminder(date: NaiveDate) -> ReminderInput {
        ReminderInput {
            date,
            content: Some("Water the plants".to_string()),
            is_repeating: Some(true),
            person: Some("Sam".to_string()),
            repeat_unit: RepeatUnit::Week,
            repeat_interval: Some(1),
        }
    }

    #[test]
    fn test_food_plan_upsert_replaces_by_date() {
        let db = Database::open_in_memory().unwrap();
        let date = d(2024, 6, 12);
        db.upsert_food_plan(&NewFoodPlan {
            date,
            breakfast: Some("Oats".to_string()),
            lunch: None,
            dinner: Some("Soup".to_string()),
        })
        .unwrap();
        db.upsert_food_plan(&NewFoodPlan {
            date,
            breakfast: Some("Eggs".to_string()),
            lunch: Some("Salad".to_string()),
            dinner: None,
        })
        .unwrap();

        let plans = db.food_plans_between(date, date).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].breakfast.as_deref(), Some("Eggs"));
        assert_eq!(plans[0].lunch.as_deref(), Some("Salad"));
        assert!(plans[0].dinner.is_none());
    }

    #[test]
    fn test_food_plans_in_monday_week() {
        let db = Database::open_in_memory().unwrap();
        // Sunday 2024-06-09 belongs to the previous Monday week
        for day in [9, 10, 14, 16, 17] {
            db.upsert_food_plan(&NewFoodPlan {
                date: d(2024, 6, day),
                breakfast: None,
                lunch: None,
                dinner: Some(format!("Dinner {day}")),
            })
            .unwrap();
        }
        let (from, to) = week_bounds(d(2024, 6, 12), WeekStart::Monday);
        let dates: Vec<NaiveDate> = db
            .food_plans_between(from, to)
            .unwrap()
            .iter()
            .map(|p| p.date)
            .collect();
        assert_eq!(dates, vec![d(2024, 6, 10), d(2024, 6, 14), d(2024, 6, 16)]);
    }

    #[test]
    fn test_note_in_sunday_week() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_note(d(2024, 6, 9), Some("first")).unwrap();
        db.upsert_note(d(2024, 6, 9), Some("updated")).unwrap();
        db.upsert_note(d(2024, 6, 16), Some("next week")).unwrap();

        let (from, to) = week_bounds(d(2024, 6, 15), WeekStart::Sunday);
        let note = db.note_between(from, to).unwrap().unwrap();
        assert_eq!(note.content.as_deref(), Some("updated"));

        let (from, to) = week_bounds(d(2024, 7, 3), WeekStart::Sunday);
        assert!(db.note_between(from, to).unwrap().is_none());
    }

    #[test]
    fn test_task_crud() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_task(&task(d(2024, 6, 12), "shopping", "Milk"))
            .unwrap();
        let stored = db.get_task(id).unwrap();
        assert!(!stored.done);
        assert_eq!(stored.task_type, "shopping");

        let mut changed = task(d(2024, 6, 13), "shopping", "Oat milk");
        changed.done = true;
        changed.due_date = Some(d(2024, 6, 20));
        db.update_task(id, &changed).unwrap();
        let stored = db.get_task(id).unwrap();
        assert!(stored.done);
        assert_eq!(stored.content.as_deref(), Some("Oat milk"));
        assert_eq!(stored.due_date, Some(d(2024, 6, 20)));

        db.delete_task(id).unwrap();
        assert!(matches!(db.get_task(id), Err(Error::NotFound(_))));
        assert!(matches!(db.delete_task(id), Err(Error::NotFound(_))));
        assert!(matches!(
            db.update_task(id, &changed),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_task_requires_type() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_task(&task(d(2024, 6, 12), " ", "Milk")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_list_tasks_by_type_and_week() {
        let db = Database::open_in_memory().unwrap();
        db.insert_task(&task(d(2024, 6, 9), "food", "Sunday"))
            .unwrap();
        db.insert_task(&task(d(2024, 6, 15), "food", "Saturday"))
            .unwrap();
        db.insert_task(&task(d(2024, 6, 16), "food", "Next Sunday"))
            .unwrap();
        db.insert_task(&task(d(2024, 6, 12), "general", "Other type"))
            .unwrap();

        assert_eq!(db.list_tasks("food", None).unwrap().len(), 3);

        let week = week_bounds(d(2024, 6, 12), WeekStart::Sunday);
        let contents: Vec<String> = db
            .list_tasks("food", Some(week))
            .unwrap()
            .into_iter()
            .filter_map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["Sunday", "Saturday"]);
    }

    #[test]
    fn test_reminder_crud() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_reminder(&reminder(d(2024, 6, 1))).unwrap();
        let stored = db.get_reminder(id).unwrap();
        assert_eq!(stored.repeat_unit, RepeatUnit::Week);
        assert_eq!(stored.is_repeating, Some(true));

        let mut changed = reminder(d(2024, 6, 2));
        changed.repeat_unit = RepeatUnit::Month;
        changed.repeat_interval = Some(3);
        db.update_reminder(id, &changed).unwrap();
        let stored = db.get_reminder(id).unwrap();
        assert_eq!(stored.repeat_unit, RepeatUnit::Month);
        assert_eq!(stored.repeat_interval, Some(3));
        assert_eq!(db.list_reminders().unwrap().len(), 1);

        db.delete_reminder(id).unwrap();
        assert!(db.list_reminders().unwrap().is_empty());
        assert!(matches!(db.delete_reminder(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reminder_rejects_zero_interval() {
        let db = Database::open_in_memory().unwrap();
        let mut input = reminder(d(2024, 6, 1));
        input.repeat_interval = Some(0);
        assert!(matches!(
            db.insert_reminder(&input),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_recipe_links_existing_category_only() {
        let db = Database::open_in_memory().unwrap();
        let category = db
            .insert_category(&NewRecipeCategory {
                name: "Baking".to_string(),
                order: None,
            })
            .unwrap();
        let linked = db
            .insert_recipe(&NewRecipe {
                url: "https://example.com/bread".to_string(),
                domain: Some("example.com".to_string()),
                title: Some("Bread".to_string()),
                category_id: Some(category.id),
                ..NewRecipe::default()
            })
            .unwrap();
        assert_eq!(linked.category_id, Some(category.id));

        let unlinked = db
            .insert_recipe(&NewRecipe {
                url: "https://example.com/cake".to_string(),
                category_id: Some(404),
                ..NewRecipe::default()
            })
            .unwrap();
        assert!(unlinked.category_id.is_none());
        assert_eq!(db.list_recipes().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_recipe_and_category() {
        let db = Database::open_in_memory().unwrap();
        let category = db
            .insert_category(&NewRecipeCategory {
                name: "Baking".to_string(),
                order: None,
            })
            .unwrap();
        let recipe = db
            .insert_recipe(&NewRecipe {
                url: "https://example.com/bread".to_string(),
                category_id: Some(category.id),
                ..NewRecipe::default()
            })
            .unwrap();

        db.delete_category(category.id).unwrap();
        assert!(db.get_recipe(recipe.id).unwrap().category_id.is_none());

        db.delete_recipe(recipe.id).unwrap();
        assert!(matches!(
            db.delete_recipe(recipe.id),
            Err(Error::NotFound(_))
        ));
    }
}
