use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Recipe ideas ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCategory {
    pub id: i64,
    pub name: Option<String>,
    pub order: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewRecipeCategory {
    pub name: String,
    pub order: Option<i64>,
}

/// Which label table a tag/ingredient record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub const ALL: [LabelKind; 2] = [LabelKind::Ingredient, LabelKind::Tag];

    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Tag => "recipe_tags",
            Self::Ingredient => "main_ingredients",
        }
    }

    pub(crate) fn join_table(self) -> &'static str {
        match self {
            Self::Tag => "recipe_idea_tags",
            Self::Ingredient => "recipe_idea_ingredients",
        }
    }

    pub(crate) fn join_column(self) -> &'static str {
        match self {
            Self::Tag => "tag_id",
            Self::Ingredient => "ingredient_id",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Ingredient => "ingredient",
        }
    }
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `RecipeTag` or `MainIngredient` record. Both share the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIdea {
    pub id: i64,
    pub name: String,
    pub body: Option<String>,
    #[serde(rename = "RecipeCategoryId")]
    pub category_id: Option<i64>,
    #[serde(rename = "RecipeCategory")]
    pub category: Option<RecipeCategory>,
    #[serde(rename = "MainIngredients")]
    pub ingredients: Vec<Label>,
    #[serde(rename = "RecipeTags")]
    pub tags: Vec<Label>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl RecipeIdea {
    #[must_use]
    pub fn labels(&self, kind: LabelKind) -> &[Label] {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }

    #[must_use]
    pub fn label_names(&self, kind: LabelKind) -> Vec<&str> {
        self.labels(kind).iter().map(|l| l.name.as_str()).collect()
    }
}

/// Attributes for creating or updating a recipe idea.
///
/// `None` for `ingredients`/`tags` leaves the association untouched on update;
/// `Some(vec![])` clears it.
#[derive(Debug, Clone, Default)]
pub struct IdeaInput {
    pub name: String,
    pub body: Option<String>,
    pub category_id: Option<i64>,
    pub ingredients: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl IdeaInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn names(&self, kind: LabelKind) -> Option<&[String]> {
        match kind {
            LabelKind::Tag => self.tags.as_deref(),
            LabelKind::Ingredient => self.ingredients.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdeaFilter {
    pub search: Option<String>,
    pub category: Option<i64>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

impl IdeaFilter {
    #[must_use]
    pub fn names(&self, kind: LabelKind) -> &[String] {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }
}

/// A tag/ingredient that may have lost its last association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OrphanCandidate {
    pub id: i64,
    pub kind: LabelKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapSummary {
    pub removed: usize,
    pub kept: usize,
    pub failed: usize,
}

// --- Household entities ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: i64,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "RecipeCategoryId")]
    pub category_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    pub url: String,
    pub domain: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPlan {
    pub id: i64,
    pub date: NaiveDate,
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodPlan {
    pub date: NaiveDate,
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub date: NaiveDate,
    pub content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub date: NaiveDate,
    pub content: Option<String>,
    pub done: bool,
    #[serde(rename = "type")]
    pub task_type: String,
    pub person: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct TaskInput {
    pub date: NaiveDate,
    pub content: Option<String>,
    pub done: bool,
    pub task_type: String,
    pub person: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TaskInput {
    pub fn validate(&self) -> Result<()> {
        if self.task_type.trim().is_empty() {
            return Err(Error::Validation("type must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Day,
    Week,
    Month,
}

impl RepeatUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::str::FromStr for RepeatUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(Error::Validation(format!(
                "Invalid repeat unit '{other}'. Use day, week or month"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: i64,
    /// Start date from which repeating reminders are calculated.
    pub date: NaiveDate,
    pub content: Option<String>,
    pub is_repeating: Option<bool>,
    pub person: Option<String>,
    pub repeat_unit: RepeatUnit,
    /// Repeat every N units.
    pub repeat_interval: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ReminderInput {
    pub date: NaiveDate,
    pub content: Option<String>,
    pub is_repeating: Option<bool>,
    pub person: Option<String>,
    pub repeat_unit: RepeatUnit,
    pub repeat_interval: Option<i64>,
}

impl ReminderInput {
    pub fn validate(&self) -> Result<()> {
        if self.repeat_interval.is_some_and(|n| n <= 0) {
            return Err(Error::Validation(
                "repeatInterval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Dates ---

/// First day of the week used when bucketing records by week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Monday,
    Sunday,
}

/// Inclusive `(first, last)` day of the week containing `date`.
#[must_use]
pub fn week_bounds(date: NaiveDate, start: WeekStart) -> (NaiveDate, NaiveDate) {
    let offset = match start {
        WeekStart::Monday => date.weekday().num_days_from_monday(),
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
    };
    let first = date - Duration::days(i64::from(offset));
    (first, first + Duration::days(6))
}

/// Parse a client-supplied date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps (the date part in UTC) and
/// naive `YYYY-MM-DDTHH:MM:SS` timestamps.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc().date());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts.date());
    }
    Err(Error::Validation(format!(
        "Invalid date '{s}'. Use YYYY-MM-DD"
    )))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_week_bounds_monday_start() {
        // 2024-06-15 is a Saturday
        let (first, last) = week_bounds(d(2024, 6, 15), WeekStart::Monday);
        assert_eq!(first, d(2024, 6, 10));
        assert_eq!(last, d(2024, 6, 16));
    }

    #[test]
    fn test_week_bounds_sunday_start() {
        let (first, last) = week_bounds(d(2024, 6, 15), WeekStart::Sunday);
        assert_eq!(first, d(2024, 6, 9));
        assert_eq!(last, d(2024, 6, 15));
    }

    #[test]
    fn test_week_bounds_on_boundary() {
        // A Sunday is the last day of a Monday week and the first of a Sunday week
        let sunday = d(2024, 6, 16);
        assert_eq!(week_bounds(sunday, WeekStart::Monday).1, sunday);
        assert_eq!(week_bounds(sunday, WeekStart::Sunday).0, sunday);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15").unwrap(), d(2024, 1, 15));
        assert_eq!(
            parse_date("2024-01-15T10:30:00.000Z").unwrap(),
            d(2024, 1, 15)
        );
        assert_eq!(parse_date("2024-01-15T10:30:00").unwrap(), d(2024, 1, 15));
        assert!(matches!(parse_date("15/01/2024"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_idea_input_validate() {
        let mut input = IdeaInput {
            name: "  ".to_string(),
            ..IdeaInput::default()
        };
        assert!(input.validate().is_err());
        input.name = "Chili".to_string();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_repeat_unit_parse() {
        assert_eq!("week".parse::<RepeatUnit>().unwrap(), RepeatUnit::Week);
        assert!("year".parse::<RepeatUnit>().is_err());
    }

    #[test]
    fn test_idea_serializes_client_field_names() {
        let idea = RecipeIdea {
            id: 1,
            name: "Chili".to_string(),
            body: None,
            category_id: Some(2),
            category: None,
            ingredients: vec![],
            tags: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_value(&idea).unwrap();
        assert_eq!(json["RecipeCategoryId"], 2);
        assert!(json["MainIngredients"].is_array());
        assert!(json["RecipeTags"].is_array());
        assert!(json.get("createdAt").is_some());
    }
}
