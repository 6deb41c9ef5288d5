use axum::{
    Json,
    extract::State,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, CreatedResponse, DELETED, MessageResponse, POSTED, created,
    message,
};
use crate::scrape::{domain_of, parse_recipe_url};
use haus_core::models::{
    FoodPlan, NewFoodPlan, NewRecipe, NewRecipeCategory, Note, Recipe, RecipeCategory, Reminder,
    ReminderInput, RepeatUnit, Task, TaskInput, WeekStart, parse_date, week_bounds,
};

const INVALID_URL: &str = "URL is not valid.";

#[derive(Deserialize)]
pub(super) struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct IdQuery {
    id: i64,
}

#[derive(Deserialize)]
pub(super) struct TaskQuery {
    #[serde(rename = "type")]
    task_type: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct FoodPlanRequest {
    date: String,
    breakfast: Option<String>,
    lunch: Option<String>,
    dinner: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct NoteRequest {
    date: String,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TaskRequest {
    id: Option<i64>,
    date: String,
    content: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(rename = "type")]
    task_type: Option<String>,
    person: Option<String>,
    due_date: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct RecipeRequest {
    url: String,
    category: Option<i64>,
}

#[derive(Serialize)]
pub(super) struct RecipeCreated {
    message: &'static str,
    record: Recipe,
}

#[derive(Deserialize)]
pub(super) struct CategoryRequest {
    name: Option<String>,
    order: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReminderRequest {
    id: Option<i64>,
    date: String,
    content: Option<String>,
    is_repeating: Option<bool>,
    person: Option<String>,
    repeat_unit: String,
    repeat_interval: Option<i64>,
}

fn date_or_today(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(parse_date(raw)?),
        None => Ok(Local::now().date_naive()),
    }
}

fn required_id(id: Option<i64>) -> Result<i64, ApiError> {
    id.ok_or_else(|| ApiError::BadRequest("id is required".to_string()))
}

impl TryFrom<TaskRequest> for TaskInput {
    type Error = ApiError;

    fn try_from(req: TaskRequest) -> Result<Self, ApiError> {
        Ok(Self {
            date: parse_date(&req.date)?,
            content: req.content,
            done: req.done,
            task_type: req.task_type.unwrap_or_default(),
            person: req.person,
            due_date: req.due_date.as_deref().map(parse_date).transpose()?,
        })
    }
}

impl TryFrom<ReminderRequest> for ReminderInput {
    type Error = ApiError;

    fn try_from(req: ReminderRequest) -> Result<Self, ApiError> {
        Ok(Self {
            date: parse_date(&req.date)?,
            content: req.content,
            is_repeating: req.is_repeating,
            person: req.person,
            repeat_unit: req.repeat_unit.parse::<RepeatUnit>()?,
            repeat_interval: req.repeat_interval,
        })
    }
}

// --- Food plan ---

pub(super) async fn get_food_plans(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<Vec<FoodPlan>>, ApiError> {
    let (from, to) = week_bounds(date_or_today(query.date.as_deref())?, WeekStart::Monday);
    let plans = state
        .store
        .run(move |db| db.food_plans_between(from, to))
        .await?;
    Ok(Json(plans))
}

pub(super) async fn post_food_plan(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FoodPlanRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let plan = NewFoodPlan {
        date: parse_date(&req.date)?,
        breakfast: req.breakfast,
        lunch: req.lunch,
        dinner: req.dinner,
    };
    state.store.run(move |db| db.upsert_food_plan(&plan)).await?;
    Ok(message(POSTED))
}

// --- Note ---

pub(super) async fn get_note(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<Option<Note>>, ApiError> {
    let (from, to) = week_bounds(date_or_today(query.date.as_deref())?, WeekStart::Sunday);
    let note = state.store.run(move |db| db.note_between(from, to)).await?;
    Ok(Json(note))
}

pub(super) async fn post_note(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NoteRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let date = parse_date(&req.date)?;
    state
        .store
        .run(move |db| db.upsert_note(date, req.content.as_deref()))
        .await?;
    Ok(message(POSTED))
}

// --- Task ---

pub(super) async fn get_tasks(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let task_type = query
        .task_type
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("type is required".to_string()))?;
    let range = match query.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(week_bounds(parse_date(raw)?, WeekStart::Sunday)),
        None => None,
    };
    let tasks = state
        .store
        .run(move |db| db.list_tasks(&task_type, range))
        .await?;
    Ok(Json(tasks))
}

pub(super) async fn get_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.store.run(move |db| db.get_task(id)).await?))
}

pub(super) async fn post_task(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let task = TaskInput::try_from(req)?;
    let id = state.store.run(move |db| db.insert_task(&task)).await?;
    Ok(created(id))
}

pub(super) async fn put_task(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(req.id)?;
    let task = TaskInput::try_from(req)?;
    state.store.run(move |db| db.update_task(id, &task)).await?;
    Ok(message(POSTED))
}

pub(super) async fn delete_task(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.run(move |db| db.delete_task(query.id)).await?;
    Ok(message(DELETED))
}

// --- Recipe ---

pub(super) async fn get_recipes(
    State(state): State<AppState>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    Ok(Json(state.store.run(|db| db.list_recipes()).await?))
}

pub(super) async fn post_recipe(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RecipeRequest>,
) -> Result<Json<RecipeCreated>, ApiError> {
    let url = parse_recipe_url(&req.url)
        .ok_or_else(|| ApiError::BadRequest(INVALID_URL.to_string()))?;
    if !state.scraper.url_exists(&url).await {
        return Err(ApiError::BadRequest(INVALID_URL.to_string()));
    }

    let meta = state
        .scraper
        .fetch_metadata(&url)
        .await
        .map_err(|e| ApiError::Upstream("Unexpected error adding recipe.", e))?;

    let recipe = NewRecipe {
        domain: domain_of(&url),
        url: url.to_string(),
        title: meta.title,
        description: meta.description,
        image: meta.image,
        category_id: req.category,
    };
    let record = state.store.run(move |db| db.insert_recipe(&recipe)).await?;
    Ok(Json(RecipeCreated {
        message: POSTED,
        record,
    }))
}

pub(super) async fn delete_recipe(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.run(move |db| db.delete_recipe(query.id)).await?;
    Ok(message(DELETED))
}

// --- Recipe category ---

pub(super) async fn get_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecipeCategory>>, ApiError> {
    Ok(Json(state.store.run(|db| db.list_categories()).await?))
}

pub(super) async fn post_category(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("name must not be empty".to_string()))?;
    let category = NewRecipeCategory {
        name,
        order: req.order,
    };
    let category = state
        .store
        .run(move |db| db.insert_category(&category))
        .await?;
    Ok(created(category.id))
}

pub(super) async fn delete_category(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .store
        .run(move |db| db.delete_category(query.id))
        .await?;
    Ok(message(DELETED))
}

// --- Reminder ---

pub(super) async fn get_reminders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    Ok(Json(state.store.run(|db| db.list_reminders()).await?))
}

pub(super) async fn get_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Reminder>, ApiError> {
    Ok(Json(state.store.run(move |db| db.get_reminder(id)).await?))
}

pub(super) async fn post_reminder(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReminderRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let reminder = ReminderInput::try_from(req)?;
    let id = state
        .store
        .run(move |db| db.insert_reminder(&reminder))
        .await?;
    Ok(created(id))
}

pub(super) async fn put_reminder(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReminderRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(req.id)?;
    let reminder = ReminderInput::try_from(req)?;
    state
        .store
        .run(move |db| db.update_reminder(id, &reminder))
        .await?;
    Ok(message(POSTED))
}

pub(super) async fn delete_reminder(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .store
        .run(move |db| db.delete_reminder(query.id))
        .await?;
    Ok(message(DELETED))
}
