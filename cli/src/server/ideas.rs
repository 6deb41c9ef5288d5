use std::collections::HashSet;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;

use super::{ApiError, ApiJson, ApiPath, ApiQuery, AppState, DELETED, MessageResponse, message};
use haus_core::models::{IdeaFilter, IdeaInput, Label, RecipeIdea};

#[derive(Deserialize)]
pub(super) struct IdeaQuery {
    search: Option<String>,
    category: Option<String>,
    tags: Option<String>,
    ingredients: Option<String>,
}

/// A tag or ingredient reference: `{"name": "Beans"}` or just `"Beans"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameRef {
    Plain(String),
    Object { name: String },
}

impl NameRef {
    fn into_name(self) -> String {
        match self {
            Self::Plain(name) | Self::Object { name } => name,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct IdeaRequest {
    name: Option<String>,
    body: Option<String>,
    #[serde(rename = "RecipeCategoryId", alias = "categoryId")]
    category_id: Option<i64>,
    #[serde(rename = "MainIngredients", alias = "ingredients")]
    ingredients: Option<Vec<NameRef>>,
    #[serde(rename = "RecipeTags", alias = "tags")]
    tags: Option<Vec<NameRef>>,
}

/// Trim, drop blanks and collapse duplicates, keeping first-seen order.
fn clean_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| clean_names(s.split(',').map(str::to_string)))
        .unwrap_or_default()
}

impl From<IdeaRequest> for IdeaInput {
    fn from(req: IdeaRequest) -> Self {
        let names = |refs: Option<Vec<NameRef>>| {
            refs.map(|refs| clean_names(refs.into_iter().map(NameRef::into_name)))
        };
        Self {
            name: req.name.unwrap_or_default(),
            body: req.body,
            category_id: req.category_id,
            ingredients: names(req.ingredients),
            tags: names(req.tags),
        }
    }
}

impl TryFrom<IdeaQuery> for IdeaFilter {
    type Error = ApiError;

    fn try_from(query: IdeaQuery) -> Result<Self, ApiError> {
        let category = match query.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("Invalid category '{raw}'. Expected a numeric id"))
            })?),
        };
        Ok(Self {
            search: query.search.filter(|s| !s.trim().is_empty()),
            category,
            tags: split_list(query.tags),
            ingredients: split_list(query.ingredients),
        })
    }
}

pub(super) async fn list_ideas(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdeaQuery>,
) -> Result<Json<Vec<RecipeIdea>>, ApiError> {
    let filter = IdeaFilter::try_from(query)?;
    Ok(Json(state.ideas.list(filter).await?))
}

pub(super) async fn get_idea(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<RecipeIdea>, ApiError> {
    Ok(Json(state.ideas.get(id).await?))
}

pub(super) async fn create_idea(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<IdeaRequest>,
) -> Result<(StatusCode, Json<RecipeIdea>), ApiError> {
    let idea = state.ideas.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(idea)))
}

pub(super) async fn update_idea(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<IdeaRequest>,
) -> Result<Json<RecipeIdea>, ApiError> {
    Ok(Json(state.ideas.update(id, req.into()).await?))
}

pub(super) async fn delete_idea(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.ideas.delete(id).await?;
    Ok(message(DELETED))
}

pub(super) async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Label>>, ApiError> {
    Ok(Json(state.ideas.tags().await?))
}

pub(super) async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Label>>, ApiError> {
    Ok(Json(state.ideas.ingredients().await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{send, test_app};
    use super::*;
    use serde_json::{Value, json};

    fn names(list: &Value) -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn clean_names_trims_and_dedupes() {
        let cleaned = clean_names(
            ["  Beans", "Rice ", "", "Beans", "   "]
                .into_iter()
                .map(str::to_string),
        );
        assert_eq!(cleaned, vec!["Beans", "Rice"]);
    }

    #[tokio::test]
    async fn chili_end_to_end() {
        let (app, _, reaper) = test_app();

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/recipe-ideas",
            Some(json!({
                "name": "Chili",
                "MainIngredients": [{"name": "Beans"}],
                "RecipeTags": [{"name": "Spicy"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        assert_eq!(names(&created["MainIngredients"]), vec!["Beans"]);

        let (status, listed) = send(&app, "GET", "/api/v1/recipe-ideas?ingredients=Beans", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            listed
                .as_array()
                .unwrap()
                .iter()
                .any(|idea| idea["id"].as_i64() == Some(id))
        );

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/v1/recipe-ideas/{id}"),
            Some(json!({
                "name": "Chili",
                "MainIngredients": [{"name": "Rice"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&updated["MainIngredients"]), vec!["Rice"]);
        assert_eq!(names(&updated["RecipeTags"]), vec!["Spicy"]);

        reaper.flush().await;
        let (_, ingredients) = send(&app, "GET", "/api/v1/main-ingredients", None).await;
        assert_eq!(names(&ingredients), vec!["Rice"]);
    }

    #[tokio::test]
    async fn create_duplicate_is_400() {
        let (app, _, _) = test_app();
        let body = json!({"name": "Chili"});
        let (status, _) = send(&app, "POST", "/api/v1/recipe-ideas", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, error) = send(&app, "POST", "/api/v1/recipe-ideas", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "A recipe idea named 'Chili' already exists");
    }

    #[tokio::test]
    async fn create_without_name_is_400() {
        let (app, _, _) = test_app();
        let (status, error) = send(
            &app,
            "POST",
            "/api/v1/recipe-ideas",
            Some(json!({"body": "no name"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn create_accepts_plain_name_lists_and_category() {
        let (app, _, _) = test_app();
        let (_, category) = send(
            &app,
            "POST",
            "/api/v1/recipe-category",
            Some(json!({"name": "Mains"})),
        )
        .await;
        let category_id = category["id"].as_i64().unwrap();

        let (status, idea) = send(
            &app,
            "POST",
            "/api/v1/recipe-ideas",
            Some(json!({
                "name": "Curry",
                "categoryId": category_id,
                "RecipeTags": [" Quick ", "Quick", ""]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(names(&idea["RecipeTags"]), vec!["Quick"]);
        assert_eq!(idea["RecipeCategory"]["name"], "Mains");
    }

    #[tokio::test]
    async fn list_filters_by_tags_and_search() {
        let (app, _, _) = test_app();
        for (name, tag) in [("Chili", "x"), ("Curry", "y"), ("Chili Dogs", "z")] {
            send(
                &app,
                "POST",
                "/api/v1/recipe-ideas",
                Some(json!({"name": name, "RecipeTags": [{"name": tag}]})),
            )
            .await;
        }

        let (_, listed) = send(&app, "GET", "/api/v1/recipe-ideas?tags=x,%20y", None).await;
        assert_eq!(names(&listed), vec!["Chili", "Curry"]);

        let (_, listed) = send(&app, "GET", "/api/v1/recipe-ideas?tags=x,y&search=Chili", None).await;
        assert_eq!(names(&listed), vec!["Chili"]);

        let (_, listed) = send(&app, "GET", "/api/v1/recipe-ideas?tags=nothing", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn list_rejects_bad_category() {
        let (app, _, _) = test_app();
        let (status, _) = send(&app, "GET", "/api/v1/recipe-ideas?category=soup", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/api/v1/recipe-ideas?category=", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn get_update_delete_missing_is_404() {
        let (app, _, _) = test_app();
        let (status, _) = send(&app, "GET", "/api/v1/recipe-ideas/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "PUT",
            "/api/v1/recipe-ideas/9",
            Some(json!({"name": "Ghost"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, error) = send(&app, "DELETE", "/api/v1/recipe-ideas/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "Recipe idea 9 not found");
    }

    #[tokio::test]
    async fn delete_keeps_tags() {
        let (app, _, reaper) = test_app();
        let (_, idea) = send(
            &app,
            "POST",
            "/api/v1/recipe-ideas",
            Some(json!({"name": "Chili", "RecipeTags": [{"name": "Spicy"}]})),
        )
        .await;
        let id = idea["id"].as_i64().unwrap();

        let (status, body) = send(&app, "DELETE", &format!("/api/v1/recipe-ideas/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], DELETED);

        reaper.flush().await;
        let (_, tags) = send(&app, "GET", "/api/v1/recipe-tags", None).await;
        assert_eq!(names(&tags), vec!["Spicy"]);
    }
}
