//! News feed

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{optional_text, parse_id, ApiJson};
use crate::auth::AdminUser;
use crate::db::{self, posts::Post};
use crate::error::{require_text, ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Page, PageQuery, POSTS_PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_published: Option<bool>,
}

/// URL slug: lower-case ASCII letters and digits separated by single dashes.
/// Lithuanian letters are transliterated.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().to_lowercase().chars() {
        let mapped = match c {
            'ą' | 'à' | 'á' | 'ä' => 'a',
            'č' | 'ç' => 'c',
            'ę' | 'ė' | 'é' | 'è' => 'e',
            'į' | 'í' => 'i',
            'š' => 's',
            'ų' | 'ū' | 'ü' | 'ú' => 'u',
            'ž' => 'z',
            'ö' | 'ó' => 'o',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        };
        if mapped == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(mapped);
    }
    slug.trim_end_matches('-').to_string()
}

/// GET /api/posts?page=
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Post>>> {
    let total = db::posts::count_published(&state.db).await?;
    let pagination = calculate_pagination(total, POSTS_PAGE_SIZE, query.page.unwrap_or(1));
    let posts = db::posts::list_published(&state.db, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(posts, pagination, total)))
}

/// GET /api/posts/:slug
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Post>> {
    let post = db::posts::find_published_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(post))
}

/// GET /api/admin/posts
pub async fn admin_list_posts(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(db::posts::list_all_posts(&state.db).await?))
}

async fn ensure_unique_slug(state: &AppState, slug: &str) -> ApiResult<()> {
    if slug.is_empty() {
        return Err(ApiError::bad_request("Slug must contain at least one letter or digit"));
    }
    if db::posts::slug_exists(&state.db, slug).await? {
        return Err(ApiError::BadRequest {
            message: "A post with this slug already exists".to_string(),
            details: Some(serde_json::json!({ "slug": slug })),
        });
    }
    Ok(())
}

/// POST /api/admin/posts
pub async fn create_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<PostInput>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let title = require_text(input.title.as_deref(), "title")?;
    let body = require_text(input.body.as_deref(), "body")?;
    let slug = slugify(optional_text(input.slug).as_deref().unwrap_or(&title));
    ensure_unique_slug(&state, &slug).await?;

    let now = Utc::now();
    let is_published = input.is_published.unwrap_or(false);
    let post = Post {
        guid: club_common::ids::generate(),
        slug,
        title,
        excerpt: optional_text(input.excerpt),
        body,
        cover_image_url: optional_text(input.cover_image_url),
        author_id: Some(admin.guid),
        is_published,
        published_at: is_published.then_some(now),
        created_at: now,
        updated_at: now,
    };

    db::posts::insert_post(&state.db, &post).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/admin/posts/:id
///
/// `published_at` is set the first time a post is published and kept after.
pub async fn update_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PostInput>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;
    let mut post = db::posts::find_post(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    if input.title.is_some() {
        post.title = require_text(input.title.as_deref(), "title")?;
    }
    if let Some(raw) = optional_text(input.slug) {
        let slug = slugify(&raw);
        if slug != post.slug {
            ensure_unique_slug(&state, &slug).await?;
            post.slug = slug;
        }
    }
    if input.excerpt.is_some() {
        post.excerpt = optional_text(input.excerpt);
    }
    if input.body.is_some() {
        post.body = require_text(input.body.as_deref(), "body")?;
    }
    if input.cover_image_url.is_some() {
        post.cover_image_url = optional_text(input.cover_image_url);
    }

    let now = Utc::now();
    if let Some(published) = input.is_published {
        post.is_published = published;
        if published && post.published_at.is_none() {
            post.published_at = Some(now);
        }
    }
    post.updated_at = now;

    db::posts::update_post(&state.db, &post).await?;
    Ok(Json(post))
}

/// DELETE /api/admin/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::posts::delete_post(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Post"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/:slug", get(get_post))
        .route("/api/admin/posts", get(admin_list_posts).post(create_post))
        .route("/api/admin/posts/:id", put(update_post).delete(delete_post))
}
