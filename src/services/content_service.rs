//! Content uploads, deletions and listings.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        battle_store::ContentQuery,
        models::{ContentEntity, ContentKind, ContentStatus},
    },
    dto::{
        content::{
            ContentListResponse, DeleteContentResponse, UploadContentRequest,
            UploadContentResponse,
        },
        identity::CurrentUser,
    },
    error::ServiceError,
    services::matchmaker::{self, MatchConstraints, MatchRequest},
    state::SharedState,
};

fn youtube_thumbnail(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg")
}

/// Build the stored entity for a validated upload.
fn new_content(
    state: &SharedState,
    user: &CurrentUser,
    request: UploadContentRequest,
    now: SystemTime,
) -> ContentEntity {
    let placeholder = || Some(state.config().placeholder_image.clone());
    let (image_url, youtube_id, youtube_url, thumbnail_url, instagram_url) =
        match request.content_type {
            ContentKind::Image => (request.image_url, None, None, None, None),
            ContentKind::VideoEmbed => {
                let thumbnail = request.youtube_id.as_deref().map(youtube_thumbnail);
                (
                    placeholder(),
                    request.youtube_id,
                    request.youtube_url,
                    thumbnail,
                    None,
                )
            }
            ContentKind::SocialEmbed => (placeholder(), None, None, None, request.instagram_url),
        };

    ContentEntity {
        id: Uuid::new_v4(),
        creator_id: user.id.clone(),
        creator_name: user.display_name(),
        title: request.title.trim().to_owned(),
        description: request.description,
        category: request.category.trim().to_owned(),
        content_type: request.content_type,
        image_url,
        youtube_id,
        youtube_url,
        thumbnail_url,
        instagram_url,
        tags: request.tags,
        status: ContentStatus::Available,
        like_count: 0,
        view_count: 0,
        battle_count: 0,
        last_battle_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Store a new content item and schedule a matching run for it.
pub async fn upload_content(
    state: &SharedState,
    user: &CurrentUser,
    request: UploadContentRequest,
) -> Result<UploadContentResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_battle_store().await?;
    let content = new_content(state, user, request, SystemTime::now());
    let response = UploadContentResponse {
        success: true,
        content_id: content.id,
        image_url: content.image_url.clone(),
        content_type: content.content_type,
    };

    store.insert_content(content).await?;
    info!(content_id = %response.content_id, creator = %user.id, "content uploaded");

    schedule_matching(state.clone(), user.clone());
    Ok(response)
}

/// Run the matchmaker after the configured upload delay. The outcome is only logged.
fn schedule_matching(state: SharedState, user: CurrentUser) {
    let settings = state.config().matching.clone();
    tokio::spawn(async move {
        tokio::time::sleep(settings.upload_delay).await;
        let request = MatchRequest {
            quota: settings.upload_quota,
            constraints: MatchConstraints::default(),
        };
        match matchmaker::run_matching(&state, &user, request).await {
            Ok(outcome) => info!(
                created = outcome.battles.len(),
                "post-upload matching created battles"
            ),
            Err(err) => info!(error = %err, "post-upload matching created no battle"),
        }
    });
}

/// Soft-delete a content owned by `user`.
pub async fn delete_content(
    state: &SharedState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<DeleteContentResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let content = store
        .delete_content(id, user.id.clone(), SystemTime::now())
        .await?;

    info!(content_id = %content.id, owner = %user.id, "content deleted");
    Ok(DeleteContentResponse {
        success: true,
        content_id: content.id,
        message: "content deleted".into(),
    })
}

async fn list(state: &SharedState, query: ContentQuery) -> ContentListResponse {
    let store = match state.require_battle_store().await {
        Ok(store) => store,
        Err(err) => return ContentListResponse::failed(err),
    };
    match store.query_contents(query).await {
        Ok(contents) => ContentListResponse::ok(&contents),
        Err(err) => {
            warn!(error = %err, "content listing failed");
            ContentListResponse::failed(err)
        }
    }
}

/// Contents uploaded by `user_id`, newest first.
pub async fn list_user_contents(
    state: &SharedState,
    user_id: String,
    limit: Option<usize>,
) -> ContentListResponse {
    list(
        state,
        ContentQuery {
            creator_id: Some(user_id),
            limit: Some(state.config().listing.clamp(limit)),
            ..ContentQuery::default()
        },
    )
    .await
}

/// Contents waiting for a battle, newest first.
pub async fn list_available_contents(
    state: &SharedState,
    category: Option<String>,
    limit: Option<usize>,
) -> ContentListResponse {
    list(
        state,
        ContentQuery {
            category: category.filter(|category| !category.trim().is_empty()),
            limit: Some(state.config().listing.clamp(limit)),
            ..ContentQuery::available()
        },
    )
    .await
}
