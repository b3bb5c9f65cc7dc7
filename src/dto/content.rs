//! DTOs for uploading, listing and deleting contents.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::dao::models::{ContentEntity, ContentKind, ContentStatus};
use crate::dto::{
    format_optional_time, format_system_time,
    validation::{validate_category, validate_http_url, validate_title, validate_youtube_id},
};

fn default_content_kind() -> ContentKind {
    ContentKind::Image
}

/// Metadata of a content item whose media is already hosted elsewhere.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadContentRequest {
    /// Title shown to voters.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Category used for pairing.
    pub category: String,
    /// How the media is hosted.
    #[serde(default = "default_content_kind")]
    pub content_type: ContentKind,
    /// Required for `image` contents.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Required for `youtube` contents.
    #[serde(default)]
    pub youtube_id: Option<String>,
    /// Canonical YouTube watch URL.
    #[serde(default)]
    pub youtube_url: Option<String>,
    /// Required for `instagram` contents.
    #[serde(default)]
    pub instagram_url: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for UploadContentRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_title(&self.title) {
            errors.add("title", e);
        }
        if let Err(e) = validate_category(&self.category) {
            errors.add("category", e);
        }

        match self.content_type {
            ContentKind::Image => match self.image_url.as_deref() {
                Some(url) => {
                    if let Err(e) = validate_http_url(url) {
                        errors.add("imageUrl", e);
                    }
                }
                None => errors.add("imageUrl", missing("imageUrl")),
            },
            ContentKind::VideoEmbed => {
                match self.youtube_id.as_deref() {
                    Some(id) => {
                        if let Err(e) = validate_youtube_id(id) {
                            errors.add("youtubeId", e);
                        }
                    }
                    None => errors.add("youtubeId", missing("youtubeId")),
                }
                if let Some(url) = self.youtube_url.as_deref() {
                    if let Err(e) = validate_http_url(url) {
                        errors.add("youtubeUrl", e);
                    }
                }
            }
            ContentKind::SocialEmbed => match self.instagram_url.as_deref() {
                Some(url) => {
                    if let Err(e) = validate_http_url(url) {
                        errors.add("instagramUrl", e);
                    }
                }
                None => errors.add("instagramUrl", missing("instagramUrl")),
            },
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn missing(field: &'static str) -> validator::ValidationError {
    let mut err = validator::ValidationError::new("required");
    err.message = Some(format!("`{field}` is required for this content type").into());
    err
}

/// Acknowledgement of a stored upload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadContentResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Identifier of the content.
    pub content_id: Uuid,
    /// Hosted image, when any.
    pub image_url: Option<String>,
    /// How the media is hosted.
    pub content_type: ContentKind,
}

/// Acknowledgement of a soft deletion.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContentResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Identifier of the content.
    pub content_id: Uuid,
    /// Human-readable summary.
    pub message: String,
}

/// Public projection of a stored content item.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    /// Unique identifier.
    pub id: Uuid,
    /// Identity of the creator.
    pub creator_id: String,
    /// Display name of the creator.
    pub creator_name: String,
    /// Title shown to voters.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category used for pairing.
    pub category: String,
    /// How the media is hosted.
    pub content_type: ContentKind,
    /// Hosted image, when any.
    pub image_url: Option<String>,
    /// YouTube video id.
    pub youtube_id: Option<String>,
    /// Canonical YouTube watch URL.
    pub youtube_url: Option<String>,
    /// Preview image URL.
    pub thumbnail_url: Option<String>,
    /// Instagram post URL.
    pub instagram_url: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Lifecycle status.
    pub status: ContentStatus,
    /// Likes received.
    pub like_count: u64,
    /// Views counted so far.
    pub view_count: u64,
    /// Battles this content took part in.
    pub battle_count: u64,
    /// Most recent battle of this content.
    pub last_battle_id: Option<Uuid>,
    /// False once the content is deleted.
    pub is_active: bool,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
    /// RFC 3339 soft-deletion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl From<&ContentEntity> for ContentView {
    fn from(content: &ContentEntity) -> Self {
        Self {
            id: content.id,
            creator_id: content.creator_id.clone(),
            creator_name: content.creator_name.clone(),
            title: content.title.clone(),
            description: content.description.clone(),
            category: content.category.clone(),
            content_type: content.content_type,
            image_url: content.image_url.clone(),
            youtube_id: content.youtube_id.clone(),
            youtube_url: content.youtube_url.clone(),
            thumbnail_url: content.thumbnail_url.clone(),
            instagram_url: content.instagram_url.clone(),
            tags: content.tags.clone(),
            status: content.status,
            like_count: content.like_count,
            view_count: content.view_count,
            battle_count: content.battle_count,
            last_battle_id: content.last_battle_id,
            is_active: content.is_active,
            created_at: format_system_time(content.created_at),
            updated_at: format_system_time(content.updated_at),
            deleted_at: format_optional_time(content.deleted_at),
        }
    }
}

/// Content listing; a failed read yields an empty list with `success = false`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentListResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Contents in listing order.
    pub contents: Vec<ContentView>,
    /// Failure reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentListResponse {
    /// Successful listing.
    pub fn ok(contents: &[ContentEntity]) -> Self {
        Self {
            success: true,
            contents: contents.iter().map(ContentView::from).collect(),
            error: None,
        }
    }

    /// Failed listing carrying the error text.
    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            contents: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Query parameters shared by content listings.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentListParams {
    /// Restrict the listing to one category.
    pub category: Option<String>,
    /// Maximum number of entries returned.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> UploadContentRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn image_upload_requires_an_image_url() {
        let payload = request(r#"{"title": "Sunset", "category": "nature"}"#);
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("imageUrl"));

        let payload = request(
            r#"{"title": "Sunset", "category": "nature", "imageUrl": "https://cdn.example.com/s.png"}"#,
        );
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn youtube_upload_checks_the_video_id() {
        let payload = request(
            r#"{"title": "Clip", "category": "music", "contentType": "youtube", "youtubeId": "short"}"#,
        );
        assert!(payload.validate().unwrap_err().field_errors().contains_key("youtubeId"));

        let payload = request(
            r#"{"title": "Clip", "category": "music", "contentType": "youtube", "youtubeId": "dQw4w9WgXcQ"}"#,
        );
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn blank_title_and_category_are_reported_together() {
        let payload = request(
            r#"{"title": " ", "category": "", "contentType": "instagram", "instagramUrl": "https://instagram.com/p/x"}"#,
        );
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("category"));
        assert!(!fields.contains_key("instagramUrl"));
    }
}
