use std::time::SystemTime;

use uuid::Uuid;

use crate::dao::models::{ContentEntity, ContentKind, ContentStatus};

/// Available image content owned by `creator` in `category`.
pub(crate) fn content(creator: &str, category: &str) -> ContentEntity {
    let now = SystemTime::now();
    let id = Uuid::new_v4();
    ContentEntity {
        id,
        creator_id: creator.into(),
        creator_name: format!("{creator}-name"),
        title: format!("{creator} {category} {}", id.simple()),
        description: String::new(),
        category: category.into(),
        content_type: ContentKind::Image,
        image_url: Some("https://cdn.example.com/a.png".into()),
        youtube_id: None,
        youtube_url: None,
        thumbnail_url: None,
        instagram_url: None,
        tags: Vec::new(),
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
