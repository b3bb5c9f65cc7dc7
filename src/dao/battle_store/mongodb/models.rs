use std::time::{SystemTime, UNIX_EPOCH};

use mongodb::bson::{Bson, Document, bson, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{BattleEntity, ContentEntity};

/// Stored content document; the entity is flattened next to a string `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoContentDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    entity: ContentEntity,
}

impl From<ContentEntity> for MongoContentDocument {
    fn from(entity: ContentEntity) -> Self {
        Self {
            id: entity.id.to_string(),
            entity,
        }
    }
}

impl From<MongoContentDocument> for ContentEntity {
    fn from(document: MongoContentDocument) -> Self {
        document.entity
    }
}

/// Stored battle document; the entity is flattened next to a string `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBattleDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    entity: BattleEntity,
}

impl From<BattleEntity> for MongoBattleDocument {
    fn from(entity: BattleEntity) -> Self {
        Self {
            id: entity.id.to_string(),
            entity,
        }
    }
}

impl From<MongoBattleDocument> for BattleEntity {
    fn from(document: MongoBattleDocument) -> Self {
        document.entity
    }
}

/// Filter on the document id.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the battle `id` only while it is still at `expected`.
/// Documents written before revisions existed have no field and count as 0.
pub fn revision_guard(id: Uuid, expected: u64) -> Document {
    let revision = if expected == 0 {
        bson!({"$in": [0_i64, Bson::Null]})
    } else {
        bson!(expected as i64)
    };
    doc! {"_id": id.to_string(), "revision": revision}
}

/// Epoch milliseconds, matching how entities serialize their timestamps.
pub fn millis(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Escape `term` so it matches literally inside a `$regex`.
pub fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if "\\^$.|?*+()[]{}/-".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
