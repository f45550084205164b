use std::io::Read;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ContentError;
use crate::ids::IdGenerator;

/// A content item as persisted in the `content_items` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::content_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContentItem {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub content_type: String,
    pub content: String,
    pub approved: bool,
    #[serde(
        serialize_with = "timestamps::serialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_date: Option<NaiveDateTime>,
    #[serde(serialize_with = "timestamps::serialize")]
    pub last_updated: NaiveDateTime,
}

/// A content item that has not been written yet. `last_updated` is assigned
/// by the store on first insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContentItem {
    pub id: String,
    pub url: String,
    pub collection_id: Option<String>,
    pub content_type: String,
    pub content: String,
    pub approved: bool,
    pub publish_date: Option<NaiveDateTime>,
}

impl NewContentItem {
    pub fn into_record(self, last_updated: NaiveDateTime) -> ContentItem {
        ContentItem {
            id: self.id,
            url: self.url,
            collection_id: self.collection_id,
            content_type: self.content_type,
            content: self.content,
            approved: self.approved,
            publish_date: self.publish_date,
            last_updated,
        }
    }
}

/// Field updates produced from a patch batch. `None` leaves a column untouched;
/// `publish_date: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = crate::schema::content_items)]
pub struct ContentChanges {
    pub approved: Option<bool>,
    pub publish_date: Option<Option<NaiveDateTime>>,
    pub content: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
}

impl ContentChanges {
    pub fn is_empty(&self) -> bool {
        self.approved.is_none()
            && self.publish_date.is_none()
            && self.content.is_none()
            && self.last_updated.is_none()
    }

    pub fn touched(mut self, at: NaiveDateTime) -> Self {
        self.last_updated = Some(at);
        self
    }

    pub fn apply_to(&self, item: &mut ContentItem) {
        if let Some(approved) = self.approved {
            item.approved = approved;
        }
        if let Some(publish_date) = self.publish_date {
            item.publish_date = publish_date;
        }
        if let Some(content) = &self.content {
            item.content = content.clone();
        }
        if let Some(last_updated) = self.last_updated {
            item.last_updated = last_updated;
        }
    }
}

/// Body of an add-draft request. Everything other than the payload is either
/// taken from the request path or assigned by the server.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DraftBody {
    content_type: String,
    content: Option<Value>,
}

/// Renders an embedded JSON payload as stored text: strings are kept verbatim,
/// anything else is serialized. `null` has no text form.
pub(crate) fn content_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Decodes an add-draft body into a new in-progress item.
///
/// `collection_id` and `url` come from the request path and override whatever
/// the body says; the item always starts unapproved with no publish date.
pub fn parse_content<R: Read>(
    mut body: R,
    collection_id: &str,
    url: &str,
    ids: &dyn IdGenerator,
) -> Result<NewContentItem, ContentError> {
    let mut raw = Vec::new();
    body.read_to_end(&mut raw).map_err(ContentError::ReadingBody)?;

    // Derived struct deserializers also accept sequences; only objects are drafts.
    let draft: DraftBody = serde_json::from_slice::<Map<String, Value>>(&raw)
        .and_then(|fields| serde_json::from_value(Value::Object(fields)))
        .map_err(|err| {
            tracing::debug!(error = %err, "failed to parse content json body");
            ContentError::Parse(err)
        })?;

    let id = ids.new_id()?;

    Ok(NewContentItem {
        id,
        url: url.to_string(),
        collection_id: Some(collection_id.to_string()),
        content_type: draft.content_type,
        content: draft.content.and_then(content_text).unwrap_or_default(),
        approved: false,
        publish_date: None,
    })
}

/// Timestamps are stored as naive UTC and rendered as RFC 3339 with a `Z`
/// suffix and millisecond precision.
pub(crate) mod timestamps {
    use chrono::{NaiveDateTime, SecondsFormat};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn serialize_optional<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }
}
