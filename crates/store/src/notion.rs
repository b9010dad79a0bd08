//! Notion-style workspace database client.
//!
//! Maps [`PropertyValue`] variants to and from the page JSON shape:
//! `{"id", "created_time", "last_edited_time", "properties": {name: {"type": .., <type>: ..}}}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tasksync_core::config::NotionConfig;
use tasksync_core::Task;

use crate::error::StoreError;
use crate::patch::TaskPatch;
use crate::property::{PropertyMap, PropertyValue};
use crate::query::{ListQuery, RejectedRow, TaskPage};
use crate::schema::{self, patch_to_properties, task_from_properties, task_to_properties};
use crate::traits::RemoteTaskStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NotionStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    version: String,
}

impl NotionStore {
    pub fn new(base_url: String, token: String, version: String) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            version,
        })
    }

    /// Build from config; fails when no API token is configured.
    pub fn from_config(config: &NotionConfig) -> Result<Self, StoreError> {
        let token = config
            .api_token
            .clone()
            .ok_or_else(|| StoreError::Config("NOTION_API_TOKEN is not set".into()))?;
        Self::new(config.base_url.clone(), token, config.api_version.clone())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status, body });
        }
        Ok(response.json().await?)
    }
}

// ── Property encoding ─────────────────────────────────────────

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Encode a property value as a Notion property object.
pub fn encode_property(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Title(s) => json!({ "title": rich_text(s) }),
        PropertyValue::RichText(s) => json!({ "rich_text": rich_text(s) }),
        PropertyValue::Select(opt) => match opt {
            Some(name) => json!({ "select": { "name": name } }),
            None => json!({ "select": null }),
        },
        PropertyValue::MultiSelect(names) => json!({
            "multi_select": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>()
        }),
        PropertyValue::Date(opt) => match opt {
            Some(date) => json!({ "date": { "start": date.format("%Y-%m-%d").to_string() } }),
            None => json!({ "date": null }),
        },
        PropertyValue::Number(n) => json!({ "number": n }),
        PropertyValue::Relation(ids) => json!({
            "relation": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
        }),
    }
}

pub fn encode_properties(props: &PropertyMap) -> Value {
    let map: Map<String, Value> = props
        .iter()
        .map(|(name, value)| (name.clone(), encode_property(value)))
        .collect();
    Value::Object(map)
}

fn plain_text(name: &str, value: &Value) -> Result<String, StoreError> {
    let parts = value
        .as_array()
        .ok_or_else(|| StoreError::invalid(name, "expected rich text array"))?;
    Ok(parts
        .iter()
        .filter_map(|p| {
            p["plain_text"]
                .as_str()
                .or_else(|| p["text"]["content"].as_str())
        })
        .collect())
}

fn names(name: &str, value: &Value, key: &str) -> Result<Vec<String>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::invalid(name, "expected array"))?;
    items
        .iter()
        .map(|item| {
            item[key]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| StoreError::invalid(name, format!("array item missing '{key}'")))
        })
        .collect()
}

/// Decode one Notion property object. Returns `Ok(None)` for kinds this
/// system does not model (formula, people, ...).
pub fn decode_property(name: &str, value: &Value) -> Result<Option<PropertyValue>, StoreError> {
    let kind = value["type"]
        .as_str()
        .ok_or_else(|| StoreError::invalid(name, "missing 'type'"))?;
    let body = &value[kind];

    let decoded = match kind {
        "title" => PropertyValue::Title(plain_text(name, body)?),
        "rich_text" => PropertyValue::RichText(plain_text(name, body)?),
        "select" | "status" => PropertyValue::Select(body["name"].as_str().map(str::to_string)),
        "multi_select" => PropertyValue::MultiSelect(names(name, body, "name")?),
        "relation" => PropertyValue::Relation(names(name, body, "id")?),
        "number" => {
            if body.is_null() {
                PropertyValue::Number(None)
            } else {
                PropertyValue::Number(Some(body.as_f64().ok_or_else(|| {
                    StoreError::invalid(name, "number is not numeric")
                })?))
            }
        }
        "date" => {
            if body.is_null() {
                PropertyValue::Date(None)
            } else {
                let start = body["start"]
                    .as_str()
                    .ok_or_else(|| StoreError::invalid(name, "date missing 'start'"))?;
                // Datetimes carry a time suffix; the date part is the first 10 chars.
                let date = start.get(..10).unwrap_or(start);
                let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| StoreError::invalid(name, e.to_string()))?;
                PropertyValue::Date(Some(parsed))
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

fn timestamp(page: &Value, key: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = page[key]
        .as_str()
        .ok_or_else(|| StoreError::Parse(format!("page missing '{key}'")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Parse(format!("bad '{key}': {e}")))
}

/// Decode a Notion page object into a task.
pub fn decode_page(page: &Value) -> Result<Task, StoreError> {
    let id = page["id"]
        .as_str()
        .ok_or_else(|| StoreError::Parse("page missing 'id'".into()))?;
    let raw_props = page["properties"]
        .as_object()
        .ok_or_else(|| StoreError::Parse(format!("page {id} missing 'properties'")))?;

    let mut props = PropertyMap::new();
    for (name, value) in raw_props {
        if let Some(decoded) = decode_property(name, value)? {
            props.insert(name.clone(), decoded);
        }
    }

    task_from_properties(
        id,
        &props,
        timestamp(page, "created_time")?,
        timestamp(page, "last_edited_time")?,
    )
}

// ── Queries ───────────────────────────────────────────────────

pub fn encode_query(query: &ListQuery) -> Value {
    let mut body = Map::new();
    body.insert("page_size".into(), json!(query.resolved_page_size()));
    if let Some(cursor) = &query.cursor {
        body.insert("start_cursor".into(), json!(cursor));
    }
    Value::Object(body)
}

/// Decode a database query response. Rows that fail to decode are
/// collected as rejected instead of failing the page.
pub fn decode_results(resp: &Value) -> Result<TaskPage, StoreError> {
    let results = resp["results"]
        .as_array()
        .ok_or_else(|| StoreError::Parse("query response missing 'results'".into()))?;

    let mut page = TaskPage::default();
    for row in results {
        match decode_page(row) {
            Ok(task) => page.tasks.push(task),
            Err(e) => {
                let remote_id = row["id"].as_str().unwrap_or("<unknown>").to_string();
                warn!(%remote_id, error = %e, "skipping unreadable remote row");
                page.rejected.push(RejectedRow {
                    remote_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    if resp["has_more"].as_bool().unwrap_or(false) {
        page.next_cursor = resp["next_cursor"].as_str().map(str::to_string);
    }
    Ok(page)
}

#[async_trait]
impl RemoteTaskStore for NotionStore {
    fn name(&self) -> &str {
        "notion"
    }

    async fn list(&self, database_id: &str, query: &ListQuery) -> Result<TaskPage, StoreError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, database_id);
        debug!(database_id, cursor = ?query.cursor, "Notion query");

        let resp = self
            .send(self.client.post(&url).json(&encode_query(query)))
            .await?;

        decode_results(&resp)
    }

    async fn create(&self, database_id: &str, task: &Task) -> Result<String, StoreError> {
        task.validate()
            .map_err(|e| StoreError::invalid(schema::NAME, e.to_string()))?;

        let url = format!("{}/v1/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": encode_properties(&task_to_properties(task)),
        });
        debug!(database_id, title = %task.title, "Notion create page");

        let resp = self.send(self.client.post(&url).json(&body)).await?;
        resp["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| StoreError::Parse("create response missing 'id'".into()))
    }

    async fn update(&self, remote_id: &str, patch: &TaskPatch) -> Result<bool, StoreError> {
        let url = format!("{}/v1/pages/{}", self.base_url, remote_id);
        let body = json!({ "properties": encode_properties(&patch_to_properties(patch)) });
        debug!(remote_id, fields = ?patch.touched_fields(), "Notion update page");

        self.send(self.client.patch(&url).json(&body)).await?;
        Ok(true)
    }
}
