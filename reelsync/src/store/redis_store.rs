use std::borrow::Cow;

use futures_util::StreamExt;
use redis::{Value as RedisValue, aio::ConnectionManager, cmd, from_redis_value};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    CollectionQuery, DocumentFields, DocumentStore, FieldMutation, Filter, SnapshotFeed,
    scripts::DOCUMENT_WRITE_SCRIPT,
};
use crate::{
    errors::StoreError,
    id::generate_document_id,
    keys::KeyContext,
    types::{Collection, Document},
};

/// Upper bound on documents returned by one ordered read.
const MAX_SNAPSHOT_DOCUMENTS: u64 = 10_000;
const TAG_SEPARATOR: &str = "|";

/// Document store backed by Redis with the RedisJSON and RediSearch modules.
///
/// Documents live at `{prefix}:{collection}:{id}`. Every write goes through one Lua
/// script that publishes the document id on `{prefix}:changes:{collection}`; listeners
/// reload the whole query result on each announcement.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFieldType {
    Tag,
    Numeric,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexField {
    pub path: &'static str,
    pub name: &'static str,
    pub field_type: IndexFieldType,
    pub sortable: bool,
}

impl IndexField {
    const fn numeric_sortable(path: &'static str, name: &'static str) -> Self {
        Self {
            path,
            name,
            field_type: IndexFieldType::Numeric,
            sortable: true,
        }
    }

    const fn tag(path: &'static str, name: &'static str) -> Self {
        Self {
            path,
            name,
            field_type: IndexFieldType::Tag,
            sortable: false,
        }
    }
}

/// Index fields backing the ordered and filtered subscriptions opened by the client.
pub fn default_index_fields(collection: Collection) -> Vec<IndexField> {
    let mut fields = vec![IndexField::numeric_sortable("$.timestamp", "timestamp")];
    match collection {
        Collection::Conversations => {
            fields.push(IndexField::tag("$.participants[*]", "participants"));
            fields.push(IndexField::numeric_sortable("$.lastMessageTime", "lastMessageTime"));
        }
        Collection::Messages => fields.push(IndexField::tag("$.conversationId", "conversationId")),
        Collection::Comments => fields.push(IndexField::tag("$.videoId", "videoId")),
        Collection::Notifications => fields.push(IndexField::tag("$.userId", "userId")),
        _ => {}
    }
    fields
}

#[derive(Serialize)]
struct WriteCommand<'a> {
    #[serde(skip)]
    collection: Collection,
    op: &'static str,
    key: String,
    ids_key: String,
    channel: String,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_json: Option<String>,
    server_timestamps: Vec<String>,
    mutations: Vec<MutationPayload>,
}

/// Lua-facing mutation. Values travel pre-encoded so the script never re-encodes JSON.
#[derive(Serialize)]
struct MutationPayload {
    op: &'static str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    by: Option<i64>,
}

impl MutationPayload {
    fn encode(mutation: FieldMutation) -> Result<Self, StoreError> {
        let (op, path, value, by) = match mutation {
            FieldMutation::Set { path, value } => ("set", path, Some(value), None),
            FieldMutation::ArrayUnion { path, value } => ("array_union", path, Some(value), None),
            FieldMutation::ArrayRemove { path, value } => ("array_remove", path, Some(value), None),
            FieldMutation::Increment { path, by } => ("increment", path, None, Some(by)),
            FieldMutation::ServerTimestamp { path } => ("server_timestamp", path, None, None),
        };
        let value_json = value.map(|value| serde_json::to_string(&value)).transpose()?;
        Ok(Self {
            op,
            path,
            value_json,
            by,
        })
    }
}

impl RedisStore {
    pub fn new(client: redis::Client, conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            client,
            conn,
            prefix: prefix.into(),
        }
    }

    /// Open a store from a Redis connection URL.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self::new(client, conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    /// Create the search index that serves ordered subscriptions on `collection`.
    ///
    /// Returns `false` when the index already existed.
    pub async fn ensure_index(&self, collection: Collection, fields: &[IndexField]) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let keys = self.keys();
        let index_name = keys.search_index(collection.as_str());

        let indexes: Vec<String> = cmd("FT._LIST").query_async(&mut conn).await?;
        if indexes.iter().any(|name| name == &index_name) {
            return Ok(false);
        }

        let mut command = cmd("FT.CREATE");
        command.arg(&index_name);
        command.arg("ON").arg("JSON");
        command.arg("PREFIX").arg(1).arg(keys.document_prefix(collection.as_str()));
        command.arg("SCHEMA");
        for field in fields {
            command.arg(field.path).arg("AS").arg(field.name);
            match field.field_type {
                IndexFieldType::Tag => {
                    command.arg("TAG").arg("SEPARATOR").arg(TAG_SEPARATOR);
                }
                IndexFieldType::Numeric => {
                    command.arg("NUMERIC");
                }
            }
            if field.sortable {
                command.arg("SORTABLE");
            }
        }

        match command.query_async::<()>(&mut conn).await {
            Ok(()) => Ok(true),
            Err(err) if err.to_string().to_lowercase().contains("index already exists") => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, command: WriteCommand<'_>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&command)?;
        let mut conn = self.conn.clone();

        let mut invocation = DOCUMENT_WRITE_SCRIPT.prepare_invoke();
        invocation.arg(payload);
        let raw: String = invocation.invoke_async(&mut conn).await?;

        let response: Value = serde_json::from_str(&raw)?;
        match response.get("error").and_then(Value::as_str) {
            None => Ok(()),
            Some("not_found") => Err(StoreError::NotFound {
                collection: command.collection,
                id: command.id.to_string(),
            }),
            Some(code) => Err(StoreError::transport(format!("write rejected: {code}"))),
        }
    }

    fn write_command<'a>(&self, op: &'static str, collection: Collection, id: &'a str) -> WriteCommand<'a> {
        let keys = self.keys();
        WriteCommand {
            collection,
            op,
            key: keys.document(collection.as_str(), id),
            ids_key: keys.id_set(collection.as_str()),
            channel: keys.changes(collection.as_str()),
            id,
            document_json: None,
            server_timestamps: Vec::new(),
            mutations: Vec::new(),
        }
    }

    fn document_command<'a>(
        &self,
        op: &'static str,
        collection: Collection,
        id: &'a str,
        fields: DocumentFields,
    ) -> Result<WriteCommand<'a>, StoreError> {
        let mut command = self.write_command(op, collection, id);
        command.server_timestamps = fields.server_timestamp_fields().to_vec();
        command.document_json = Some(serde_json::to_string(fields.values())?);
        Ok(command)
    }

    async fn load(&self, conn: &mut ConnectionManager, query: &CollectionQuery) -> Result<Vec<Document>, StoreError> {
        if query.order.is_some() {
            self.load_ordered(conn, query).await
        } else {
            self.load_unordered(conn, query).await
        }
    }

    async fn load_unordered(
        &self,
        conn: &mut ConnectionManager,
        query: &CollectionQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let keys = self.keys();
        let collection = query.collection.as_str();
        let ids: Vec<String> = cmd("SMEMBERS").arg(keys.id_set(collection)).query_async(conn).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let document_keys: Vec<String> = ids.iter().map(|id| keys.document(collection, id)).collect();
        let payloads: Vec<Option<String>> = cmd("JSON.MGET").arg(&document_keys).arg("$").query_async(conn).await?;

        let mut docs = Vec::with_capacity(ids.len());
        for (id, payload) in ids.into_iter().zip(payloads) {
            // Deleted between SMEMBERS and MGET.
            let Some(payload) = payload else { continue };
            let doc = Document::new(id, parse_document_payload(&payload)?);
            if query.matches(&doc) {
                docs.push(doc);
            }
        }
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn load_ordered(
        &self,
        conn: &mut ConnectionManager,
        query: &CollectionQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let Some(order) = &query.order else {
            return self.load_unordered(conn, query).await;
        };
        let keys = self.keys();
        let document_prefix = keys.document_prefix(query.collection.as_str());

        let mut command = cmd("FT.SEARCH");
        command.arg(keys.search_index(query.collection.as_str()));
        command.arg(search_expression(query.filter.as_ref()));
        command.arg("SORTBY").arg(&order.field).arg(order.direction.as_str());
        command.arg("LIMIT").arg(0).arg(MAX_SNAPSHOT_DOCUMENTS);
        command.arg("RETURN").arg(1).arg("$");
        command.arg("DIALECT").arg(3);

        let raw: RedisValue = match command.query_async(conn).await {
            Ok(raw) => raw,
            Err(err) if is_query_shape_error(&err) => return Err(StoreError::precondition(err.to_string())),
            Err(err) => return Err(err.into()),
        };
        let (total, docs) = parse_search_reply(&raw, &document_prefix)?;
        if total > docs.len() as u64 {
            log::warn!(
                "ordered read on {} returned {} of {total} documents; the rest are missing from the snapshot",
                query.collection,
                docs.len()
            );
        }
        Ok(docs)
    }
}

impl DocumentStore for RedisStore {
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotFeed, StoreError> {
        let channel = self.keys().changes(query.collection.as_str());
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        // Subscribe before the first read so no change slips between the two.
        let mut conn = self.conn.clone();
        let initial = self.load(&mut conn, query).await?;

        let (sender, feed) = SnapshotFeed::channel();
        if sender.send(Ok(initial)).is_err() {
            return Ok(feed);
        }

        let store = self.clone();
        let query = query.clone();
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = sender.closed() => break,
                    message = messages.next() => {
                        if message.is_none() {
                            let _ = sender.send(Err(StoreError::transport(format!("change channel {channel} closed"))));
                            break;
                        }
                        let event = store.load(&mut conn, &query).await;
                        let failed = event.is_err();
                        if sender.send(event).is_err() || failed {
                            break;
                        }
                    }
                }
            }
            log::debug!("listener on {channel} detached");
        });

        Ok(feed)
    }

    async fn add_document(&self, collection: Collection, fields: DocumentFields) -> Result<String, StoreError> {
        let id = generate_document_id();
        let command = self.document_command("add", collection, &id, fields)?;
        self.write(command).await?;
        Ok(id)
    }

    async fn set_document(&self, collection: Collection, id: &str, fields: DocumentFields) -> Result<(), StoreError> {
        let command = self.document_command("set", collection, id, fields)?;
        self.write(command).await
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        mutations: Vec<FieldMutation>,
    ) -> Result<(), StoreError> {
        let mut command = self.write_command("update", collection, id);
        command.mutations = mutations
            .into_iter()
            .map(MutationPayload::encode)
            .collect::<Result<_, _>>()?;
        self.write(command).await
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let command = self.write_command("delete", collection, id);
        self.write(command).await
    }
}

/// Errors RediSearch raises for a query shape it cannot serve (no index, field not sortable).
fn is_query_shape_error(err: &redis::RedisError) -> bool {
    let message = err.to_string().to_lowercase();
    ["no such index", "unknown index", "not loaded nor in schema", "unknown field"]
        .iter()
        .any(|needle| message.contains(needle))
}

fn search_expression(filter: Option<&Filter>) -> String {
    let Some(filter) = filter else {
        return "*".to_string();
    };
    let (Filter::Eq { field, value } | Filter::ArrayContains { field, value }) = filter;
    match value {
        Value::Number(number) => format!("@{field}:[{number} {number}]"),
        Value::String(text) => format!("@{field}:{{{}}}", escape_tag(text)),
        other => format!("@{field}:{{{}}}", escape_tag(&other.to_string())),
    }
}

/// Escape a value for a TAG query; everything but alphanumerics and `_` is punctuation there.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if !ch.is_alphanumeric() && ch != '_' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_document_payload(payload: &str) -> Result<Map<String, Value>, StoreError> {
    let value: Value = serde_json::from_str(payload)?;
    // `$` paths come back wrapped in a single-element array.
    let value = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::transport(format!("document payload is not an object: {other}"))),
    }
}

fn extract_json_payload(value: &RedisValue) -> Result<String, StoreError> {
    match value {
        RedisValue::Array(items) => {
            for chunk in items.chunks(2) {
                if chunk.len() != 2 {
                    continue;
                }
                let alias: String = from_redis_value(&chunk[0])?;
                if alias == "$" {
                    return value_to_string(&chunk[1]);
                }
            }
            Err(StoreError::Transport {
                message: Cow::Borrowed("search response missing JSON payload"),
            })
        }
        other => value_to_string(other),
    }
}

fn value_to_string(value: &RedisValue) -> Result<String, StoreError> {
    match value {
        RedisValue::BulkString(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        RedisValue::SimpleString(text) => Ok(text.clone()),
        other => Err(StoreError::transport(format!("unexpected search payload: {other:?}"))),
    }
}

/// Split an `FT.SEARCH ... RETURN 1 $` reply into the total match count and the rows
/// actually returned.
fn parse_search_reply(raw: &RedisValue, document_prefix: &str) -> Result<(u64, Vec<Document>), StoreError> {
    let values: Vec<RedisValue> = from_redis_value(raw)?;
    let total: u64 = match values.first() {
        Some(value) => from_redis_value(value)?,
        None => 0,
    };

    let mut docs = Vec::new();
    let mut idx = 1;
    while idx + 1 < values.len() {
        let key: String = from_redis_value(&values[idx])?;
        let id = key.strip_prefix(document_prefix).unwrap_or(&key).to_string();
        let payload = extract_json_payload(&values[idx + 1])?;
        docs.push(Document::new(id, parse_document_payload(&payload)?));
        idx += 2;
    }
    Ok((total, docs))
}
