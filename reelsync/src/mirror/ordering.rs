use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

use crate::{
    store::OrderBy,
    types::{Document, SortOrder},
};

/// Client-assigned creation time, written alongside every server timestamp.
pub const CLIENT_TIMESTAMP_FIELD: &str = "createdAt";

/// Logical time of a document in epoch milliseconds.
///
/// The server-assigned value in `field` wins; otherwise the client `createdAt` string is
/// parsed; documents with neither sort as the epoch.
pub fn logical_timestamp(doc: &Document, field: &str) -> i64 {
    if let Some(server) = doc.get(field).and_then(as_millis) {
        return server;
    }
    doc.str_field(CLIENT_TIMESTAMP_FIELD)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.timestamp_millis())
        .unwrap_or_default()
}

fn as_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|ms| ms as i64))
}

/// Stable client-side sort reproducing the server's ordering for `order`.
pub fn sort_documents(docs: &mut [Document], order: &OrderBy) {
    docs.sort_by(|a, b| compare(a, b, order));
}

fn compare(a: &Document, b: &Document, order: &OrderBy) -> Ordering {
    let left = logical_timestamp(a, &order.field);
    let right = logical_timestamp(b, &order.field);
    match order.direction {
        SortOrder::Asc => left.cmp(&right),
        SortOrder::Desc => right.cmp(&left),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap_or_default())
    }

    fn desc() -> OrderBy {
        OrderBy {
            field: "timestamp".into(),
            direction: SortOrder::Desc,
        }
    }

    #[test]
    fn server_timestamp_wins_over_created_at() {
        let d = doc("a", json!({"timestamp": 5000, "createdAt": "2030-01-01T00:00:00Z"}));
        assert_eq!(logical_timestamp(&d, "timestamp"), 5000);
    }

    #[test]
    fn pending_server_timestamp_falls_back_to_created_at() {
        let d = doc("a", json!({"timestamp": null, "createdAt": "1970-01-01T00:00:01.500Z"}));
        assert_eq!(logical_timestamp(&d, "timestamp"), 1500);
    }

    #[test]
    fn documents_without_any_time_sort_as_epoch() {
        let mut docs = vec![
            doc("old", json!({})),
            doc("new", json!({"timestamp": 10})),
            doc("mid", json!({"createdAt": "1970-01-01T00:00:00.005Z"})),
        ];
        sort_documents(&mut docs, &desc());
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[test]
    fn ascending_order_is_supported_for_threads() {
        let mut docs = vec![doc("b", json!({"timestamp": 2})), doc("a", json!({"timestamp": 1}))];
        sort_documents(
            &mut docs,
            &OrderBy {
                field: "timestamp".into(),
                direction: SortOrder::Asc,
            },
        );
        assert_eq!(docs[0].id, "a");
    }
}
