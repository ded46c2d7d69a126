use super::sse::{SseDecoder, SseEvent};
use super::{tree, RemoteTable, TableEvent, TableSubscription};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// Table hosted in a Firebase Realtime Database, spoken to over its REST
/// API. Subscriptions use the streaming endpoint.
pub struct FirebaseTable {
    client: reqwest::Client,
    database_url: String,
}

impl FirebaseTable {
    pub fn new(database_url: &str) -> Result<Self> {
        // No overall request timeout: it would cut long-lived event streams.
        // The favorites store bounds each call itself.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, database_url))
    }

    pub fn with_client(client: reqwest::Client, database_url: &str) -> Self {
        Self {
            client,
            database_url: database_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> Result<String> {
        let segments = tree::segments(path)?;
        Ok(format!("{}/{}.json", self.database_url, segments.join("/")))
    }
}

#[async_trait]
impl RemoteTable for FirebaseTable {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let url = self.url(path)?;
        tracing::debug!(%url, "firebase read");
        let value: Value = self.client.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(Some(value).filter(|v| !v.is_null()))
    }

    async fn write(&self, path: &str, value: Value) -> Result<()> {
        let url = self.url(path)?;
        tracing::debug!(%url, "firebase write");
        self.client.put(&url).json(&value).send().await?.error_for_status()?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        tracing::debug!(%url, "firebase delete");
        self.client.delete(&url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<TableSubscription> {
        let url = self.url(path)?;
        tracing::debug!(%url, "firebase subscribe");
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(stream_events(response, tx));
        Ok(TableSubscription::with_task(rx, task))
    }
}

async fn stream_events(response: reqwest::Response, tx: mpsc::UnboundedSender<TableEvent>) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut mirror = StreamMirror::default();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(TableEvent::Failed(Error::from(e).to_string()));
                return;
            }
        };

        for event in decoder.push(&chunk) {
            let Some(table_event) = mirror.apply(&event) else {
                continue;
            };
            let failed = matches!(table_event, TableEvent::Failed(_));
            if tx.send(table_event).is_err() || failed {
                return;
            }
        }
    }

    let _ = tx.send(TableEvent::Failed("event stream closed by server".to_string()));
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

/// Local copy of the watched subtree, rebuilt from `put`/`patch` events
#[derive(Debug, Default)]
struct StreamMirror {
    value: Value,
    version: u64,
}

impl StreamMirror {
    fn apply(&mut self, event: &SseEvent) -> Option<TableEvent> {
        match event.event.as_str() {
            "put" | "patch" => match self.apply_change(event) {
                Ok(()) => {
                    self.version += 1;
                    Some(TableEvent::Snapshot {
                        version: self.version,
                        value: tree::get::<&str>(&self.value, &[]),
                    })
                }
                Err(e) => Some(TableEvent::Failed(format!("malformed {} event: {}", event.event, e))),
            },
            "keep-alive" => None,
            "cancel" => Some(TableEvent::Failed(format!("listener cancelled by server: {}", event.data))),
            "auth_revoked" => Some(TableEvent::Failed("listener credentials revoked".to_string())),
            other => {
                tracing::debug!(event = other, "ignoring unknown stream event");
                None
            }
        }
    }

    fn apply_change(&mut self, event: &SseEvent) -> Result<()> {
        let payload: StreamPayload = serde_json::from_str(&event.data)?;
        let segments = tree::segments(&payload.path)?;

        if event.event == "put" {
            tree::set(&mut self.value, &segments, payload.data);
            return Ok(());
        }

        match payload.data {
            Value::Object(children) => {
                tree::merge(&mut self.value, &segments, children);
                Ok(())
            }
            other => Err(Error::CorruptRecord(format!("patch data is not an object: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, data: Value) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    fn snapshot_value(event: Option<TableEvent>) -> Option<Value> {
        match event {
            Some(TableEvent::Snapshot { value, .. }) => value,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_url_building() {
        let table = FirebaseTable::with_client(reqwest::Client::new(), "https://demo.firebaseio.com/");
        assert_eq!(
            table.url("favorites/52772").unwrap(),
            "https://demo.firebaseio.com/favorites/52772.json"
        );
        assert_eq!(table.url("/").unwrap(), "https://demo.firebaseio.com/.json");
        assert!(table.url("favorites/a#b").is_err());
    }

    #[test]
    fn test_initial_put_then_child_changes() {
        let mut mirror = StreamMirror::default();

        let initial = mirror.apply(&event("put", json!({"path": "/", "data": {"1": {"id": "1"}}})));
        assert_eq!(snapshot_value(initial), Some(json!({"1": {"id": "1"}})));

        let added = mirror.apply(&event("put", json!({"path": "/2", "data": {"id": "2"}})));
        assert_eq!(snapshot_value(added).unwrap().as_object().unwrap().len(), 2);

        let removed = mirror.apply(&event("put", json!({"path": "/1", "data": null})));
        assert_eq!(snapshot_value(removed), Some(json!({"2": {"id": "2"}})));

        let emptied = mirror.apply(&event("put", json!({"path": "/2", "data": null})));
        assert_eq!(snapshot_value(emptied), None);
        assert_eq!(mirror.version, 4);
    }

    #[test]
    fn test_patch_merges_children() {
        let mut mirror = StreamMirror::default();
        mirror.apply(&event("put", json!({"path": "/", "data": {"1": {"id": "1", "name": "A"}}})));

        let patched = mirror.apply(&event("patch", json!({"path": "/1", "data": {"name": "B"}})));
        assert_eq!(snapshot_value(patched), Some(json!({"1": {"id": "1", "name": "B"}})));
    }

    #[test]
    fn test_keep_alive_is_silent() {
        let mut mirror = StreamMirror::default();
        assert_eq!(mirror.apply(&event("keep-alive", Value::Null)), None);
        assert_eq!(mirror.version, 0);
    }

    #[test]
    fn test_cancel_and_revocation_fail_the_listener() {
        let mut mirror = StreamMirror::default();
        assert!(matches!(
            mirror.apply(&event("cancel", json!("Permission denied"))),
            Some(TableEvent::Failed(_))
        ));
        assert!(matches!(
            mirror.apply(&event("auth_revoked", json!("token expired"))),
            Some(TableEvent::Failed(_))
        ));
    }

    #[test]
    fn test_malformed_payload_fails_the_listener() {
        let mut mirror = StreamMirror::default();
        let malformed = SseEvent {
            event: "put".to_string(),
            data: "not json".to_string(),
        };
        assert!(matches!(mirror.apply(&malformed), Some(TableEvent::Failed(_))));
    }
}
