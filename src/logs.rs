//! Chronological log buffer for a leaf or branch, with older-page prepend.
//!
//! The backend returns log pages newest first. `LogFeed` keeps events oldest
//! first, so every page is reversed on the way in. The cursor for the next
//! older page is the `_id` of the oldest event held.

use chrono::{DateTime, Local, TimeZone, Utc};
use forest_common::{CommandRequest, LogEvent};
use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::errors::ChannelError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFeed {
    events: Vec<LogEvent>,
}

impl LogFeed {
    /// Build a feed from a page in backend order (newest first).
    pub fn from_newest_first(mut page: Vec<LogEvent>) -> Self {
        page.reverse();
        Self { events: page }
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Cursor for the next older page.
    pub fn oldest_id(&self) -> Option<&str> {
        self.events.first().and_then(|e| e.id.as_deref())
    }

    /// Put an older page (backend order, newest first) ahead of what is held.
    /// Events already held are skipped. Returns how many were added.
    pub fn prepend_older(&mut self, page: Vec<LogEvent>) -> usize {
        let mut older: Vec<LogEvent> = page
            .into_iter()
            .rev()
            .filter(|event| !self.contains(event))
            .collect();
        let added = older.len();
        older.append(&mut self.events);
        self.events = older;
        added
    }

    /// Append a live event pushed by the backend.
    pub fn push(&mut self, event: LogEvent) {
        if !self.contains(&event) {
            self.events.push(event);
        }
    }

    fn contains(&self, event: &LogEvent) -> bool {
        match &event.id {
            Some(id) => self.events.iter().any(|e| e.id.as_deref() == Some(id)),
            None => false,
        }
    }
}

/// Which log stream a feed follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    Leaf(String),
    Branch(String),
}

impl LogSource {
    fn request(&self, cursor: Option<&str>) -> CommandRequest {
        let request = match self {
            LogSource::Leaf(leaf_id) => {
                CommandRequest::new("get_leaf_logs").arg("leaf_id", leaf_id.as_str())
            }
            LogSource::Branch(name) => {
                CommandRequest::new("get_branch_logs").arg("name", name.as_str())
            }
        };
        match cursor {
            Some(cursor) => request.arg("last", cursor),
            None => request,
        }
    }

    /// Fetch the newest page.
    pub async fn load(&self, dispatcher: &Dispatcher) -> Result<LogFeed, ChannelError> {
        Ok(LogFeed::from_newest_first(self.fetch(dispatcher, None).await?))
    }

    /// Fetch the page before the feed's oldest event and prepend it.
    /// An empty feed has no cursor, so this loads the newest page instead.
    pub async fn load_older(
        &self,
        dispatcher: &Dispatcher,
        feed: &mut LogFeed,
    ) -> Result<usize, ChannelError> {
        let cursor = feed.oldest_id().map(str::to_string);
        let page = self.fetch(dispatcher, cursor.as_deref()).await?;
        Ok(feed.prepend_older(page))
    }

    async fn fetch(
        &self,
        dispatcher: &Dispatcher,
        cursor: Option<&str>,
    ) -> Result<Vec<LogEvent>, ChannelError> {
        let request = self.request(cursor);
        let function = request.function.clone();
        let response = dispatcher.send_ok(request).await?;
        response
            .field::<Vec<LogEvent>>("logs")
            .map(Option::unwrap_or_default)
            .map_err(|e| ChannelError::Decode {
                function,
                message: e.to_string(),
            })
    }
}

/// Render one log record the way the interactive shell prints it.
pub fn format_line(event: &LogEvent) -> String {
    let time = event_time(event);
    match event.log_type() {
        Some("leaf.event") => {
            let status = display_field(event, "status");
            let method = display_field(event, "method");
            let uri = display_field(event, "uri");
            match event.str_field("traceback") {
                Some(tb) if tb != "-" => {
                    format!("[{time}] {status} {method} - {uri} [ Traceback id: {tb} ]")
                }
                _ => format!("[{time}] {status} {method} - {uri}"),
            }
        }
        Some("leaf.stdout_stderr") => format!("[{time}] {}", display_field(event, "raw")),
        _ => serde_json::to_string(&event.fields).unwrap_or_default(),
    }
}

fn display_field(event: &LogEvent, key: &str) -> String {
    match event.fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

/// `time` as given, else `added` (Mongo `{"$date": millis}`, epoch millis,
/// or RFC 3339) rendered in local time.
fn event_time(event: &LogEvent) -> String {
    if let Some(time) = event.str_field("time") {
        return time.to_string();
    }
    let added = match event.fields.get("added") {
        Some(Value::Object(map)) => map.get("$date"),
        other => other,
    };
    let parsed: Option<DateTime<Utc>> = match added {
        Some(Value::Number(n)) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    };
    parsed
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::{Scripted, ScriptedTransport};
    use forest_common::CommandResponse;
    use serde_json::json;

    fn event(id: &str) -> LogEvent {
        serde_json::from_value(json!({"_id": id, "log_type": "leaf.stdout_stderr", "raw": id}))
            .unwrap()
    }

    fn ids(feed: &LogFeed) -> Vec<&str> {
        feed.events().iter().filter_map(|e| e.id.as_deref()).collect()
    }

    #[test]
    fn initial_page_is_reversed_to_chronological() {
        let feed = LogFeed::from_newest_first(vec![event("e5"), event("e4"), event("e3")]);
        assert_eq!(ids(&feed), vec!["e3", "e4", "e5"]);
        assert_eq!(feed.oldest_id(), Some("e3"));
    }

    #[test]
    fn older_page_is_prepended_oldest_first() {
        let mut feed = LogFeed::from_newest_first(vec![event("e5"), event("e4"), event("e3")]);
        let added = feed.prepend_older(vec![event("e2"), event("e1")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&feed), vec!["e1", "e2", "e3", "e4", "e5"]);
        assert_eq!(feed.oldest_id(), Some("e1"));
    }

    #[test]
    fn overlapping_page_skips_held_events() {
        let mut feed = LogFeed::from_newest_first(vec![event("e4"), event("e3")]);
        let added = feed.prepend_older(vec![event("e3"), event("e2")]);
        assert_eq!(added, 1);
        assert_eq!(ids(&feed), vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn push_appends_new_live_events() {
        let mut feed = LogFeed::default();
        assert!(feed.oldest_id().is_none());
        feed.push(event("e1"));
        feed.push(event("e1"));
        feed.push(event("e2"));
        assert_eq!(ids(&feed), vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn load_older_sends_oldest_id_as_cursor() {
        let transport = ScriptedTransport::new(vec![
            Scripted::Respond(
                CommandResponse::success().with("logs", json!([{"_id": "e4"}, {"_id": "e3"}])),
            ),
            Scripted::Respond(
                CommandResponse::success().with("logs", json!([{"_id": "e2"}, {"_id": "e1"}])),
            ),
        ]);
        let dispatcher = Dispatcher::new(transport.clone());
        let source = LogSource::Leaf("leaf-1".to_string());

        let mut feed = source.load(&dispatcher).await.unwrap();
        assert_eq!(ids(&feed), vec!["e3", "e4"]);

        let added = source.load_older(&dispatcher, &mut feed).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(ids(&feed), vec!["e1", "e2", "e3", "e4"]);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].function, "get_leaf_logs");
        assert!(sent[0].args.get("last").is_none());
        assert_eq!(sent[1].args["last"], "e3");
        assert_eq!(sent[1].args["leaf_id"], "leaf-1");
    }

    #[tokio::test]
    async fn domain_failure_surfaces_as_error() {
        let transport =
            ScriptedTransport::new(vec![Scripted::Respond(CommandResponse::failure("error"))]);
        let dispatcher = Dispatcher::new(transport);
        let err = LogSource::Branch("b1".to_string())
            .load(&dispatcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Domain { .. }));
    }

    #[test]
    fn format_request_line() {
        let event: LogEvent = serde_json::from_value(json!({
            "_id": "1",
            "log_type": "leaf.event",
            "time": "12:00:01",
            "status": 200,
            "method": "GET",
            "uri": "/index",
            "traceback": "-"
        }))
        .unwrap();
        assert_eq!(format_line(&event), "[12:00:01] 200 GET - /index");
    }

    #[test]
    fn format_request_line_with_traceback() {
        let event: LogEvent = serde_json::from_value(json!({
            "log_type": "leaf.event",
            "time": "12:00:01",
            "status": 500,
            "method": "POST",
            "uri": "/save",
            "traceback": "tb42"
        }))
        .unwrap();
        assert_eq!(
            format_line(&event),
            "[12:00:01] 500 POST - /save [ Traceback id: tb42 ]"
        );
    }

    #[test]
    fn format_stdout_line_and_fallback() {
        let event: LogEvent = serde_json::from_value(json!({
            "log_type": "leaf.stdout_stderr",
            "time": "12:00:02",
            "raw": "worker ready"
        }))
        .unwrap();
        assert_eq!(format_line(&event), "[12:00:02] worker ready");

        let other: LogEvent = serde_json::from_value(json!({"log_type": "branch.start"})).unwrap();
        assert_eq!(format_line(&other), r#"{"log_type":"branch.start"}"#);
    }

    #[test]
    fn missing_time_renders_dash() {
        let event: LogEvent =
            serde_json::from_value(json!({"log_type": "leaf.stdout_stderr", "raw": "x"})).unwrap();
        assert_eq!(format_line(&event), "[-] x");
    }
}
