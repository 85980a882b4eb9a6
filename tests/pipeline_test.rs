use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use wireslack::config::SinkConfig;
use wireslack::{DispatchError, Message, NotificationSink, Relay, Settings};

#[derive(Default)]
struct CollectingSink {
    sent: Mutex<Vec<Message>>,
}

impl CollectingSink {
    fn messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

const HEADER: &str = "<html><head><title>Node Log</title></head><br>\
NODE: <b>HB9TF-ND , HB9TF(12345) </b><br>";

const NODES: &str = r#"<p class="t"><span>Update every 20 minutes</span> <span>01 Jan 2099 09:00:00 UTC</span></p>
dataList[0] = {id:"ALPHA", dtmf_id:"111", call_sign:"AL1PHA", ana_dig:"DN", city:"Springfield", state:"IL", country:"US", freq:"145.500", sql:"CSQ", lat:"", lon:"", comment:"Hello"};"#;

fn settings(targets: Vec<String>) -> Settings {
    let mut settings = Settings {
        targets,
        poll_interval_secs: 1,
        sink: SinkConfig {
            webhook: "https://hooks.slack.invalid/T000".to_string(),
            ..SinkConfig::default()
        },
        ..Settings::default()
    };
    settings.directory.enabled = false;
    settings
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_file_target_delivers_each_event_once() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("node.html");
    // Dated far ahead so they are after the processor's start time.
    std::fs::write(
        &log,
        format!(
            "{HEADER}\
             2099/01/01 10:00:00  *-*-* Call Start *-*-*<br>\
             2099/01/01 10:00:05  Browser connected from 10.0.0.7<br>\
             2099/01/01 10:01:00  *-*-* Call End *-*-*<br>"
        ),
    )
    .unwrap();

    let sink = Arc::new(CollectingSink::default());
    let relay = Relay::with_sink(settings(vec![file_url(&log)]), sink.clone()).unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(relay.run(shutdown.clone()));

    assert!(wait_for(|| sink.messages().len() >= 2).await);
    // Let at least one more poll of the unchanged page happen.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    shutdown.cancel();
    let summary = handle.await.unwrap();

    let texts: Vec<String> = sink.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(
        texts,
        vec![
            "HB9TF-ND, HB9TF(12345): Call Start",
            "HB9TF-ND, HB9TF(12345): Call End",
        ]
    );
    assert_eq!(summary.pollers, 1);
    assert!(summary.snapshots >= 2);
}

#[tokio::test]
async fn test_events_are_enriched_from_file_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("node.html");
    let nodes = temp_dir.path().join("active_node.html");
    std::fs::write(&log, HEADER).unwrap();
    std::fs::write(&nodes, NODES).unwrap();

    let mut settings = settings(vec![file_url(&log)]);
    settings.directory.enabled = true;
    settings.directory.nodes_url = file_url(&nodes);
    settings.directory.rooms_url = None;

    let sink = Arc::new(CollectingSink::default());
    let relay = Relay::with_sink(settings, sink.clone()).unwrap();
    let directory = relay.directory().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(relay.run(shutdown.clone()));

    assert!(wait_for(|| directory.current().is_some()).await);
    std::fs::write(
        &log,
        format!("{HEADER}2099/01/01 10:00:00  *-*-* Connected to ALPHA(111). *-*-*<br>"),
    )
    .unwrap();

    assert!(wait_for(|| !sink.messages().is_empty()).await);
    shutdown.cancel();
    handle.await.unwrap();

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    let attachment = &messages[0].attachments[0];
    assert_eq!(attachment.title.as_deref(), Some("ALPHA (DN)"));
    assert_eq!(attachment.color.as_deref(), Some("good"));
    let body = attachment.text.as_deref().unwrap();
    assert!(body.contains("Location: Springfield, IL, US"));
    assert!(body.contains("Frequency: 145.500 (CSQ)"));
    assert_eq!(
        attachment.footer.as_deref(),
        Some("Node Log | 2099-01-01 10:00:00")
    );
}

#[tokio::test]
async fn test_unreachable_target_does_not_stop_others() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("room.html");
    std::fs::write(
        &log,
        format!("{HEADER}2099/01/01 10:00:00  HB9TF-ND(12345) IN.<br>"),
    )
    .unwrap();

    let targets = vec![
        file_url(&temp_dir.path().join("missing.html")),
        "gopher://example.invalid/".to_string(),
        file_url(&log),
    ];
    let sink = Arc::new(CollectingSink::default());
    let relay = Relay::with_sink(settings(targets), sink.clone()).unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(relay.run(shutdown.clone()));

    assert!(wait_for(|| !sink.messages().is_empty()).await);
    shutdown.cancel();
    let summary = handle.await.unwrap();

    assert_eq!(summary.pollers, 2);
    assert_eq!(summary.rejected_targets, 1);
    assert_eq!(sink.messages()[0].text, "HB9TF-ND, HB9TF(12345): HB9TF-ND(12345) IN.");
}
