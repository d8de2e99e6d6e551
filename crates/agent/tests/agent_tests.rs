//! Integration tests for the agent's observer, log surface and console.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use printdeck_agent::console::{Console, ConsoleCommand};
use printdeck_agent::observer::{classify, JobChange};
use printdeck_agent::surface;
use printdeck_core::{
    normalize, FilamentProfile, GatewayError, JobSnapshot, NormalizeContext, PrinterState,
    RawJobStatus,
};
use printdeck_events::NotificationCenter;
use printdeck_octoprint::{
    Command, CommandDispatcher, ConfigProvider, EnvConfig, FileBrowser, Gateway, JobPoller,
};
use serde_json::{json, Value};

fn snapshot(state: &str, name: &str, filepos: u64) -> JobSnapshot {
    let raw: RawJobStatus = serde_json::from_value(json!({
        "state": state,
        "job": { "file": { "name": name, "size": 100 } },
        "progress": { "filepos": filepos }
    }))
    .expect("valid payload");
    normalize(&raw, &NormalizeContext::now(FilamentProfile::default())).expect("job loaded")
}

// ---------------------------------------------------------------------------
// Test: observer change classification
// ---------------------------------------------------------------------------

#[test]
fn classify_job_changes() {
    let printing = snapshot("Printing", "benchy.gcode", 10);
    let further = snapshot("Printing", "benchy.gcode", 40);
    let paused = snapshot("Paused", "benchy.gcode", 40);
    let other = snapshot("Printing", "clip.gcode", 40);

    assert_eq!(classify(None, None), JobChange::Unchanged);
    assert_eq!(classify(None, Some(&printing)), JobChange::Loaded);
    assert_eq!(classify(Some(&printing), None), JobChange::Cleared);
    assert_eq!(classify(Some(&printing), Some(&further)), JobChange::Progressed(40));
    assert_eq!(
        classify(Some(&further), Some(&paused)),
        JobChange::StatusChanged {
            from: PrinterState::Printing,
            to: PrinterState::Paused,
        }
    );
    assert_eq!(classify(Some(&paused), Some(&other)), JobChange::Loaded);
    assert_eq!(classify(Some(&paused), Some(&paused.clone())), JobChange::Unchanged);
}

// ---------------------------------------------------------------------------
// Test: log surface
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn surface_counts_shown_notifications() {
    let center = NotificationCenter::default();
    let task = tokio::spawn(surface::run(center.attach_surface()));

    let _a = center.error("Can't cancel Job!", "There is no running job");
    let _b = center.info("Print finished", "benchy");
    center.dismiss();
    drop(center);

    assert_eq!(task.await.expect("surface task"), 2);
}

// ---------------------------------------------------------------------------
// Test: console actions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingGateway {
    posts: Mutex<Vec<String>>,
    gets: Mutex<Vec<String>>,
    get_delay: Option<Duration>,
}

#[async_trait::async_trait]
impl Gateway for RecordingGateway {
    async fn get_json(&self, path: &str) -> Result<Value, GatewayError> {
        self.gets.lock().unwrap().push(path.to_string());
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        Err(GatewayError::http(404, "OctoPrint API error (404): Not Found"))
    }

    async fn post(&self, path: &str, _body: Value) -> Result<(), GatewayError> {
        self.posts.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

fn console(gateway: Arc<RecordingGateway>) -> Console {
    let config = Arc::new(EnvConfig::new("http://octopi.local/api/", "key").unwrap());
    let notifications = NotificationCenter::default();
    let poller = JobPoller::new(gateway.clone(), config.clone(), notifications.clone());
    Console {
        config: config.clone(),
        dispatcher: CommandDispatcher::with_poller(
            gateway.clone(),
            notifications.clone(),
            poller.clone(),
        ),
        files: FileBrowser::new(gateway, config, notifications.clone()),
        poller,
        notifications,
    }
}

#[tokio::test(start_paused = true)]
async fn console_changes_interval_and_mute() {
    let console = console(Arc::new(RecordingGateway::default()));

    console
        .execute(ConsoleCommand::Interval(Duration::from_millis(750)))
        .await;
    assert_eq!(console.config.polling_interval(), Duration::from_millis(750));

    console.execute(ConsoleCommand::Mute).await;
    assert!(console.notifications.is_muted());
    assert!(console.config.notifications_muted());

    console.execute(ConsoleCommand::Unmute).await;
    assert!(!console.notifications.is_muted());
}

#[tokio::test(start_paused = true)]
async fn console_runs_lines_until_eof() {
    let gateway = Arc::new(RecordingGateway::default());
    let console = console(gateway.clone());

    let input: &[u8] = b"preheat\n\nbogus\nselect /parts/clip.gcode\n";
    console.clone().run(input).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let posts = gateway.posts.lock().unwrap().clone();
    assert_eq!(posts, ["plugin/preheat", "files/local/parts/clip.gcode"]);

    // A cancel clears the job feed.
    console.execute(ConsoleCommand::Printer(Command::Cancel)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(console.poller.latest(), Some(None));
}

#[tokio::test(start_paused = true)]
async fn missing_root_folder_is_logged_not_fatal() {
    let console = console(Arc::new(RecordingGateway::default()));
    console.execute(ConsoleCommand::List("/".into())).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        console.notifications.visible().map(|v| v.heading),
        None,
        "no surface attached, the notification is parked"
    );

    let mut surface = console.notifications.attach_surface();
    let event = surface.try_recv().expect("parked notification delivered");
    assert!(matches!(
        event,
        printdeck_events::SurfaceEvent::Show(ref v) if v.heading == "Can't find specified folder!"
    ));
}

#[tokio::test(start_paused = true)]
async fn newer_listing_supersedes_pending_one() {
    let gateway = Arc::new(RecordingGateway {
        get_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let console = console(gateway.clone());
    let mut surface = console.notifications.attach_surface();

    console.execute(ConsoleCommand::List("/parts".into())).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    console.execute(ConsoleCommand::List("/".into())).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        *gateway.gets.lock().unwrap(),
        ["files/local/parts", "files/local"]
    );
    // Only the surviving listing reports its missing folder.
    let shown: Vec<_> = std::iter::from_fn(|| surface.try_recv().ok())
        .filter_map(|event| match event {
            printdeck_events::SurfaceEvent::Show(view) => Some(view.heading),
            printdeck_events::SurfaceEvent::Close => None,
        })
        .collect();
    assert_eq!(shown, ["Can't find specified folder!"]);
}
