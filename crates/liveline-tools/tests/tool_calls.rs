//! Tool handlers against a scripted fake Live
//!
//! Run with:
//! ```bash
//! cargo test -p liveline-tools --test tool_calls
//! ```

use liveline_osc::{
    MockTransport, OscClient, OscConfig, OscMessage, OscSession, SessionConfig, Value,
};
use liveline_samples::SampleLibrary;
use liveline_tools::{ToolContext, ToolRegistry, ToolResult};
use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeTrack {
    name: &'static str,
    midi: bool,
}

/// Just enough of a Live set to answer the addresses the tools use.
struct FakeLive {
    tracks: Vec<FakeTrack>,
    tempo: f64,
    loop_end: f64,
    insert_reply: Vec<Value>,
}

impl FakeLive {
    fn new() -> Self {
        Self {
            tracks: vec![
                FakeTrack { name: "Drums", midi: false },
                FakeTrack { name: "Bass", midi: true },
                FakeTrack { name: "Keys", midi: true },
            ],
            tempo: 120.0,
            loop_end: 4.0,
            insert_reply: vec![Value::Int(0), Value::Int(-1)],
        }
    }

    fn respond(&mut self, message: &OscMessage) -> Option<Vec<Value>> {
        let args = message.clone().into_values();
        let first = args.first().and_then(Value::as_i64).unwrap_or(0) as usize;

        let reply = match message.address.as_str() {
            "/live/test" => vec![Value::from("ok")],
            "/live/song/get/num_tracks" => vec![Value::from(self.tracks.len())],
            "/live/song/get/num_scenes" => vec![Value::Int(2)],
            "/live/song/get/tempo" => vec![Value::Float(self.tempo)],
            "/live/song/set/tempo" => {
                self.tempo = args.first()?.as_f64()?;
                vec![]
            }
            "/live/song/get/signature_numerator" | "/live/song/get/signature_denominator" => {
                vec![Value::Int(4)]
            }
            "/live/song/get/session_record_status" => vec![Value::Int(0)],
            "/live/song/delete_track" => {
                self.tracks.remove(first);
                vec![]
            }
            "/live/track/get/name" => vec![Value::from(self.tracks.get(first)?.name)],
            "/live/track/get/has_midi_input" => {
                let midi = Value::Int(self.tracks.get(first)?.midi as i64);
                vec![midi.clone(), midi.clone(), midi]
            }
            "/live/clip/get/loop_end" => {
                let mut reply = args.clone();
                reply.push(Value::Float(self.loop_end));
                reply
            }
            "/live/clip/set/loop_end" => {
                self.loop_end = args.get(2)?.as_f64()?;
                vec![]
            }
            "/live/track/insert_device" => self.insert_reply.clone(),
            // other getters echo their ids followed by zero
            address if address.contains("/get/") => {
                let mut reply = args.clone();
                reply.push(Value::Int(0));
                reply
            }
            // setters and actions acknowledge
            _ => vec![],
        };
        Some(reply)
    }
}

struct Harness {
    registry: ToolRegistry,
    mock: MockTransport,
    live: Arc<Mutex<FakeLive>>,
}

impl Harness {
    fn new(samples: SampleLibrary) -> Self {
        let mock = MockTransport::new();
        let live = Arc::new(Mutex::new(FakeLive::new()));
        let fake = Arc::clone(&live);
        mock.respond_with(move |message| fake.lock().respond(message));
        Self::with_mock(mock, live, SessionConfig::default(), samples)
    }

    fn with_mock(
        mock: MockTransport,
        live: Arc<Mutex<FakeLive>>,
        config: SessionConfig,
        samples: SampleLibrary,
    ) -> Self {
        let transport = mock.clone();
        let session = OscSession::with_factory(
            config,
            Arc::new(move |osc: &OscConfig| {
                OscClient::with_transport(osc.clone(), Box::new(transport.clone()))
            }),
        );
        let ctx = ToolContext::new(Arc::new(session), Arc::new(samples));
        Self {
            registry: ToolRegistry::new(Arc::new(ctx)),
            mock,
            live,
        }
    }

    async fn call(&self, name: &str, args: serde_json::Value) -> ToolResult {
        self.registry.call(name, &args).await
    }

    async fn call_json(&self, name: &str, args: serde_json::Value) -> serde_json::Value {
        let result = self.call(name, args).await;
        assert!(!result.is_error, "{} failed: {}", name, result.first_text());
        result.parse_json().unwrap()
    }

    fn addresses_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.mock
            .sent()
            .into_iter()
            .map(|m| m.address)
            .filter(|a| a.starts_with(prefix))
            .collect()
    }
}

fn harness() -> Harness {
    Harness::new(SampleLibrary::default())
}

// =============================================================================
// Status and connection
// =============================================================================

#[tokio::test]
async fn test_ableton_status_reports_ports() {
    let h = harness();
    let status = h.call_json("ableton_status", json!({})).await;
    assert_eq!(
        status,
        json!({
            "connected": true,
            "host": "127.0.0.1",
            "sendPort": 11001,
            "receivePort": 11000,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_fails_with_area_prefix() {
    let mock = MockTransport::new();
    let config = SessionConfig::default()
        .with_health_check_timeout(Duration::from_millis(50))
        .with_reconnect_backoff(Duration::from_millis(10))
        .with_max_reconnect_attempts(1);
    let h = Harness::with_mock(
        mock,
        Arc::new(Mutex::new(FakeLive::new())),
        config,
        SampleLibrary::default(),
    );

    let result = h.call("transport_get_tempo", json!({})).await;
    assert!(result.is_error);
    assert!(
        result.first_text().starts_with("TRANSPORT_ERROR: Lost connection to AbletonOSC"),
        "{}",
        result.first_text()
    );

    let status = h.call("ableton_status", json!({})).await;
    assert!(status.is_error);
    assert_eq!(
        status.first_text(),
        "CONNECTION_FAILED: Ableton not reachable on port 11001. Ensure Ableton Live is running with AbletonOSC."
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_waits_out_a_reconnect_in_progress() {
    let mock = MockTransport::new();
    let live = Arc::new(Mutex::new(FakeLive::new()));

    // the second probe goes unanswered, every other one succeeds
    let probes = Arc::new(AtomicUsize::new(0));
    let fake = Arc::clone(&live);
    let counter = Arc::clone(&probes);
    mock.respond_with(move |message| {
        if message.address == "/live/test" && counter.fetch_add(1, Ordering::SeqCst) == 1 {
            return None;
        }
        fake.lock().respond(message)
    });

    let config = SessionConfig::default()
        .with_health_check_timeout(Duration::from_millis(100))
        .with_reconnect_backoff(Duration::from_millis(10));
    let h = Harness::with_mock(mock, live, config, SampleLibrary::default());

    h.call_json("ableton_status", json!({})).await;
    let session = h.registry.context().session().clone();
    session.mark_unverified();

    // a tool call starts re-verifying, its probe is lost and it reconnects
    let registry = h.registry.clone();
    let tool = tokio::spawn(async move { registry.call("transport_get_tempo", &json!({})).await });
    h.mock.wait_for_sent(2).await;

    let status = h.call("ableton_status", json!({})).await;
    assert!(!status.is_error, "{}", status.first_text());
    assert_eq!(status.parse_json().unwrap()["connected"], json!(true));

    let tempo = tool.await.unwrap();
    assert!(!tempo.is_error, "{}", tempo.first_text());

    // initial status, the lost probe, the reconnect; status reused the result
    assert_eq!(h.mock.sent_to("/live/test").len(), 3);
    assert_eq!(session.verification_count(), 3);
}

// =============================================================================
// Read-only mode
// =============================================================================

#[tokio::test]
async fn test_read_only_blocks_writes_but_not_reads() {
    let h = harness();
    assert_eq!(
        h.call_json("set_read_only", json!({ "enabled": true })).await,
        json!({ "read_only": true })
    );

    let blocked = h.call("transport_play", json!({})).await;
    assert!(blocked.is_error);
    assert_eq!(
        blocked.first_text(),
        "READ_ONLY: Tool \"transport_play\" blocked. Read-only mode is active. Use set_read_only(false) to disable."
    );
    assert!(h.mock.sent_to("/live/song/start_playing").is_empty());

    let tempo = h.call_json("transport_get_tempo", json!({})).await;
    assert_eq!(tempo["tempo"], json!(120));

    h.call_json("set_read_only", json!({ "enabled": false })).await;
    h.call_json("transport_play", json!({})).await;
    assert_eq!(h.mock.sent_to("/live/song/start_playing").len(), 1);
}

// =============================================================================
// Transport and mixer
// =============================================================================

#[tokio::test]
async fn test_relative_tempo_change() {
    let h = harness();
    let snapshot = h.call_json("transport_set_tempo", json!({ "tempo": "+5" })).await;
    assert_eq!(snapshot["tempo"].as_f64(), Some(125.0));
    assert_eq!(snapshot["time_signature"], json!("4/4"));
    assert_eq!(snapshot["recording"], json!(false));
    assert_eq!(h.mock.sent_to("/live/song/set/tempo"), vec![vec![Value::Int(125)]]);

    let result = h.call("transport_set_tempo", json!({ "tempo": 5000 })).await;
    assert!(result.is_error);
    assert!(result.first_text().starts_with("TRANSPORT_ERROR: INVALID_TEMPO"));
    assert_eq!(h.live.lock().tempo, 125.0);
}

#[tokio::test]
async fn test_track_resolved_by_name() {
    let h = harness();
    h.call_json("mixer_set_mute", json!({ "track": "Bass", "muted": true })).await;
    assert_eq!(
        h.mock.sent_to("/live/track/set/mute"),
        vec![vec![Value::Int(1), Value::Int(1)]]
    );

    let result = h.call("mixer_set_mute", json!({ "track": "Nope", "muted": true })).await;
    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        "MIXER_ERROR: TRACK_NOT_FOUND: No track named \"Nope\""
    );

    let result = h.call("mixer_get_volume", json!({ "track": true })).await;
    assert_eq!(
        result.first_text(),
        "MIXER_ERROR: INVALID_TRACK: Expected number or string, got boolean"
    );
}

// =============================================================================
// Tracks
// =============================================================================

#[tokio::test]
async fn test_track_delete_requires_review_first() {
    let h = harness();

    let early = h.call("track_delete", json!({ "track": "Keys", "confirm": true })).await;
    assert!(early.is_error);
    assert!(early
        .first_text()
        .starts_with("TRACK_ERROR: No pending delete for track 2."));
    assert!(h.mock.sent_to("/live/song/delete_track").is_empty());

    let review = h.call_json("track_delete", json!({ "track": "Keys" })).await;
    assert_eq!(review["pending_delete"], json!(true));
    assert_eq!(review["track"]["name"], json!("Keys"));
    assert_eq!(review["track"]["type"], json!("midi"));

    let deleted = h
        .call_json("track_delete", json!({ "track": "Keys", "confirm": true }))
        .await;
    assert_eq!(
        deleted,
        json!({ "deleted": true, "track_index": 2, "track_name": "Keys" })
    );
    assert_eq!(h.mock.sent_to("/live/song/delete_track"), vec![vec![Value::Int(2)]]);
    assert_eq!(h.live.lock().tracks.len(), 2);
    assert!(h.registry.context().pending_delete(2).is_none());
}

// =============================================================================
// Clips
// =============================================================================

#[tokio::test]
async fn test_clip_create_needs_midi_track() {
    let h = harness();
    let result = h.call("clip_create", json!({ "track": 0, "scene": 0 })).await;
    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        "CLIP_ERROR: INVALID_TRACK: Track 0 is not a MIDI track. Can only create MIDI clips on MIDI tracks."
    );

    h.call_json("clip_create", json!({ "track": "Bass", "scene": 1, "name": "Line" }))
        .await;
    assert_eq!(
        h.mock.sent_to("/live/clip_slot/create_clip"),
        vec![vec![Value::Int(1), Value::Int(1), Value::Int(4)]]
    );
    assert_eq!(h.mock.sent_to("/live/clip/set/name").len(), 1);
}

#[tokio::test]
async fn test_large_note_batches_are_chunked() {
    let h = harness();
    let notes: Vec<_> = (0..150)
        .map(|i| json!({ "pitch": 60, "start_time": i as f64 * 0.25, "duration": 0.25 }))
        .collect();

    let result = h
        .call_json("clip_add_notes", json!({ "track": "Keys", "scene": 0, "notes": notes }))
        .await;
    assert_eq!(result["notes_added"], json!(150));

    let sends = h.mock.sent_to("/live/clip/add/notes");
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].len(), 2 + 100 * 5);
    assert_eq!(sends[1].len(), 2 + 50 * 5);
    assert_eq!(&sends[0][..3], &[Value::Int(2), Value::Int(0), Value::Int(60)]);

    h.mock.clear_sent();
    h.call_json(
        "clip_add_notes",
        json!({ "track": 2, "scene": 0, "notes": [{ "pitch": 64, "start_time": 0, "duration": 1, "velocity": 90 }] }),
    )
    .await;
    assert_eq!(h.mock.sent_to("/live/clip/add/notes").len(), 1);
}

#[tokio::test]
async fn test_invalid_note_names_its_index() {
    let h = harness();
    let result = h
        .call(
            "clip_add_notes",
            json!({ "track": 2, "scene": 0, "notes": [
                { "pitch": 60, "start_time": 0, "duration": 1 },
                { "pitch": 200, "start_time": 0, "duration": 1 }
            ] }),
        )
        .await;
    assert_eq!(
        result.first_text(),
        "CLIP_ERROR: INVALID_NOTE[1]: pitch must be integer 0-127, got 200"
    );
    assert!(h.mock.sent_to("/live/clip/add/notes").is_empty());
}

#[tokio::test]
async fn test_loop_points_move_in_safe_order() {
    let h = harness();

    // growing past the current end: end first
    h.call_json(
        "clip_set_loop",
        json!({ "track": 2, "scene": 0, "loop_start": 8.0, "loop_end": 16.0 }),
    )
    .await;
    assert_eq!(
        h.addresses_with_prefix("/live/clip/set/loop"),
        vec!["/live/clip/set/loop_end", "/live/clip/set/loop_start"]
    );

    // shrinking: start first
    h.mock.clear_sent();
    h.call_json(
        "clip_set_loop",
        json!({ "track": 2, "scene": 0, "loop_start": 0.0, "loop_end": 2.0, "looping": true }),
    )
    .await;
    assert_eq!(
        h.addresses_with_prefix("/live/clip/set/loop"),
        vec![
            "/live/clip/set/looping",
            "/live/clip/set/loop_start",
            "/live/clip/set/loop_end"
        ]
    );

    let missing = h.call("clip_set_loop", json!({ "track": 2, "scene": 0 })).await;
    assert_eq!(
        missing.first_text(),
        "CLIP_ERROR: MISSING_PARAMS: At least one of loop_start, loop_end, or looping must be provided."
    );
}

// =============================================================================
// Devices
// =============================================================================

#[tokio::test]
async fn test_device_load_reports_missing_device() {
    let h = harness();
    let result = h
        .call("device_load", json!({ "track": "Bass", "device_name": "Wavetabel" }))
        .await;
    assert!(result.is_error);
    assert!(result
        .first_text()
        .starts_with("DEVICE_ERROR: DEVICE_NOT_FOUND: No device matching \"Wavetabel\""));
    assert_eq!(
        h.mock.sent_to("/live/view/set/selected_track"),
        vec![vec![Value::Int(1)]]
    );

    h.live.lock().insert_reply = vec![Value::Int(1), Value::Int(2)];
    let device = h
        .call_json("device_load", json!({ "track": "Bass", "device_name": "Wavetable" }))
        .await;
    assert_eq!(device["track_index"], json!(1));
    assert_eq!(device["device_index"], json!(2));
}

#[tokio::test]
async fn test_device_toggle_without_device_on() {
    let h = harness();
    let result = h
        .call("device_toggle", json!({ "track": 1, "device": 0, "enabled": false }))
        .await;
    assert_eq!(
        result.first_text(),
        "DEVICE_ERROR: TOGGLE_UNSUPPORTED: Device has no \"Device On\" parameter and cannot be toggled via this API."
    );
}

// =============================================================================
// Samples
// =============================================================================

fn write_wav(path: &Path, frames: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        writer.write_sample((i % 32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[tokio::test]
async fn test_sample_tools_scan_search_and_load() {
    let samples = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(samples.path().join("Drums")).unwrap();
    write_wav(&samples.path().join("Drums/kick_punchy.wav"), 4410);

    let h = Harness::new(SampleLibrary::new(data.path().join("index.json")));

    let empty = h.call_json("sample_search", json!({})).await;
    assert_eq!(
        empty,
        json!({ "hint": "No samples indexed yet. Run sample_scan first." })
    );

    let root = samples.path().to_string_lossy().into_owned();
    let report = h
        .call_json("sample_scan", json!({ "directories": [root] }))
        .await;
    assert_eq!(report["status"], json!("complete"));
    assert_eq!(report["indexed"], json!(1));

    let found = h
        .call_json("sample_search", json!({ "instrument_type": "kick" }))
        .await;
    assert_eq!(found["result_count"], json!(1));
    let path = found["results"][0]["path"].as_str().unwrap().to_string();

    let loaded = h.call_json("sample_load", json!({ "path": path })).await;
    assert_eq!(loaded["filename"], json!("kick_punchy.wav"));
    assert_eq!(loaded["duration_ms"], json!(100));
    assert_eq!(
        loaded["instructions"],
        json!(format!("Drag this file into the desired Ableton track: {}", path))
    );

    let stats = h.call_json("sample_get_stats", json!({})).await;
    assert_eq!(stats["total_samples"], json!(1));
    assert_eq!(stats["scan_status"], json!({ "scanning": false }));

    let missing = h.call("sample_load", json!({ "path": "/nowhere.wav" })).await;
    assert_eq!(
        missing.first_text(),
        "SAMPLE_ERROR: SAMPLE_NOT_FOUND: Sample not in index. Run sample_search to find available samples."
    );

    // sample tools never talk to Live
    assert_eq!(h.mock.sent_count(), 0);
}
