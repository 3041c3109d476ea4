//! Integration tests for logging and event plumbing

use bridge_traits::time::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, EventStream, ImportEvent, ImportSummary};
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.logger_sink.is_none());
    assert!(config.filter.is_none());

    let json = config.with_format(LogFormat::Compact);
    assert_eq!(json.format, LogFormat::Compact);
}

#[test]
fn test_remote_options_are_redacted() {
    let options = [
        ("connectionString", "DefaultEndpointsProtocol=https;AccountName=x;AccountKey=y"),
        ("serviceAccountKey", "{\"private_key\": \"-----BEGIN\"}"),
        ("container", "camera-roll"),
    ];

    let rendered: Vec<String> = options
        .iter()
        .map(|(k, v)| redact_if_sensitive(k, v))
        .collect();

    assert_eq!(rendered[0], "[REDACTED]");
    assert_eq!(rendered[1], "[REDACTED]");
    assert_eq!(rendered[2], "camera-roll");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/Volumes/SD/DCIM/100CANON/IMG_1234.CR2"), "IMG_1234.CR2");
    assert_eq!(strip_path("D:\\DCIM\\MVI_0001.MOV"), "MVI_0001.MOV");
}

#[tokio::test]
async fn test_terminal_event_reaches_filtered_stream() {
    let bus = EventBus::new(8);
    let mut stream = EventStream::new(bus.subscribe())
        .filter(|event| matches!(event, CoreEvent::Import(e) if e.is_terminal()));

    bus.emit(CoreEvent::Import(ImportEvent::Log {
        job_id: "job-1".to_string(),
        message: "Copying".to_string(),
    }))
    .unwrap();
    bus.emit(CoreEvent::Import(ImportEvent::Completed {
        result: ImportSummary {
            job_id: "job-1".to_string(),
            phase: "completed".to_string(),
            ..Default::default()
        },
    }))
    .unwrap();

    let event = stream.recv().await.unwrap();
    assert_eq!(event.job_id(), Some("job-1"));
    assert_eq!(event.description(), "Import completed");
}
