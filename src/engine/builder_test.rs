use super::*;
use crate::test_utils::secret;
use crate::test_utils::RecordingReconciler;
use crate::EngineConfig;
use crate::Error;
use crate::EventKind;
use crate::InMemorySource;

#[test]
fn build_freezes_registered_watches() {
    let engine = EngineBuilder::new(RecordingReconciler::new(), EngineConfig::default())
        .add_watch(InMemorySource::new().with_objects(vec![secret("a", "ns")]), &[])
        .add_named_watch("secrets-updates", InMemorySource::new().with_objects(vec![secret("b", "ns")]), &[
            EventKind::Update,
        ])
        .build()
        .unwrap();

    let names: Vec<&str> = engine.informers.iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["Secret-0", "secrets-updates"]);
    assert_eq!(engine.state(), EngineState::NotStarted);
    assert!(engine.queue().is_empty());
}

#[test]
fn build_rejects_invalid_config() {
    let mut config = EngineConfig::default();
    config.queue.qps = 0.0;

    let result = EngineBuilder::new(RecordingReconciler::new(), config).build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn watch_count_tracks_registrations() {
    let builder = EngineBuilder::new(RecordingReconciler::new(), EngineConfig::default());
    assert_eq!(builder.watch_count(), 0);

    let source = InMemorySource::<crate::test_utils::Secret>::new();
    let builder = builder.add_watch(source.clone(), &[]).add_watch(source, &[EventKind::Delete]);
    assert_eq!(builder.watch_count(), 2);
}
