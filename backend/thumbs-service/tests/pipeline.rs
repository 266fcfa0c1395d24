//! End-to-end behaviour of the consumer and worker against in-memory
//! storage, repository and publisher.

mod common;

use common::{jpeg_bytes, FailingAt, Harness, RefusingStore, COMPLETION_EXCHANGE};
use image::GenericImageView;
use object_storage::{InMemoryObjectStore, ObjectStore};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use thumbs_service::models::{InboundMessage, OutboundMessage, ThumbnailRef, ThumbnailRequest};
use thumbs_service::services::thumbnail::{
    ConsumeError, MessageHandler, ThumbnailConsumer, ThumbnailProcessor, WorkerError,
};

fn refs(names: &[(&str, u32)]) -> Vec<ThumbnailRef> {
    names
        .iter()
        .map(|(filename, dimension)| ThumbnailRef {
            filename: filename.to_string(),
            dimension: *dimension,
        })
        .collect()
}

#[tokio::test]
async fn test_upload_produces_thumbnails_record_and_completion() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100, 400])));

    assert_ok!(consumer.handle(InboundMessage::new("photo123.jpg")).await);

    assert_eq!(
        harness.thumbs.keys(),
        vec!["photo123_100.jpg".to_string(), "photo123_400.jpg".to_string()]
    );

    let small = harness
        .thumbs
        .get("photo123_100.jpg")
        .await
        .unwrap();
    assert_eq!(small.content_type(), Some("image/jpeg"));
    let small = image::load_from_memory(&small.collect().await.unwrap()).unwrap();
    assert_eq!(small.dimensions(), (100, 75));

    let records = harness.repository.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "photo123.jpg");
    assert_eq!(
        records[0].thumbnails,
        refs(&[("photo123_100.jpg", 100), ("photo123_400.jpg", 400)])
    );

    let published = harness.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, COMPLETION_EXCHANGE);
    let message: OutboundMessage = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(message.filename, "photo123.jpg");
    assert_eq!(message.thumbnails, records[0].thumbnails);
}

#[tokio::test]
async fn test_bucket_notification_with_encoded_key() {
    let harness = Harness::new();
    harness.photos.insert("summer trip/beach.png", jpeg_bytes(200, 400));
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let payload = br#"{
        "EventName": "s3:ObjectCreated:Put",
        "Records": [{"eventName": "s3:ObjectCreated:Put", "s3": {"object": {"key": "summer+trip%2Fbeach.png"}}}]
    }"#;
    let messages = InboundMessage::decode(payload).unwrap();
    assert_eq!(messages.len(), 1);
    for message in messages {
        assert_ok!(consumer.handle(message).await);
    }

    assert_eq!(harness.thumbs.keys(), vec!["summer trip/beach_100.png".to_string()]);
    let thumb = harness.thumbs.get("summer trip/beach_100.png").await.unwrap();
    assert_eq!(thumb.content_type(), Some("image/png"));
}

#[tokio::test]
async fn test_notification_with_several_records_processes_each_photo() {
    let harness = Harness::new();
    harness.photos.insert("a.jpg", jpeg_bytes(300, 300));
    harness.photos.insert("b.jpg", jpeg_bytes(640, 480));
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let payload = br#"{"Records":[
        {"eventName":"s3:ObjectCreated:Put","s3":{"object":{"key":"a.jpg"}}},
        {"eventName":"s3:ObjectCreated:Put","s3":{"object":{"key":"b.jpg"}}}
    ]}"#;
    for message in InboundMessage::decode(payload).unwrap() {
        assert_ok!(consumer.handle(message).await);
    }

    assert_eq!(
        harness.thumbs.keys(),
        vec!["a_100.jpg".to_string(), "b_100.jpg".to_string()]
    );
    let mut recorded: Vec<String> = harness
        .repository
        .records()
        .into_iter()
        .map(|r| r.filename)
        .collect();
    recorded.sort();
    assert_eq!(recorded, vec!["a.jpg", "b.jpg"]);
    assert_eq!(harness.publisher.published().len(), 2);
}

#[tokio::test]
async fn test_replay_overwrites_instead_of_duplicating() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100, 400])));

    for _ in 0..2 {
        assert_ok!(consumer.handle(InboundMessage::new("photo123.jpg")).await);
    }

    assert_eq!(harness.thumbs.len(), 2);
    let records = harness.repository.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].thumbnails.len(), 2);
    assert_eq!(harness.repository.save_count(), 2);
    // At-least-once: each successful run announces completion.
    assert_eq!(harness.publisher.published().len(), 2);
}

#[tokio::test]
async fn test_transform_failure_stores_and_records_nothing() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    let processor = Arc::new(FailingAt {
        dimension: 400,
        inner: ThumbnailProcessor::default(),
    });
    let worker = harness.worker_with(&[100, 400], processor, Arc::new(harness.thumbs.clone()));

    let err = worker
        .process(&ThumbnailRequest::new("photo123.jpg", &[100, 400]))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Transform { .. }));
    assert!(harness.thumbs.is_empty());
    assert!(harness.repository.records().is_empty());
    assert!(harness.publisher.published().is_empty());
}

#[tokio::test]
async fn test_undecodable_source_is_a_transform_failure() {
    let harness = Harness::new();
    harness.photos.insert("notes.jpg", &b"plain text, not a photo"[..]);
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let err = consumer
        .handle(InboundMessage::new("notes.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConsumeError::Worker(WorkerError::Transform { .. })
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_source_fails_fetch() {
    let harness = Harness::new();
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let err = consumer
        .handle(InboundMessage::new("ghost.jpg"))
        .await
        .unwrap_err();

    match err {
        ConsumeError::Worker(WorkerError::SourceFetch { filename, source }) => {
            assert_eq!(filename, "ghost.jpg");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.repository.records().is_empty());
}

#[tokio::test]
async fn test_store_failure_leaves_no_record() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    let thumbs = InMemoryObjectStore::new("thumbs");
    let store = Arc::new(RefusingStore {
        key: "photo123_400.jpg".to_string(),
        inner: thumbs.clone(),
    });
    let worker = harness.worker_with(&[100, 400], Arc::new(ThumbnailProcessor::default()), store);

    let err = worker
        .process(&ThumbnailRequest::new("photo123.jpg", &[100, 400]))
        .await
        .unwrap_err();

    match err {
        WorkerError::Storage { key, .. } => assert_eq!(key, "photo123_400.jpg"),
        other => panic!("unexpected error: {other}"),
    }
    // The first variant is orphaned, never referenced.
    assert_eq!(thumbs.keys(), vec!["photo123_100.jpg".to_string()]);
    assert!(harness.repository.records().is_empty());
    assert!(harness.publisher.published().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_skips_publish() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    harness.repository.fail_saves();
    let worker = harness.worker(&[100]);

    let err = worker
        .process(&ThumbnailRequest::new("photo123.jpg", &[100]))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Persistence { .. }));
    assert!(harness.publisher.published().is_empty());
}

#[tokio::test]
async fn test_publish_failure_keeps_record() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    harness.publisher.fail_publishes();
    let worker = harness.worker(&[100]);

    let outcome = worker
        .process(&ThumbnailRequest::new("photo123.jpg", &[100]))
        .await
        .unwrap();

    assert!(!outcome.published);
    assert_eq!(outcome.message.filename, "photo123.jpg");
    assert_eq!(harness.repository.records().len(), 1);
}

#[tokio::test]
async fn test_empty_filename_is_rejected() {
    let harness = Harness::new();
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let err = assert_err!(consumer.handle(InboundMessage::new("  ")).await);

    assert!(matches!(err, ConsumeError::InvalidMessage(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_non_upload_event_is_skipped() {
    let harness = Harness::new();
    harness.photos.insert("photo123.jpg", jpeg_bytes(800, 600));
    let consumer = ThumbnailConsumer::new(Arc::new(harness.worker(&[100])));

    let payload = br#"{"EventName":"s3:ObjectRemoved:Delete","Records":[{"s3":{"object":{"key":"photo123.jpg"}}}]}"#;
    for message in InboundMessage::decode(payload).unwrap() {
        assert_ok!(consumer.handle(message).await);
    }

    assert!(harness.thumbs.is_empty());
    assert!(harness.repository.records().is_empty());
}
