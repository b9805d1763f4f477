//! Publish against the SQLite document store and the filesystem blob store.

use std::sync::Arc;

use shared_types::{FieldTarget, FIELD_UPDATED_AT, FIELD_UPDATED_BY};
use site_editor::backends::{
    FsBlobStore, ObjectUrlRegistry, SqliteDocumentStore, StaticAuthorization,
};
use site_editor::validation::UploadPolicy;
use site_editor::{
    EditSession, EditSessionArguments, ImageField, PublishOutcome, TextField, UploadPayload,
};
use tempfile::TempDir;

async fn session(dir: &TempDir) -> (EditSession, SqliteDocumentStore) {
    let documents = SqliteDocumentStore::in_memory().await.unwrap();
    let session = EditSession::new(EditSessionArguments {
        authorization: Arc::new(StaticAuthorization::editor("editor@example.org")),
        documents: Arc::new(documents.clone()),
        blobs: Arc::new(FsBlobStore::new(dir.path(), "/media")),
        previews: Arc::new(ObjectUrlRegistry::new()),
        upload_policy: UploadPolicy::default(),
    });
    (session, documents)
}

#[tokio::test]
async fn test_publish_writes_document_and_blob() {
    let dir = TempDir::new().unwrap();
    let (session, documents) = session(&dir).await;

    let title = TextField::new(FieldTarget::new("content", "about-story", "title"), "Story");
    title.edit(&session, "Our story");
    let mut image = ImageField::new(FieldTarget::new("content", "about-story", "image"), "");
    image
        .pick_file(
            &session,
            UploadPayload::new("story photo.png", "image/png", vec![0x89u8, b'P', b'N', b'G']),
        )
        .unwrap();

    let outcome = session.publish().await.unwrap();
    assert!(matches!(outcome, PublishOutcome::Published(_)));

    let record = documents
        .fetch("content", "about-story")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.fields["title"], "Our story");
    assert_eq!(record.fields[FIELD_UPDATED_BY], "editor@example.org");
    assert!(record.fields.contains_key(FIELD_UPDATED_AT));
    assert_eq!(record.updated_by.as_deref(), Some("editor@example.org"));

    let url = record.fields["image"].as_str().unwrap();
    let address = url.strip_prefix("/media/").unwrap();
    assert!(address.ends_with("-story_photo.png"));
    let stored = std::fs::read(dir.path().join(address)).unwrap();
    assert_eq!(stored, vec![0x89u8, b'P', b'N', b'G']);

    assert_eq!(session.count(), 0);
    assert_eq!(image.display_url(&session), "");
}

#[tokio::test]
async fn test_second_publish_merges_into_existing_document() {
    let dir = TempDir::new().unwrap();
    let (session, documents) = session(&dir).await;

    TextField::new(FieldTarget::new("content", "home-hero", "title"), "")
        .edit(&session, "Welcome");
    TextField::new(FieldTarget::new("content", "home-hero", "subtitle"), "")
        .edit(&session, "Since 1987");
    session.publish().await.unwrap();

    TextField::new(FieldTarget::new("content", "home-hero", "title"), "Welcome")
        .edit(&session, "Hello");
    session.publish().await.unwrap();

    let record = documents.fetch("content", "home-hero").await.unwrap().unwrap();
    assert_eq!(record.fields["title"], "Hello");
    assert_eq!(record.fields["subtitle"], "Since 1987");
}
