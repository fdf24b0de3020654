use std::sync::Arc;

use crate::NoteSync;
use crate::local::Memory;
use crate::local::SharedLocalStore;
use crate::note::Partition;
use crate::remote::RemoteStore;
use crate::remote::RestClient;
use crate::tests::helper;

async fn setup_device(config: &crate::Config) -> NoteSync {
    let local: SharedLocalStore = Arc::new(Memory::new());

    let app = NoteSync::with_local_store(config, local).await.unwrap();
    app.notes.load().await.unwrap();

    app
}

#[tokio::test]
async fn test_notes_follow_the_account() {
    let config = helper::spawn_backend().await;

    let phone = setup_device(&config).await;
    phone.notes.add(helper::draft("Groceries")).await.unwrap();
    phone.notes.add(helper::private_draft("Diary")).await.unwrap();

    phone
        .auth
        .sign_up("someone@example.com", "verysecret")
        .await
        .unwrap();
    phone.notes.set_sync_enabled(true).await.unwrap();

    let tablet = setup_device(&config).await;
    tablet
        .auth
        .sign_in("someone@example.com", "verysecret")
        .await
        .unwrap();
    tablet.notes.set_sync_enabled(true).await.unwrap();

    let state = tablet.notes.snapshot();
    assert_eq!(1, state.notes.len());
    assert_eq!("Groceries", state.notes[0].title);
    assert_eq!(1, state.private_notes.len());
    assert_eq!("Diary", state.private_notes[0].title);

    // the phone notes kept their IDs
    assert_eq!(phone.notes.snapshot().notes, state.notes);
}

#[tokio::test]
async fn test_privacy_change_moves_document() {
    let config = helper::spawn_backend().await;

    let app = setup_device(&config).await;
    app.auth
        .sign_up("someone@example.com", "verysecret")
        .await
        .unwrap();
    app.notes.set_sync_enabled(true).await.unwrap();

    let note = app.notes.add(helper::draft("Salary")).await.unwrap();

    let moved = app
        .notes
        .edit(&note.id, helper::private_draft("Salary"))
        .await
        .unwrap();
    assert_eq!(note.id, moved.id);

    let remote = RestClient::new(&config, app.session.clone()).unwrap();
    assert!(remote.list(Partition::Public).await.unwrap().is_empty());
    assert_eq!(
        vec![moved.clone()],
        remote.list(Partition::Private).await.unwrap()
    );

    app.notes.refresh().await.unwrap();

    let state = app.notes.snapshot();
    assert!(state.notes.is_empty());
    assert_eq!(vec![moved], state.private_notes);
}

#[tokio::test]
async fn test_sign_out_keeps_local_copy() {
    let config = helper::spawn_backend().await;

    let app = setup_device(&config).await;
    let _watcher = app.start().await;

    app.auth
        .sign_up("someone@example.com", "verysecret")
        .await
        .unwrap();
    app.notes.set_sync_enabled(true).await.unwrap();
    app.notes.add(helper::draft("Mirrored")).await.unwrap();

    app.auth.sign_out().await.unwrap();
    app.notes.load().await.unwrap();

    let state = app.notes.snapshot();
    assert!(!state.signed_in);
    assert_eq!(1, state.notes.len());
    assert_eq!("Mirrored", state.notes[0].title);
}
