use std::sync::Arc;

use anitorrent_core::{HandleError, ReloadFileResult};
use anitorrent_handle::{AddTorrentParams, HandleProxy, NativeEngine};
use anitorrent_test_support::fixtures::{engine, sample_hash, sample_info};
use anitorrent_test_support::mocks::RecordingEngine;
use anyhow::{Context, Result};

fn recording() -> Arc<RecordingEngine> {
    RecordingEngine::new(engine())
}

#[test]
fn started_handle_lives_until_destroyed() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));

    assert!(proxy.is_valid()?);
    proxy.post_status_updates()?;
    proxy.destroy()?;

    assert!(matches!(
        proxy.is_valid(),
        Err(HandleError::UseAfterRelease {
            operation: "is_valid"
        })
    ));
    assert_eq!(recording.inner().handle_count(), 0);
    Ok(())
}

#[test]
fn second_release_reports_not_owner() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));

    let owned = proxy.release()?;
    assert!(owned.address().is_some());
    assert!(matches!(
        proxy.release(),
        Err(HandleError::NotOwner { operation: "release" })
    ));
    assert!(!proxy.is_owner());
    assert_eq!(recording.inner().handle_count(), 1);
    Ok(())
}

#[test]
fn released_proxy_never_reaches_native() {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));
    let _owned = proxy.release().expect("release");
    let before = recording.total_calls();

    assert!(matches!(proxy.id(), Err(HandleError::UseAfterRelease { operation: "id" })));
    assert!(proxy.set_id(5).is_err());
    assert!(proxy.info_view().is_err());
    assert!(proxy.reload_file().is_err());
    assert!(proxy.state().is_err());
    assert!(proxy.post_save_resume().is_err());
    assert!(proxy.post_file_progress().is_err());
    assert!(proxy.set_piece_deadline(0, 10).is_err());
    assert!(proxy.reset_piece_deadline(0).is_err());
    assert!(proxy.add_tracker("udp://t.example:80", 0, 0).is_err());
    assert!(proxy.ignore_all_files().is_err());
    assert!(proxy.make_magnet_uri().is_err());

    assert_eq!(recording.total_calls(), before);
}

#[test]
fn double_destroy_calls_native_once() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));

    proxy.destroy()?;
    proxy.destroy()?;
    drop(proxy);

    assert_eq!(recording.count("destroy_handle"), 1);
    assert!(recording.calls_after_destroy().is_empty());
    Ok(())
}

#[test]
fn unadopted_release_destroys_on_drop() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));

    let owned = proxy.release()?;
    drop(proxy);
    assert_eq!(recording.count("destroy_handle"), 0);

    drop(owned);
    assert_eq!(recording.count("destroy_handle"), 1);
    assert_eq!(recording.inner().handle_count(), 0);
    Ok(())
}

#[test]
fn adopted_address_keeps_native_state() -> Result<()> {
    let recording = recording();
    let first = recording.start(AddTorrentParams::from_info(sample_info()));
    first.set_id(9)?;
    first.set_peer_endgame(true)?;
    let address = first.address().context("address")?;

    let second = HandleProxy::adopt(first.release()?);
    drop(first);

    assert_eq!(second.address(), Some(address));
    assert_eq!(second.id()?, 9);
    assert!(recording.inner().peer_endgame(address)?);
    drop(second);
    assert_eq!(recording.count("destroy_handle"), 1);
    Ok(())
}

#[test]
fn borrowed_proxy_outlives_nothing() -> Result<()> {
    let recording = recording();
    let owner = recording.start(AddTorrentParams::from_info(sample_info()));
    let engine: Arc<dyn NativeEngine> = recording.clone();
    let borrowed = HandleProxy::wrap(engine, owner.address().context("address")?);

    assert!(borrowed.is_valid()?);
    drop(borrowed);
    assert!(owner.is_valid()?);
    assert_eq!(recording.count("destroy_handle"), 0);

    owner.destroy()?;
    assert_eq!(recording.count("destroy_handle"), 1);
    Ok(())
}

#[test]
fn stale_address_through_borrowed_proxy() -> Result<()> {
    let recording = recording();
    let owner = recording.start(AddTorrentParams::from_info(sample_info()));
    let engine: Arc<dyn NativeEngine> = recording.clone();
    let borrowed = HandleProxy::wrap(engine, owner.address().context("address")?);
    owner.destroy()?;

    assert!(!borrowed.is_valid()?);
    assert!(matches!(
        borrowed.post_status_updates(),
        Err(HandleError::StaleAddress {
            operation: "post_status_updates"
        })
    ));
    // A slot reused by a new handle must not be reachable through the old address.
    let _fresh = recording.start(AddTorrentParams::from_info(sample_info()));
    assert!(!borrowed.is_valid()?);
    Ok(())
}

#[test]
fn address_from_another_engine_never_resolves() -> Result<()> {
    let theirs = engine();
    let foreign = HandleProxy::start(&theirs, AddTorrentParams::from_info(sample_info()))?;
    foreign.set_id(99)?;

    let recording = recording();
    let own = recording.start(AddTorrentParams::from_info(sample_info()));
    own.set_id(1234)?;
    assert_eq!(
        own.address().map(|address| address.index()),
        foreign.address().map(|address| address.index())
    );

    let engine: Arc<dyn NativeEngine> = recording.clone();
    let misdirected = HandleProxy::adopt(foreign.release()?);
    let borrowed = HandleProxy::wrap(engine, misdirected.address().context("address")?);
    assert!(matches!(
        borrowed.id(),
        Err(HandleError::StaleAddress { operation: "id" })
    ));
    assert!(!borrowed.is_valid()?);

    drop(borrowed);
    assert_eq!(own.id()?, 1234);
    assert!(own.is_valid()?);
    assert_eq!(misdirected.id()?, 99);
    Ok(())
}

#[test]
fn reload_on_detached_handle_is_null_handle() -> Result<()> {
    let recording = recording();
    let engine: Arc<dyn NativeEngine> = recording.clone();
    let proxy = HandleProxy::allocate(engine)?;

    assert!(!proxy.is_valid()?);
    let result = proxy.reload_file()?;
    assert_eq!(result, ReloadFileResult::NullHandle);
    assert!(matches!(
        result.into_result(),
        Err(HandleError::InvalidHandleOnReload)
    ));
    assert!(proxy.info_view()?.is_none());
    Ok(())
}

#[test]
fn reload_before_metadata_is_null_file() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(AddTorrentParams::magnet(sample_hash()).with_name("pending"));

    assert_eq!(proxy.reload_file()?, ReloadFileResult::NullFile);
    let address = proxy.address().context("address")?;
    recording.inner().set_metadata(address, sample_info())?;
    assert_eq!(proxy.reload_file()?, ReloadFileResult::Success);

    let view = proxy.info_view()?.context("info view")?;
    assert_eq!(view.name, "Sample Show");
    assert_eq!(view.total_size, 48);
    Ok(())
}

#[test]
fn mutators_reach_the_torrent() -> Result<()> {
    use anitorrent_core::{FilePriority, PieceDeadline};

    let recording = recording();
    let proxy = recording.start(AddTorrentParams::from_info(sample_info()));
    let address = proxy.address().context("address")?;
    let inner = recording.inner();

    proxy.set_piece_deadline(2, 500)?;
    proxy.set_piece_deadline(0, 100)?;
    proxy.reset_piece_deadline(2)?;
    assert_eq!(
        inner.piece_deadlines(address)?,
        vec![PieceDeadline {
            piece: 0,
            deadline_ms: 100
        }]
    );
    proxy.clear_piece_deadlines()?;
    assert!(inner.piece_deadlines(address)?.is_empty());

    proxy.ignore_all_files()?;
    proxy.set_file_priority(1, FilePriority::Top)?;
    assert_eq!(
        inner.file_priorities(address)?,
        vec![FilePriority::DontDownload, FilePriority::Top]
    );

    proxy.add_tracker("udp://tracker.example:6969/announce", 2, 5)?;
    let trackers = inner.trackers(address)?;
    assert_eq!(trackers.len(), 1);
    assert_eq!((trackers[0].tier, trackers[0].fail_limit), (2, 5));

    inner.pause(address)?;
    proxy.resume()?;
    assert!(!inner.is_paused(address)?);
    Ok(())
}

#[test]
fn magnet_uri_carries_hash_name_and_trackers() -> Result<()> {
    let recording = recording();
    let proxy = recording.start(
        AddTorrentParams::from_info(sample_info())
            .with_tracker("http://b.example/announce", 1)
            .with_tracker("udp://a.example:80", 0),
    );

    let uri = proxy.make_magnet_uri()?;
    assert_eq!(
        uri,
        format!(
            "magnet:?xt=urn:btih:{}&dn=Sample%20Show&tr=udp%3A%2F%2Fa.example%3A80&tr=http%3A%2F%2Fb.example%2Fannounce",
            sample_hash().to_hex()
        )
    );
    Ok(())
}
