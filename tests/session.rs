mod common;

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8Path;

use boxart::app::{App, BatchAction, SessionEvent};
use boxart::coordinator::Coordinator;
use boxart::domain::{CacheKey, CanonicalTitle, ImageCandidate, SourceConfig, SourceId};
use boxart::error::BoxartError;
use boxart::persist::Persister;
use boxart::providers::CoverSource;
use boxart::session::{SearchOptions, SearchOutcome, SessionState};
use boxart::store::Store;

use common::{MockSource, MockTransport, RecordingSink, ok, platform, status, temp_store};

const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";
const PNG: &[u8] = b"\x89PNGfake-png";

fn app(store: Store, sources: Vec<Arc<dyn CoverSource>>, transport: Arc<MockTransport>) -> App {
    App::with_coordinator(store, Coordinator::new(sources), transport)
}

fn file_names(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.as_std_path())
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn images_transport() -> Arc<MockTransport> {
    Arc::new(
        MockTransport::new()
            .route("img.example/sonic.jpg", ok("image/jpeg", JPEG))
            .route("img.example/sonic.png", ok("image/png", PNG))
            .route("img.example/missing.jpg", status(404))
            .route("img.example/page.jpg", ok("text/html; charset=utf-8", "<html></html>")),
    )
}

#[test]
fn cached_artwork_short_circuits_search() {
    let (_temp, store) = temp_store("genesis");
    let images = store.ensure_images_dir(&platform("genesis")).unwrap();
    fs::write(images.join("Sonic The Hedgehog.png"), PNG).unwrap();

    let source = Arc::new(MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"]));
    let transport = images_transport();
    let app = app(store, vec![source.clone() as Arc<dyn CoverSource>], transport.clone());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic_The Hedgehog.zip");
    let outcome = session
        .search(&SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();

    assert_eq!(
        outcome,
        SearchOutcome::Cached(images.join("Sonic The Hedgehog.png"))
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(source.calls(), 0);
    assert_eq!(transport.calls(), 0);
    assert!(sink.events().is_empty());
}

#[test]
fn search_then_select_stores_artwork() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(MockSource::returning(
        SourceId::Uvlist,
        &["https://img.example/sonic.jpg", "https://img.example/sonic.png"],
    ));
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic_The Hedgehog.md");
    let outcome = session
        .search(&SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();
    let candidates = match outcome {
        SearchOutcome::Candidates(candidates) => candidates,
        other => panic!("expected candidates, got {other:?}"),
    };
    assert_eq!(candidates.len(), 2);
    assert_eq!(session.state(), SessionState::Presenting);
    assert_eq!(session.candidates(), candidates.as_slice());

    let update = session.select(&candidates[0], &sink).unwrap();

    assert!(update.path.ends_with("images/Sonic The Hedgehog.jpg"));
    assert_eq!(update.platform, "genesis");
    assert_eq!(update.title, "Sonic The Hedgehog");
    assert!(!update.cache_buster.is_empty());
    assert_eq!(fs::read(&update.path).unwrap(), JPEG);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.lookup().map(|path| path.into_string()), Some(update.path.clone()));

    let events = sink.events();
    assert_matches!(
        &events[0],
        SessionEvent::Searching { sources, .. } if sources == &vec![SourceId::Uvlist]
    );
    assert_matches!(&events[1], SessionEvent::Presenting { count: 2, .. });
    assert_matches!(&events[2], SessionEvent::ArtworkUpdated(stored) if stored == &update);
}

#[test]
fn failed_download_leaves_cache_untouched() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(MockSource::returning(
        SourceId::Commons,
        &["https://img.example/missing.jpg", "https://img.example/sonic.png"],
    ));
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic The Hedgehog");
    session
        .search(&SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();
    let candidates = session.candidates().to_vec();

    let err = session.select(&candidates[0], &sink).unwrap_err();

    assert_matches!(err, BoxartError::DownloadStatus { status: 404, .. });
    assert!(err.is_download());
    assert!(session.lookup().is_none());
    assert_eq!(session.state(), SessionState::Presenting);
    assert_matches!(sink.events().last(), Some(SessionEvent::PersistFailed { .. }));
    let images = app.store().images_dir(&platform("genesis")).unwrap();
    assert!(file_names(&images).is_empty());

    let update = session.select(&candidates[1], &sink).unwrap();
    assert!(update.path.ends_with("images/Sonic The Hedgehog.png"));
}

#[test]
fn failed_replacement_keeps_existing_artwork() {
    let (_temp, store) = temp_store("genesis");
    let images = store.ensure_images_dir(&platform("genesis")).unwrap();
    fs::write(images.join("Sonic.png"), PNG).unwrap();
    let source = Arc::new(MockSource::returning(
        SourceId::Uvlist,
        &["https://img.example/missing.jpg", "https://img.example/page.jpg"],
    ));
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic");
    session
        .search(&SourceConfig::default(), SearchOptions { force: true }, &sink)
        .unwrap();
    let candidates = session.candidates().to_vec();

    assert_matches!(
        session.select(&candidates[0], &sink),
        Err(BoxartError::DownloadStatus { status: 404, .. })
    );
    assert_matches!(
        session.select(&candidates[1], &sink),
        Err(BoxartError::UnsupportedImage { .. })
    );

    assert_eq!(file_names(&images), vec!["Sonic.png".to_string()]);
    assert_eq!(fs::read(images.join("Sonic.png")).unwrap(), PNG);
    assert_eq!(session.lookup(), Some(images.join("Sonic.png")));
    assert_eq!(
        app.lookup(&platform("genesis"), "Sonic").path,
        Some(images.join("Sonic.png").into_string())
    );
}

#[test]
fn non_image_response_is_refused() {
    let (_temp, store) = temp_store("genesis");
    let app = app(store, Vec::new(), images_transport());
    let sink = RecordingSink::default();

    let err = app
        .select_url("https://img.example/page.jpg", &platform("genesis"), "Sonic", &sink)
        .unwrap_err();

    assert_matches!(err, BoxartError::UnsupportedImage { .. });
    assert!(app.lookup(&platform("genesis"), "Sonic").path.is_none());
}

#[test]
fn select_outside_presenting_is_invalid() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"]));
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();
    let offered = ImageCandidate::new("https://img.example/sonic.jpg", SourceId::Uvlist);

    let mut session = app.open_session(&platform("genesis"), "Sonic");
    assert_matches!(
        session.select(&offered, &sink),
        Err(BoxartError::InvalidSession(_))
    );

    session
        .search(&SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();
    let stranger = ImageCandidate::new("https://img.example/sonic.png", SourceId::Commons);
    assert_matches!(
        session.select(&stranger, &sink),
        Err(BoxartError::InvalidSession(_))
    );
    assert_eq!(session.state(), SessionState::Presenting);
    assert!(session.lookup().is_none());
}

#[test]
fn forced_search_replaces_artwork_with_other_extension() {
    let (_temp, store) = temp_store("genesis");
    let images = store.ensure_images_dir(&platform("genesis")).unwrap();
    fs::write(images.join("Sonic.png"), PNG).unwrap();
    let source = Arc::new(MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"]));
    let app = app(store, vec![source.clone() as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic");
    let outcome = session
        .search(&SourceConfig::default(), SearchOptions { force: true }, &sink)
        .unwrap();
    assert_matches!(outcome, SearchOutcome::Candidates(ref candidates) if candidates.len() == 1);
    assert_eq!(source.calls(), 1);

    let candidate = session.candidates()[0].clone();
    let update = session.select(&candidate, &sink).unwrap();

    assert_eq!(update.path, images.join("Sonic.jpg").as_str());
    assert_eq!(file_names(&images), vec!["Sonic.jpg".to_string()]);
}

#[test]
fn repeated_select_is_idempotent() {
    let (_temp, store) = temp_store("genesis");
    let app = app(store, Vec::new(), images_transport());
    let sink = RecordingSink::default();
    let genesis = platform("genesis");

    let first = app
        .select_url("https://img.example/sonic.jpg", &genesis, "Sonic", &sink)
        .unwrap();
    let second = app
        .select_url("https://img.example/sonic.jpg", &genesis, "Sonic", &sink)
        .unwrap();

    assert_eq!(first.update.path, second.update.path);
    assert_eq!(first.url, "https://img.example/sonic.jpg");
    let images = app.store().images_dir(&genesis).unwrap();
    assert_eq!(file_names(&images), vec!["Sonic.jpg".to_string()]);
    assert_eq!(fs::read(&first.update.path).unwrap(), JPEG);
    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["path"], first.update.path.as_str());
}

#[test]
fn unconfigured_platform_is_refused_before_download() {
    let (_temp, store) = temp_store("genesis");
    let transport = images_transport();
    let app = app(store, Vec::new(), transport.clone());
    let sink = RecordingSink::default();

    let err = app
        .select_url("https://img.example/sonic.jpg", &platform("snes"), "Sonic", &sink)
        .unwrap_err();

    assert_matches!(err, BoxartError::UnknownPlatform(ref id) if id == "snes");
    assert_eq!(transport.calls(), 0);
}

#[test]
fn cancelled_session_stays_cancelled() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"]));
    let app = app(store, vec![source.clone() as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic");
    session.cancel();

    assert_matches!(
        session.search(&SourceConfig::default(), SearchOptions::default(), &sink),
        Err(BoxartError::Cancelled)
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(source.calls(), 0);
}

#[test]
fn cancelling_from_another_thread_drops_results() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(
        MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"])
            .delayed(Duration::from_secs(3)),
    );
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let mut session = app.open_session(&platform("genesis"), "Sonic");
    let handle = session.cancel_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.cancel();
    });

    let result = session.search(&SourceConfig::default(), SearchOptions::default(), &sink);
    canceller.join().unwrap();

    assert_matches!(result, Err(BoxartError::Cancelled));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.candidates().is_empty());
    assert!(session.lookup().is_none());
}

#[test]
fn app_search_reports_plan_or_cache() {
    let (_temp, store) = temp_store("genesis");
    let source = Arc::new(MockSource::returning(SourceId::Uvlist, &["https://img.example/sonic.jpg"]));
    let app = app(store, vec![source as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();
    let genesis = platform("genesis");

    let result = app
        .search(&genesis, "Sonic.md", &SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();
    assert_eq!(result.title, "Sonic");
    assert!(result.cached.is_none());
    assert_eq!(result.sources, vec![SourceId::Uvlist]);
    assert_eq!(result.candidates.len(), 1);

    let selected = app.select(&result.candidates[0], &genesis, "Sonic.md", &sink).unwrap();
    let result = app
        .search(&genesis, "Sonic", &SourceConfig::default(), SearchOptions::default(), &sink)
        .unwrap();
    assert_eq!(result.cached, Some(selected.update.path.clone()));
    assert!(result.candidates.is_empty());
    assert_eq!(
        app.lookup(&genesis, "Sonic").path,
        Some(selected.update.path.clone())
    );
}

#[test]
fn fill_missing_handles_each_title_once() {
    let (_temp, store) = temp_store("genesis");
    let images = store.ensure_images_dir(&platform("genesis")).unwrap();
    fs::write(images.join("Cached Game.webp"), b"webp").unwrap();

    let source = Arc::new(MockSource::new(SourceId::Mobygames).respond(|query| {
        let urls: &[&str] = match query.title.as_str() {
            "Sonic The Hedgehog" => &[
                "https://img.example/missing.jpg",
                "https://img.example/sonic.jpg",
            ],
            "Broken" => &["https://img.example/missing.jpg"],
            _ => &[],
        };
        Ok(urls
            .iter()
            .map(|url| ImageCandidate::new(*url, SourceId::Mobygames))
            .collect())
    }));
    let app = app(store, vec![source.clone() as Arc<dyn CoverSource>], images_transport());
    let sink = RecordingSink::default();

    let result = app
        .fill_missing(
            &platform("genesis"),
            [
                "Sonic_The Hedgehog.zip",
                "Sonic The Hedgehog.md",
                "Cached Game",
                "Nothing Found",
                "Broken",
            ],
            &SourceConfig::default(),
            &sink,
        )
        .unwrap();

    let actions: Vec<(&str, BatchAction)> = result
        .items
        .iter()
        .map(|item| (item.title.as_str(), item.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("Sonic The Hedgehog", BatchAction::Downloaded),
            ("Cached Game", BatchAction::Cached),
            ("Nothing Found", BatchAction::NoCandidates),
            ("Broken", BatchAction::Failed),
        ]
    );
    assert_eq!(result.items[0].source, Some(SourceId::Mobygames));
    assert!(result.items[3].error.is_some());
    assert_eq!(source.calls(), 3);
    assert_eq!(
        file_names(&images),
        vec![
            "Cached Game.webp".to_string(),
            "Sonic The Hedgehog.jpg".to_string()
        ]
    );
}

#[test]
fn fill_missing_needs_a_configured_platform() {
    let (_temp, store) = temp_store("genesis");
    let app = app(store, Vec::new(), images_transport());

    let err = app
        .fill_missing(
            &platform("amiga"),
            ["Turrican II"],
            &SourceConfig::default(),
            &RecordingSink::default(),
        )
        .unwrap_err();

    assert_matches!(err, BoxartError::UnknownPlatform(_));
}

#[test]
fn concurrent_writes_leave_one_file() {
    let (_temp, store) = temp_store("genesis");
    let persister = Arc::new(Persister::new(store, images_transport()));
    let key = CacheKey::new(platform("genesis"), CanonicalTitle::new("Sonic"));

    let workers: Vec<_> = ["https://img.example/sonic.jpg", "https://img.example/sonic.png"]
        .into_iter()
        .map(|url| {
            let persister = persister.clone();
            let key = key.clone();
            thread::spawn(move || persister.persist(url, &key))
        })
        .collect();
    for worker in workers {
        worker.join().unwrap().unwrap();
    }

    let stored = persister.store().existing_artwork(&key);
    assert_eq!(stored.len(), 1);
    assert_eq!(persister.store().lookup(&key), Some(stored[0].clone()));
}
