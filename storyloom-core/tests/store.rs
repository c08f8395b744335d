use std::collections::BTreeSet;
use std::thread;

use storyloom_core::models::{BlockKind, CreateBlockInput, HistoryAction, UpdateBlockInput, STALE_TAG};
use storyloom_core::{StoreConfig, Workspace};

fn open_workspace() -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = Workspace::open_with(dir.path().join("movie"), StoreConfig::default())
        .expect("open workspace");
    (dir, ws)
}

#[test]
fn guided_writing_workflow_end_to_end() {
    let (_dir, ws) = open_workspace();
    let project = ws.db.create_project("My Movie", "./movie").unwrap();
    for (i, name) in ["Story", "Design", "Shooting", "Generate"].iter().enumerate() {
        ws.db.create_tab(project.id, name, i as i64).unwrap();
    }
    let tabs = ws.db.list_tabs(project.id).unwrap();
    assert_eq!(tabs.len(), 4);
    let story = &tabs[0];

    // Logline feeds the expanded concept.
    let logline = ws
        .db
        .create_block(
            story.id,
            CreateBlockInput {
                kind: BlockKind::Logline,
                content: "Detective on a train".into(),
                ..Default::default()
            },
        )
        .unwrap();
    let concept = ws
        .db
        .create_block(
            story.id,
            CreateBlockInput {
                kind: BlockKind::Concept,
                content: "Expanded premise".into(),
                ..Default::default()
            },
        )
        .unwrap();
    ws.db
        .add_dependency(logline.id, concept.id, "logline_to_concept")
        .unwrap();

    // Rewriting the logline invalidates the concept downstream.
    ws.db
        .update_block(
            logline.id,
            UpdateBlockInput {
                content: Some("Detective trapped on a night train".into()),
                tags: None,
            },
        )
        .unwrap();
    assert_eq!(ws.db.invalidate_downstream(logline.id).unwrap(), 1);
    let stale = ws.db.get_block(concept.id).unwrap().unwrap();
    assert!(stale.tags.contains(STALE_TAG));

    // The regenerated concept clears its stale tag through an ordinary
    // tag mutation.
    let regenerated = ws
        .db
        .update_block(
            concept.id,
            UpdateBlockInput {
                content: Some("Premise aligned with the night train".into()),
                tags: Some(BTreeSet::new()),
            },
        )
        .unwrap();
    assert_eq!(regenerated.version, 3);
    assert!(!regenerated.tags.contains(STALE_TAG));

    // A reference image attaches to the concept.
    let asset = ws
        .assets
        .store_bytes(b"PNGDATA", "train.png", project.id, None)
        .unwrap();
    ws.assets
        .link_block(concept.id, asset.id, "reference")
        .unwrap();
    assert_eq!(ws.assets.assets_for_block(concept.id).unwrap().len(), 1);

    // Deleting the concept cascades links and edges but keeps its trail.
    assert!(ws.db.delete_block(concept.id).unwrap());
    assert!(ws.db.get_block(concept.id).unwrap().is_none());
    assert!(ws.db.get_dependencies(logline.id).unwrap().is_empty());
    assert!(ws.assets.assets_for_block(concept.id).unwrap().is_empty());

    let trail = ws.db.get_history(concept.id).unwrap();
    assert_eq!(trail[0].action, HistoryAction::Delete);
    assert_eq!(trail.last().unwrap().action, HistoryAction::Create);
    // create + invalidation edit + regen edit + delete
    assert_eq!(trail.len(), 4);
}

#[test]
fn concurrent_identical_uploads_converge() {
    let (_dir, ws) = open_workspace();
    let project = ws.db.create_project("My Movie", "./movie").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let assets = ws.assets.clone();
            let project_id = project.id;
            thread::spawn(move || {
                assets
                    .store_bytes(b"PNGDATA", &format!("shot{i}.png"), project_id, None)
                    .expect("store")
                    .id
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    let assets = ws.assets.list(project.id).unwrap();
    assert_eq!(assets.len(), 1);
    assert!(ws.assets.absolute_path(&assets[0]).exists());
}

#[test]
fn concurrent_updates_serialize_without_losing_bumps() {
    let (_dir, ws) = open_workspace();
    let project = ws.db.create_project("My Movie", "./movie").unwrap();
    let tab = ws.db.create_tab(project.id, "Story", 0).unwrap();
    let block = ws
        .db
        .create_block(
            tab.id,
            CreateBlockInput {
                kind: BlockKind::Scene,
                content: "draft".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let threads = 8;
    let per_thread = 10;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let db = ws.db.clone();
            let id = block.id;
            thread::spawn(move || {
                for i in 0..per_thread {
                    db.update_block(
                        id,
                        UpdateBlockInput {
                            content: Some(format!("draft {t}-{i}")),
                            tags: None,
                        },
                    )
                    .expect("update");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Last committer wins on content; no update is lost or skipped, and
    // every bump still pairs with exactly one history entry.
    let current = ws.db.get_block(block.id).unwrap().unwrap();
    let expected = (threads * per_thread + 1) as i64;
    assert_eq!(current.version, expected);
    assert_eq!(ws.db.get_history(block.id).unwrap().len(), expected as usize);
}

#[test]
fn version_bumps_and_history_rows_stay_paired() {
    let (_dir, ws) = open_workspace();
    let project = ws.db.create_project("My Movie", "./movie").unwrap();
    let tab = ws.db.create_tab(project.id, "Story", 0).unwrap();
    let block = ws
        .db
        .create_block(
            tab.id,
            CreateBlockInput {
                kind: BlockKind::Scene,
                content: "draft".into(),
                ..Default::default()
            },
        )
        .unwrap();

    // Mixed content and tag mutations; every bump pairs with one entry.
    ws.db
        .update_block(
            block.id,
            UpdateBlockInput {
                content: Some("second draft".into()),
                tags: None,
            },
        )
        .unwrap();
    ws.db
        .update_block(
            block.id,
            UpdateBlockInput {
                content: None,
                tags: Some(BTreeSet::from(["approved".to_string()])),
            },
        )
        .unwrap();

    let current = ws.db.get_block(block.id).unwrap().unwrap();
    let trail = ws.db.get_history(block.id).unwrap();
    assert_eq!(current.version, 3);
    assert_eq!(trail.len(), 3);
}
