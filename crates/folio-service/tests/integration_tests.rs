use anyhow::Result;
use chrono::Duration;
use folio_service::AppState;
use folio_service::errors::ContentError;
use folio_service::models::NewContentItem;
use folio_service::patch::Patch;
use folio_service::test_helpers::sqlite_state;
use serde_json::json;

mod common;

use common::{test_now, test_utils};

fn draft(id: &str, url: &str, collection_id: &str, content: &str) -> NewContentItem {
    NewContentItem {
        id: id.to_string(),
        url: url.to_string(),
        collection_id: Some(collection_id.to_string()),
        content_type: "page".to_string(),
        content: content.to_string(),
        approved: false,
        publish_date: None,
    }
}

fn approve_at(date: chrono::DateTime<chrono::Utc>) -> Vec<Patch> {
    vec![
        Patch::replace("approved", json!(true)),
        Patch::replace("publish_date", json!(date.to_rfc3339())),
    ]
}

#[tokio::test]
async fn test_draft_approve_publish_lifecycle() -> Result<()> {
    let (state, db, clock) = sqlite_state();
    let store = state.content_store();

    store.add_draft(&draft("a", "/about", "C1", "v1")).await?;
    store
        .patch_content("/about", "C1", &[Patch::replace("content", json!("v1.1"))])
        .await?;
    store
        .patch_content("/about", "C1", &approve_at(test_now() + Duration::minutes(30)))
        .await?;

    // Approved items leave the in-progress view.
    assert!(matches!(
        store.get_in_progress_by_url("/about", "C1").await,
        Err(ContentError::NotFound)
    ));
    assert!(matches!(
        store.get_published_by_url("/about").await,
        Err(ContentError::NotFound)
    ));
    assert_eq!(
        store.get_next_publish_date("/about").await?,
        Some(test_now() + Duration::minutes(30))
    );

    clock.advance(Duration::minutes(30));

    let published = store.get_published_by_url("/about").await?;
    assert_eq!(published.id, "a");
    assert_eq!(published.content, "v1.1");
    assert_eq!(store.get_next_publish_date("/about").await?, None);

    let mut conn = db.lock().unwrap();
    assert_eq!(test_utils::count_content_items(&mut conn), 1);
    Ok(())
}

#[tokio::test]
async fn test_new_draft_allowed_once_previous_is_approved() -> Result<()> {
    let (state, db, _clock) = sqlite_state();
    let store = state.content_store();

    store.add_draft(&draft("a", "/about", "C1", "v1")).await?;
    store
        .patch_content("/about", "C1", &approve_at(test_now() - Duration::hours(1)))
        .await?;

    store.add_draft(&draft("b", "/about", "C2", "v2")).await?;

    assert_eq!(store.get_in_progress_by_url("/about", "C2").await?.id, "b");
    assert_eq!(store.get_published_by_url("/about").await?.id, "a");

    let mut conn = db.lock().unwrap();
    let rows = test_utils::get_content_items_by_url(&mut conn, "/about");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|row| !row.approved).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_latest_past_publish_date_wins() -> Result<()> {
    let (state, _db, _clock) = sqlite_state();
    let store = state.content_store();

    for (id, hours_ago) in [("old", 3), ("newest", 1), ("middle", 2)] {
        store.add_draft(&draft(id, "/about", "C1", id)).await?;
        store
            .patch_content(
                "/about",
                "C1",
                &approve_at(test_now() - Duration::hours(hours_ago)),
            )
            .await?;
    }

    assert_eq!(store.get_published_by_url("/about").await?.id, "newest");
    Ok(())
}

#[tokio::test]
async fn test_patch_refreshes_last_updated_but_upsert_keeps_it() -> Result<()> {
    let (state, db, clock) = sqlite_state();
    let store = state.content_store();

    store.add_draft(&draft("a", "/about", "C1", "v1")).await?;

    clock.advance(Duration::minutes(5));
    store
        .upsert_content(&draft("a", "/about", "C1", "v1-replaced"))
        .await?;
    {
        let mut conn = db.lock().unwrap();
        let rows = test_utils::get_content_items_by_url(&mut conn, "/about");
        assert_eq!(rows[0].content, "v1-replaced");
        assert_eq!(rows[0].last_updated, test_now().naive_utc());
    }

    clock.advance(Duration::minutes(5));
    store
        .patch_content("/about", "C1", &[Patch::replace("content", json!("v2"))])
        .await?;

    let mut conn = db.lock().unwrap();
    let rows = test_utils::get_content_items_by_url(&mut conn, "/about");
    assert_eq!(rows[0].content, "v2");
    assert_eq!(
        rows[0].last_updated,
        (test_now() + Duration::minutes(10)).naive_utc()
    );
    Ok(())
}

#[tokio::test]
async fn test_remove_publish_date_unschedules_draft() -> Result<()> {
    let (state, db, _clock) = sqlite_state();
    let store = state.content_store();

    store.add_draft(&draft("a", "/about", "C1", "v1")).await?;
    store
        .patch_content(
            "/about",
            "C1",
            &[Patch::replace(
                "publish_date",
                json!((test_now() + Duration::days(1)).to_rfc3339()),
            )],
        )
        .await?;
    store
        .patch_content("/about", "C1", &[Patch::remove("publish_date")])
        .await?;

    let mut conn = db.lock().unwrap();
    let rows = test_utils::get_content_items_by_url(&mut conn, "/about");
    assert_eq!(rows[0].publish_date, None);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_drafts_for_one_url() -> Result<()> {
    let (state, db, _clock) = sqlite_state();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let state = state.clone();
            tokio::spawn(async move {
                let item = draft(&format!("d{n}"), "/about", &format!("C{n}"), "v1");
                state.content_store().add_draft(&item).await
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => created += 1,
            Err(ContentError::AlreadyInProgress) => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    let mut conn = db.lock().unwrap();
    assert_eq!(test_utils::count_content_items(&mut conn), 1);
    Ok(())
}

#[tokio::test]
async fn test_patch_without_mutable_fields_requires_target() -> Result<()> {
    let (state, _db, _clock) = sqlite_state();
    let store = state.content_store();

    let ignored = [Patch::replace("url", json!("/elsewhere"))];
    assert!(matches!(
        store.patch_content("/about", "C1", &ignored).await,
        Err(ContentError::NotFound)
    ));

    store.add_draft(&draft("a", "/about", "C1", "v1")).await?;
    store.patch_content("/about", "C1", &ignored).await?;

    assert_eq!(
        store.get_in_progress_by_url("/about", "C1").await?.url,
        "/about"
    );
    Ok(())
}
