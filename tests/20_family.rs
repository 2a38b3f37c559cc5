mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{data, id_of, ids, TestApp, TestUser};
use family_notes_api::services::NewEvent;

async fn create_family(app: &TestApp, owner: &TestUser, name: &str) -> Result<Uuid> {
    let (status, body) = app.post("/api/family", owner, json!({ "name": name })).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(id_of(&body).parse()?)
}

async fn create_note(app: &TestApp, owner: &TestUser, title: &str, family_id: Option<Uuid>) -> Result<String> {
    let (status, body) = app
        .post(
            "/api/notes",
            owner,
            json!({ "title": title, "content": "", "family_id": family_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(id_of(&body))
}

#[tokio::test]
async fn membership_follows_join_and_leave() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let joiner = app.user("joiner").await?;
    let family_id = create_family(&app, &owner, "Lakeside").await?;

    let (status, body) = app.post_empty(&format!("/api/family/{}/join", family_id), &joiner).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(data(&body)["role"], "member");
    assert!(app.state.store.is_member(family_id, joiner.id).await?);

    let (status, body) = app.post_empty(&format!("/api/family/{}/leave", family_id), &joiner).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["family_deleted"], false);
    assert_eq!(data(&body)["remaining_members"], 1);
    assert!(!app.state.store.is_member(family_id, joiner.id).await?);
    Ok(())
}

#[tokio::test]
async fn joining_twice_is_a_conflict() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let family_id = create_family(&app, &owner, "Hills").await?;

    let (status, body) = app.post_empty(&format!("/api/family/{}/join", family_id), &owner).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_MEMBER");
    Ok(())
}

#[tokio::test]
async fn leaving_without_membership_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let stranger = app.user("stranger").await?;
    let family_id = create_family(&app, &owner, "Hills").await?;

    let (status, body) = app.post_empty(&format!("/api/family/{}/leave", family_id), &stranger).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_A_MEMBER");
    Ok(())
}

#[tokio::test]
async fn last_member_out_deletes_the_family() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let latecomer = app.user("latecomer").await?;
    let family_id = create_family(&app, &owner, "Solo").await?;

    let (status, body) = app.post_empty(&format!("/api/family/{}/leave", family_id), &owner).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["family_deleted"], true);
    assert_eq!(data(&body)["remaining_members"], 0);

    let (_, body) = app.get("/api/family", &owner).await?;
    assert!(data(&body).as_array().map_or(false, |families| families.is_empty()));

    let (status, body) = app.post_empty(&format!("/api/family/{}/join", family_id), &latecomer).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "FAMILY_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn owner_leaving_keeps_family_for_remaining_members() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let member = app.user("member").await?;
    let family_id = create_family(&app, &owner, "Orchard").await?;
    app.post_empty(&format!("/api/family/{}/join", family_id), &member).await?;

    let (_, body) = app.post_empty(&format!("/api/family/{}/leave", family_id), &owner).await?;
    assert_eq!(data(&body)["family_deleted"], false);

    let (status, body) = app.get(&format!("/api/family/{}/members", family_id), &member).await?;
    assert_eq!(status, StatusCode::OK);
    let members = data(&body).as_array().cloned().unwrap_or_default();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user"]["username"], "member");
    Ok(())
}

#[tokio::test]
async fn family_listings_are_members_only() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let outsider = app.user("outsider").await?;
    let family_id = create_family(&app, &owner, "Private").await?;

    for path in ["notes", "events", "members"] {
        let (status, body) = app.get(&format!("/api/family/{}/{}", family_id, path), &outsider).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", path);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    // An unknown family looks the same as someone else's
    let (status, _) = app.get(&format!("/api/family/{}/notes", Uuid::new_v4()), &outsider).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn personal_notes_stay_personal() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let other = app.user("other").await?;
    let family_id = create_family(&app, &owner, "Shared").await?;
    app.post_empty(&format!("/api/family/{}/join", family_id), &other).await?;

    let personal = create_note(&app, &owner, "Diary", None).await?;

    let (_, body) = app.get(&format!("/api/family/{}/notes", family_id), &owner).await?;
    assert!(!ids(&body).contains(&personal));

    let (_, body) = app.get("/api/notes", &owner).await?;
    assert!(ids(&body).contains(&personal));

    let (_, body) = app.get("/api/notes", &other).await?;
    assert!(!ids(&body).contains(&personal));

    // A collaborator grant is the only way in
    let (status, _) = app
        .put(
            &format!("/api/notes/{}/collaborators/{}", personal, other.id),
            &owner,
            json!({ "permission": "read" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/notes", &other).await?;
    assert!(ids(&body).contains(&personal));
    Ok(())
}

#[tokio::test]
async fn system_events_are_visible_to_everyone() -> Result<()> {
    let app = TestApp::new()?;
    let alice = app.user("alice").await?;
    let bob = app.user("bob").await?;

    let date: DateTime<Utc> = "2025-01-01T00:00:00Z".parse()?;
    let event = app
        .state
        .events
        .create_system(NewEvent {
            title: "New Year".to_string(),
            description: String::new(),
            date,
            event_type: Default::default(),
            recurrence: Default::default(),
            family_id: None,
            notify_users: vec![],
            show_countdown: true,
        })
        .await?;

    for user in [&alice, &bob] {
        let (status, body) = app.get("/api/events", user).await?;
        assert_eq!(status, StatusCode::OK);
        assert!(ids(&body).contains(&event.id.to_string()));
    }
    Ok(())
}

#[tokio::test]
async fn smiths_scenario() -> Result<()> {
    let app = TestApp::new()?;
    let a = app.user("a").await?;
    let b = app.user("b").await?;
    let c = app.user("c").await?;

    let smiths = create_family(&app, &a, "Smiths").await?;
    let (_, body) = app.get("/api/family", &a).await?;
    assert_eq!(data(&body)[0]["role"], "owner");

    let (_, body) = app.post_empty(&format!("/api/family/{}/join", smiths), &b).await?;
    assert_eq!(data(&body)["role"], "member");

    let note = create_note(&app, &a, "Holiday plans", Some(smiths)).await?;

    let (status, body) = app.get(&format!("/api/family/{}/notes", smiths), &b).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).contains(&note));

    let (_, body) = app.get("/api/notes", &c).await?;
    assert!(!ids(&body).contains(&note));

    app.post_empty(&format!("/api/family/{}/leave", smiths), &b).await?;
    let (_, body) = app.post_empty(&format!("/api/family/{}/leave", smiths), &a).await?;
    assert_eq!(data(&body)["family_deleted"], true);

    for user in [&a, &b, &c] {
        let (status, _) = app.get(&format!("/api/family/{}/notes", smiths), user).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    Ok(())
}

#[tokio::test]
async fn created_families_list_as_owner_in_creation_order() -> Result<()> {
    let app = TestApp::new()?;
    let creator = app.user("creator").await?;

    let first = create_family(&app, &creator, "First").await?;
    let second = create_family(&app, &creator, "Second").await?;

    let (status, body) = app.get("/api/family", &creator).await?;
    assert_eq!(status, StatusCode::OK);

    let memberships = data(&body).as_array().cloned().unwrap_or_default();
    assert_eq!(memberships.len(), 2);
    assert_eq!(memberships[0]["family"]["id"], first.to_string());
    assert_eq!(memberships[1]["family"]["id"], second.to_string());
    for membership in &memberships {
        assert_eq!(membership["role"], "owner");
        assert_eq!(membership["family"]["creator_id"], creator.id.to_string());
    }

    let joined: Vec<DateTime<Utc>> = memberships
        .iter()
        .map(|m| m["joined_at"].as_str().unwrap_or_default().parse())
        .collect::<Result<_, _>>()?;
    assert!(joined[0] <= joined[1]);
    Ok(())
}

#[tokio::test]
async fn family_names_are_validated() -> Result<()> {
    let app = TestApp::new()?;
    let user = app.user("namer").await?;

    let (status, body) = app.post("/api/family", &user, json!({ "name": "   " })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app.post("/api/family", &user, json!({ "name": "x".repeat(101) })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn shared_folder_follows_the_family() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let joiner = app.user("joiner").await?;
    let outsider = app.user("outsider").await?;

    let (status, body) = app.post("/api/family", &owner, json!({ "name": "Lakeside" })).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let family_id = id_of(&body);
    let folder = data(&body)["shared_folder"].clone();
    assert_eq!(folder["family_id"], family_id.as_str());
    assert_eq!(folder["name"], "Lakeside (shared)");
    let folder_id = folder["id"].as_str().unwrap_or_default().to_string();

    app.post_empty(&format!("/api/family/{}/join", family_id), &joiner).await?;
    let (_, body) = app.get("/api/folders", &joiner).await?;
    assert_eq!(ids(&body), vec![folder_id.clone()]);
    let (_, body) = app.get("/api/folders", &outsider).await?;
    assert!(ids(&body).is_empty());

    let (status, body) = app
        .post(
            "/api/notes",
            &joiner,
            json!({ "title": "Chores", "content": "", "folder_id": folder_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let (status, _) = app
        .post(
            "/api/notes",
            &outsider,
            json!({ "title": "Sneaky", "content": "", "folder_id": folder_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/folders/{}", folder_id), &owner).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.post_empty(&format!("/api/family/{}/leave", family_id), &owner).await?;
    app.post_empty(&format!("/api/family/{}/leave", family_id), &joiner).await?;
    let (_, body) = app.get("/api/folders", &joiner).await?;
    assert!(ids(&body).is_empty());
    Ok(())
}

#[tokio::test]
async fn simultaneous_last_leaves_delete_the_family_once() -> Result<()> {
    let app = TestApp::new()?;
    let owner = app.user("owner").await?;
    let joiner = app.user("joiner").await?;
    let family_id = create_family(&app, &owner, "Crossroads").await?;
    app.post_empty(&format!("/api/family/{}/join", family_id), &joiner).await?;

    let uri = format!("/api/family/{}/leave", family_id);
    let (first, second) = tokio::join!(app.post_empty(&uri, &owner), app.post_empty(&uri, &joiner));
    let (first, second) = (first?, second?);
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    let deletions = [&first.1, &second.1]
        .iter()
        .filter(|body| data(body)["family_deleted"] == true)
        .count();
    assert_eq!(deletions, 1);
    assert!(app.state.store.find_family(family_id).await?.is_none());

    // A late joiner finds nothing to join
    let late = app.user("late").await?;
    let (status, _) = app.post_empty(&format!("/api/family/{}/join", family_id), &late).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.store.families_of(late.id).await?.is_empty());
    Ok(())
}
