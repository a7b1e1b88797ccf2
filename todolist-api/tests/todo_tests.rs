/// Todo CRUD, pagination, reorder and cache behaviour tests

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;

use common::{ids, TestContext};

fn list_uri(user_id: impl std::fmt::Display, query: &str) -> String {
    format!("/api/v1/todo/user/{user_id}{query}")
}

fn id_of(todo: &Value) -> String {
    todo["_id"].as_str().expect("todo id").to_string()
}

#[tokio::test]
async fn test_create_appends_to_end_of_list() {
    let ctx = TestContext::new();
    let user = ctx.member("create@example.com").await;

    let first = ctx.create_todo(&user.token, "  Buy milk  ").await;
    let second = ctx.create_todo(&user.token, "Walk dog").await;

    assert_eq!(first["title"], "Buy milk");
    assert_eq!(first["completed"], false);
    assert_eq!(first["order"], 0);
    assert_eq!(first["userId"], user.id().to_string());
    assert_eq!(second["order"], 1);
}

#[tokio::test]
async fn test_create_validates_title() {
    let ctx = TestContext::new();
    let user = ctx.member("titles@example.com").await;

    let cases = [
        (json!({}), "Title is required"),
        (json!({ "title": "   " }), "Title cannot be empty"),
        (json!({ "title": "x" }), "Title must be at least 2 characters long"),
        (json!({ "title": "y".repeat(31) }), "Title must not exceed 30 characters"),
    ];

    for (body, expected) in cases {
        let response = ctx.post("/api/v1/todo/create", Some(&user.token), body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.message(), expected);
        assert_eq!(response.body["details"][0]["field"], "title");
    }

    let listing = ctx.get(&list_uri(user.id(), ""), Some(&user.token)).await;
    assert_eq!(listing.body["total"], 0);
}

#[tokio::test]
async fn test_duplicate_title_is_rejected_per_owner() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice@example.com").await;
    let bob = ctx.member("bob@example.com").await;

    ctx.create_todo(&alice.token, "Groceries").await;

    let duplicate = ctx
        .post(
            "/api/v1/todo/create",
            Some(&alice.token),
            json!({ "title": " Groceries " }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.message(), "Todo with this title already exists");

    // Another owner may reuse the title
    ctx.create_todo(&bob.token, "Groceries").await;
}

#[tokio::test]
async fn test_pagination_visits_every_todo_once() {
    let ctx = TestContext::new();
    let user = ctx.member("pages@example.com").await;

    let mut created = Vec::new();
    for n in 0..12 {
        created.push(id_of(&ctx.create_todo(&user.token, &format!("Task {n:02}")).await));
    }

    let mut seen = Vec::new();
    let mut cursor: Option<i64> = None;
    let mut pages = 0;

    loop {
        let query = match cursor {
            Some(c) => format!("?limit=5&cursor={c}"),
            None => "?limit=5".to_string(),
        };
        let page = ctx.get(&list_uri(user.id(), &query), Some(&user.token)).await;
        assert_eq!(page.status, StatusCode::OK, "{}", page.body);
        assert_eq!(page.body["total"], 12);

        seen.extend(ids(&page.body));
        pages += 1;

        match page.body["nextCursor"].as_i64() {
            Some(next) => cursor = Some(next),
            None => {
                assert!(page.body["nextCursor"].is_null());
                break;
            }
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, created, "pages must follow ascending order");
}

#[tokio::test]
async fn test_list_falls_back_to_default_limit() {
    let ctx = TestContext::new();
    let user = ctx.member("defaults@example.com").await;

    for n in 0..10 {
        ctx.create_todo(&user.token, &format!("Item {n}")).await;
    }

    for query in ["", "?limit=abc", "?limit=0", "?cursor=null", "?limit=-3&cursor=oops"] {
        let page = ctx.get(&list_uri(user.id(), query), Some(&user.token)).await;
        assert_eq!(page.status, StatusCode::OK, "query {query}");
        assert_eq!(ids(&page.body).len(), 9, "query {query}");
        assert_eq!(page.body["nextCursor"], 8, "query {query}");
    }
}

#[tokio::test]
async fn test_list_is_cached_until_mutation() {
    let ctx = TestContext::new();
    let user = ctx.member("cached@example.com").await;
    ctx.create_todo(&user.token, "First").await;

    let uri = list_uri(user.id(), "");
    let cold = ctx.get(&uri, Some(&user.token)).await;
    let warm = ctx.get(&uri, Some(&user.token)).await;

    assert_eq!(cold.body["source"], "db");
    assert_eq!(warm.body["source"], "cache");
    assert_eq!(cold.body["data"], warm.body["data"]);

    ctx.create_todo(&user.token, "Second").await;

    let fresh = ctx.get(&uri, Some(&user.token)).await;
    assert_eq!(fresh.body["source"], "db");
    assert_eq!(fresh.body["total"], 2);
}

#[tokio::test]
async fn test_list_access_is_self_or_admin() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner@example.com").await;
    let other = ctx.member("other@example.com").await;
    let admin = ctx.admin("admin@example.com").await;
    ctx.create_todo(&owner.token, "Private").await;

    let uri = list_uri(owner.id(), "");

    let denied = ctx.get(&uri, Some(&other.token)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let allowed = ctx.get(&uri, Some(&admin.token)).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.body["total"], 1);

    let anonymous = ctx.get(&uri, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.message(), "Unauthorized: User not authenticated");

    let bad_id = ctx.get(&list_uri("not-a-uuid", ""), Some(&owner.token)).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_todo_is_owner_scoped_and_cached() {
    let ctx = TestContext::new();
    let owner = ctx.member("get-owner@example.com").await;
    let other = ctx.member("get-other@example.com").await;
    let todo = ctx.create_todo(&owner.token, "Read book").await;
    let uri = format!("/api/v1/todo/{}", id_of(&todo));

    let first = ctx.get(&uri, Some(&owner.token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["source"], "db");
    assert_eq!(first.body["todo"]["title"], "Read book");

    let second = ctx.get(&uri, Some(&owner.token)).await;
    assert_eq!(second.body["source"], "cache");

    let foreign = ctx.get(&uri, Some(&other.token)).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.message(), "Todo not found");
}

#[tokio::test]
async fn test_update_todo() {
    let ctx = TestContext::new();
    let owner = ctx.member("update-owner@example.com").await;
    let other = ctx.member("update-other@example.com").await;
    let todo = ctx.create_todo(&owner.token, "Draft").await;
    let id = id_of(&todo);
    let uri = format!("/api/v1/todo/update/{id}");

    // Warm the item cache
    ctx.get(&format!("/api/v1/todo/{id}"), Some(&owner.token)).await;

    let response = ctx
        .patch(&uri, Some(&owner.token), json!({ "title": "Final", "completed": true }))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.message(), "Todo updated successfully");
    assert_eq!(response.body["data"]["title"], "Final");
    assert_eq!(response.body["data"]["completed"], true);

    let reread = ctx.get(&format!("/api/v1/todo/{id}"), Some(&owner.token)).await;
    assert_eq!(reread.body["source"], "db");
    assert_eq!(reread.body["todo"]["title"], "Final");

    let empty = ctx.patch(&uri, Some(&owner.token), json!({})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let foreign = ctx
        .patch(&uri, Some(&other.token), json!({ "completed": false }))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reorder_swaps_positions_and_skips_foreign_items() {
    let ctx = TestContext::new();
    let owner = ctx.member("reorder@example.com").await;
    let other = ctx.member("reorder-other@example.com").await;

    let a = id_of(&ctx.create_todo(&owner.token, "Alpha").await);
    let b = id_of(&ctx.create_todo(&owner.token, "Beta").await);
    let foreign = id_of(&ctx.create_todo(&other.token, "Gamma").await);

    // Cache the first page before reordering
    ctx.get(&list_uri(owner.id(), ""), Some(&owner.token)).await;

    let response = ctx
        .patch(
            "/api/v1/todo/reorder",
            Some(&owner.token),
            json!({ "order": [
                { "_id": a, "order": 1 },
                { "_id": b, "order": 0 },
                { "_id": foreign, "order": 7 },
            ]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["updated"], 2);

    let listing = ctx.get(&list_uri(owner.id(), ""), Some(&owner.token)).await;
    assert_eq!(listing.body["source"], "db");
    assert_eq!(ids(&listing.body), vec![b, a]);

    let untouched = ctx
        .get(&format!("/api/v1/todo/{foreign}"), Some(&other.token))
        .await;
    assert_eq!(untouched.body["todo"]["order"], 0);
}

#[tokio::test]
async fn test_reorder_rejects_bad_input_atomically() {
    let ctx = TestContext::new();
    let owner = ctx.member("reorder-bad@example.com").await;
    let a = id_of(&ctx.create_todo(&owner.token, "One").await);
    let b = id_of(&ctx.create_todo(&owner.token, "Two").await);
    ctx.create_todo(&owner.token, "Three").await;

    let empty = ctx
        .patch("/api/v1/todo/reorder", Some(&owner.token), json!({ "order": [] }))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.message(), "Order must be a non-empty array");

    let duplicates = ctx
        .patch(
            "/api/v1/todo/reorder",
            Some(&owner.token),
            json!({ "order": [{ "_id": a, "order": 5 }, { "_id": b, "order": 5 }] }),
        )
        .await;
    assert_eq!(duplicates.status, StatusCode::BAD_REQUEST);

    let negative = ctx
        .patch(
            "/api/v1/todo/reorder",
            Some(&owner.token),
            json!({ "order": [{ "_id": a, "order": -1 }] }),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    // Order 2 already belongs to "Three"
    let conflict = ctx
        .patch(
            "/api/v1/todo/reorder",
            Some(&owner.token),
            json!({ "order": [{ "_id": a, "order": 9 }, { "_id": b, "order": 2 }] }),
        )
        .await;
    assert_eq!(conflict.status, StatusCode::BAD_REQUEST);

    let listing = ctx.get(&list_uri(owner.id(), ""), Some(&owner.token)).await;
    let orders: Vec<i64> = listing.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_delete_todo_owner_or_admin() {
    let ctx = TestContext::new();
    let owner = ctx.member("delete-owner@example.com").await;
    let other = ctx.member("delete-other@example.com").await;
    let admin = ctx.admin("delete-admin@example.com").await;

    let mine = id_of(&ctx.create_todo(&owner.token, "Mine").await);
    let theirs = id_of(&ctx.create_todo(&owner.token, "Also mine").await);

    let forbidden = ctx
        .delete(&format!("/api/v1/todo/delete/{mine}"), Some(&other.token))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let own = ctx
        .delete(&format!("/api/v1/todo/delete/{mine}"), Some(&owner.token))
        .await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.message(), "Todo deleted successfully");

    let gone = ctx
        .delete(&format!("/api/v1/todo/delete/{mine}"), Some(&owner.token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let by_admin = ctx
        .delete(&format!("/api/v1/todo/delete/{theirs}"), Some(&admin.token))
        .await;
    assert_eq!(by_admin.status, StatusCode::OK);

    let invalid = ctx
        .delete("/api/v1/todo/delete/not-a-uuid", Some(&owner.token))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let listing = ctx.get(&list_uri(owner.id(), ""), Some(&owner.token)).await;
    assert_eq!(listing.body["total"], 0);
}

#[tokio::test]
async fn test_clear_completed_scopes_by_role() {
    let ctx = TestContext::new();
    let alice = ctx.member("clear-alice@example.com").await;
    let bob = ctx.member("clear-bob@example.com").await;
    let admin = ctx.admin("clear-admin@example.com").await;

    let mut completed = HashSet::new();
    for (user, title) in [(&alice, "A done"), (&bob, "B done")] {
        let id = id_of(&ctx.create_todo(&user.token, title).await);
        ctx.patch(
            &format!("/api/v1/todo/update/{id}"),
            Some(&user.token),
            json!({ "completed": true }),
        )
        .await;
        completed.insert(id);
    }
    let open = id_of(&ctx.create_todo(&alice.token, "A open").await);

    let uri = |id: uuid::Uuid| format!("/api/v1/todo/delete/{id}/clear-completed");

    let response = ctx.delete(&uri(alice.id()), Some(&alice.token)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["deletedCount"], 1);

    let none_left = ctx.delete(&uri(alice.id()), Some(&alice.token)).await;
    assert_eq!(none_left.status, StatusCode::NOT_FOUND);
    assert_eq!(none_left.message(), "No completed todos found");

    // Bob's completed todo survived Alice's call; the admin clears it
    let response = ctx.delete(&uri(admin.id()), Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["deletedCount"], 1);

    let alice_list = ctx.get(&list_uri(alice.id(), ""), Some(&alice.token)).await;
    assert_eq!(ids(&alice_list.body), vec![open]);

    let bob_list = ctx.get(&list_uri(bob.id(), ""), Some(&bob.token)).await;
    assert_eq!(bob_list.body["total"], 0);
}
