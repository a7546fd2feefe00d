//! Concurrent writers against a real database. Skipped when DATABASE_URL is unset.

mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use erp_api::models::user::UserRole;

macro_rules! require_database {
    () => {
        match common::database().await? {
            Some(pool) => pool,
            None => return Ok(()),
        }
    };
}

#[tokio::test]
async fn account_edit_keeps_balance_written_while_it_waited() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Manager).await?;

    let body = json!({ "code": common::unique("ACC"), "name": "Cash", "type": "asset" });
    let (status, created) = common::send(&app, Method::POST, "/api/accounts", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id: Uuid = created["data"]["id"].as_str().unwrap_or_default().parse()?;

    // Hold the row the way a posting does, then let the edit queue behind it
    let mut posting = pool.begin().await?;
    sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .execute(&mut *posting)
        .await?;

    let edit = {
        let app = app.clone();
        let token = token.clone();
        let uri = format!("/api/accounts/{}", id);
        tokio::spawn(async move {
            common::send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "name": "Cash on hand" }))).await
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    sqlx::query("UPDATE accounts SET balance = 100 WHERE id = $1")
        .bind(id)
        .execute(&mut *posting)
        .await?;
    posting.commit().await?;

    let (status, updated) = edit.await??;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["name"], "Cash on hand");
    assert_eq!(updated["data"]["balance"].as_f64(), Some(100.0));

    let (_, detail) = common::send(&app, Method::GET, &format!("/api/accounts/{}", id), Some(&token), None).await?;
    assert_eq!(detail["data"]["balance"].as_f64(), Some(100.0));
    Ok(())
}

#[tokio::test]
async fn user_and_outlet_edits_interleave_without_failing() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, admin) = common::seeded_user(&pool, UserRole::Admin).await?;
    let (first, _) = common::seeded_user(&pool, UserRole::Employee).await?;
    let (second, _) = common::seeded_user(&pool, UserRole::Employee).await?;

    let mut outlets = Vec::new();
    for name in ["East", "West"] {
        let body = json!({ "code": common::unique("OUT"), "name": name, "type": "store" });
        let (status, created) = common::send(&app, Method::POST, "/api/sales-outlets", Some(&admin), Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED);
        outlets.push(created["data"]["id"].as_str().unwrap_or_default().to_string());
    }
    let (east, west) = (&outlets[0], &outlets[1]);

    for round in 0..4 {
        let (to_user, to_outlet) = if round % 2 == 0 { (east, west) } else { (west, east) };
        let user_uri = format!("/api/users/{}", first.id);
        let outlet_uri = format!("/api/sales-outlets/{}", to_outlet);
        let (moved, staffed) = tokio::join!(
            common::send(&app, Method::PUT, &user_uri, Some(&admin), Some(json!({ "outlet": to_user }))),
            common::send(
                &app,
                Method::PUT,
                &outlet_uri,
                Some(&admin),
                Some(json!({ "staff": [first.id, second.id] }))
            ),
        );
        assert_eq!(moved?.0, StatusCode::OK);
        assert_eq!(staffed?.0, StatusCode::OK);
    }

    // Whatever order they ran in, each user sits on exactly the roster it points at
    for member in [first.id, second.id] {
        let (_, user) = common::send(&app, Method::GET, &format!("/api/users/{}", member), Some(&admin), None).await?;
        let home = user["data"]["outlet"]["id"].as_str().unwrap_or_default().to_string();
        for outlet in &outlets {
            let (_, detail) =
                common::send(&app, Method::GET, &format!("/api/sales-outlets/{}", outlet), Some(&admin), None).await?;
            let listed = detail["data"]["staff"]
                .as_array()
                .map(|staff| staff.iter().any(|s| s["id"] == member.to_string()))
                .unwrap_or(false);
            assert_eq!(listed, *outlet == home, "user {} on outlet {}", member, outlet);
        }
    }
    Ok(())
}
