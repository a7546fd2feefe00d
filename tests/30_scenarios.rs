//! End-to-end flows against a real database. Skipped when DATABASE_URL is unset.

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

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
async fn duplicate_customer_email_is_rejected() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;
    let email = format!("{}@example.com", common::unique("customer"));
    let body = json!({ "firstName": "A", "lastName": "B", "email": email });

    let (status, created) = common::send(&app, Method::POST, "/api/customers", Some(&token), Some(body.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["email"], email.as_str());
    assert!(created["data"]["customerCode"].as_str().unwrap_or_default().starts_with("CUS-"));

    let (status, repeat) = common::send(&app, Method::POST, "/api/customers", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(repeat["message"], "Customer with this email already exists");
    Ok(())
}

#[tokio::test]
async fn attendance_allows_one_check_in_per_day() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (employee, token) = common::seeded_user(&pool, UserRole::Employee).await?;

    let (status, body) = common::send(&app, Method::POST, "/api/hrm/attendance/checkout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No check-in record found for today");

    let (status, body) = common::send(&app, Method::POST, "/api/hrm/attendance/checkin", Some(&token), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["employee"]["id"], employee.id.to_string());

    let (status, body) = common::send(&app, Method::POST, "/api/hrm/attendance/checkin", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Already checked in today");

    let (status, body) = common::send(&app, Method::POST, "/api/hrm/attendance/checkout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["checkOut"].is_string());
    Ok(())
}

#[tokio::test]
async fn resources_cannot_be_double_booked() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;

    let machine = json!({ "serialNumber": common::unique("SN"), "name": "Lathe" });
    let (status, created) = common::send(&app, Method::POST, "/api/machines", Some(&token), Some(machine)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap_or_default().to_string();

    let booking = json!({ "bookedUntil": Utc::now() + Duration::hours(2), "currentJob": "Shafts" });
    let book = format!("/api/machines/{}/book", id);
    let release = format!("/api/machines/{}/release", id);

    let (status, body) = common::send(&app, Method::POST, &book, Some(&token), Some(booking.clone())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "booked");

    let (status, body) = common::send(&app, Method::POST, &book, Some(&token), Some(booking)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Machine is not available for booking");

    let (status, _) = common::send(&app, Method::POST, &release, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = common::send(&app, Method::POST, &release, Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Machine is not currently booked");
    Ok(())
}

#[tokio::test]
async fn transaction_workflow_updates_balances() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (manager, token) = common::seeded_user(&pool, UserRole::Manager).await?;

    let mut accounts = Vec::new();
    for kind in ["asset", "revenue"] {
        let body = json!({ "code": common::unique("ACC"), "name": format!("Test {}", kind), "type": kind });
        let (status, created) = common::send(&app, Method::POST, "/api/accounts", Some(&token), Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED);
        accounts.push(created["data"]["id"].as_str().unwrap_or_default().to_string());
    }

    let body = json!({
        "description": "Cash sale",
        "type": "sale",
        "entries": [
            { "account": accounts[0], "debit": 100 },
            { "account": accounts[1], "credit": 100 }
        ]
    });
    let (status, created) = common::send(&app, Method::POST, "/api/transactions", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["status"], "draft");
    let id = created["data"]["id"].as_str().unwrap_or_default().to_string();

    let approve = format!("/api/transactions/{}/approve", id);
    let (status, body) = common::send(&app, Method::PUT, &approve, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["approvedBy"]["id"], manager.id.to_string());

    let (status, body) = common::send(&app, Method::PUT, &approve, Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only draft transactions can be approved");

    let (status, _) = common::send(&app, Method::PUT, &format!("/api/transactions/{}/post", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    for (account, expected) in accounts.iter().zip([100.0, 100.0]) {
        let (_, body) = common::send(&app, Method::GET, &format!("/api/accounts/{}", account), Some(&token), None).await?;
        assert_eq!(body["data"]["balance"].as_f64(), Some(expected));
    }

    let (status, body) = common::send(&app, Method::DELETE, &format!("/api/transactions/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Posted transactions cannot be deleted");
    Ok(())
}

#[tokio::test]
async fn soft_deleted_records_leave_listings() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;
    let code = common::unique("SUP");

    let body = json!({ "code": code, "name": "Bolt Supply" });
    let (status, created) = common::send(&app, Method::POST, "/api/suppliers", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap_or_default().to_string();
    let search = format!("/api/suppliers?search={}", code);

    let (_, listed) = common::send(&app, Method::GET, &search, Some(&token), None).await?;
    assert_eq!(listed["pagination"]["total"], 1);

    let (status, deleted) = common::send(&app, Method::DELETE, &format!("/api/suppliers/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Supplier deleted successfully");

    let (_, listed) = common::send(&app, Method::GET, &search, Some(&token), None).await?;
    assert_eq!(listed["pagination"]["total"], 0);
    assert_eq!(listed["pagination"]["pages"], 0);

    let (status, detail) = common::send(&app, Method::GET, &format!("/api/suppliers/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["isActive"], false);
    Ok(())
}

#[tokio::test]
async fn login_returns_a_usable_token() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (user, _) = common::seeded_user(&pool, UserRole::Employee).await?;

    let body = json!({ "email": user.email, "password": "wrong-password" });
    let (status, _) = common::send(&app, Method::POST, "/api/auth/login", None, Some(body)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body = json!({ "email": user.email, "password": "password123" });
    let (status, login) = common::send(&app, Method::POST, "/api/auth/login", None, Some(body)).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(login["data"]["user"].get("passwordHash").is_none());
    let token = login["data"]["token"].as_str().unwrap_or_default().to_string();

    let (status, me) = common::send(&app, Method::GET, "/api/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], user.email.as_str());
    Ok(())
}

#[tokio::test]
async fn outlet_rosters_follow_user_assignments() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, admin) = common::seeded_user(&pool, UserRole::Admin).await?;
    let (member, _) = common::seeded_user(&pool, UserRole::Employee).await?;

    let body = json!({ "code": common::unique("OUT"), "name": "North", "type": "store", "staff": [member.id] });
    let (status, north) = common::send(&app, Method::POST, "/api/sales-outlets", Some(&admin), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let north = north["data"]["id"].as_str().unwrap_or_default().to_string();

    let body = json!({ "code": common::unique("OUT"), "name": "South", "type": "kiosk" });
    let (status, south) = common::send(&app, Method::POST, "/api/sales-outlets", Some(&admin), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let south = south["data"]["id"].as_str().unwrap_or_default().to_string();

    let user_uri = format!("/api/users/{}", member.id);
    let (_, detail) = common::send(&app, Method::GET, &user_uri, Some(&admin), None).await?;
    assert_eq!(detail["data"]["outlet"]["id"], north.as_str());

    // Moving the user rewrites both rosters
    let (status, _) = common::send(&app, Method::PUT, &user_uri, Some(&admin), Some(json!({ "outlet": south }))).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = common::send(&app, Method::GET, &format!("/api/sales-outlets/{}", north), Some(&admin), None).await?;
    assert_eq!(detail["data"]["staff"], json!([]));
    let (_, detail) = common::send(&app, Method::GET, &format!("/api/sales-outlets/{}", south), Some(&admin), None).await?;
    assert_eq!(detail["data"]["staff"][0]["id"], member.id.to_string());

    // Deleting the outlet releases its staff
    let (status, body) =
        common::send(&app, Method::DELETE, &format!("/api/sales-outlets/{}", south), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sales outlet deleted successfully");

    let (_, detail) = common::send(&app, Method::GET, &user_uri, Some(&admin), None).await?;
    assert!(detail["data"]["outlet"].is_null());
    Ok(())
}

#[tokio::test]
async fn product_listing_orders_and_flags_low_stock() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;
    let brand = common::unique("brand");
    let category = common::unique("cat");

    for (name, stock, min) in [("Bravo", 40, 5), ("Alpha", 2, 5), ("Charlie", 5, 5)] {
        let body = json!({
            "sku": common::unique("SKU"),
            "name": name,
            "brand": brand,
            "category": category,
            "unitPrice": 10,
            "costPrice": 4,
            "currentStock": stock,
            "minStock": min
        });
        let (status, _) = common::send(&app, Method::POST, "/api/products", Some(&token), Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, listed) = common::send(&app, Method::GET, &format!("/api/products?search={}", brand), Some(&token), None).await?;
    let names: Vec<&str> = listed["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);

    let uri = format!("/api/products?search={}&lowStock=true", brand);
    let (_, low) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(low["pagination"]["total"], 2);
    assert_eq!(low["data"][0]["name"], "Alpha");
    assert_eq!(low["data"][1]["name"], "Charlie");

    let uri = format!("/api/products?search={}&lowStock=false", brand);
    let (_, stocked) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(stocked["pagination"]["total"], 1);
    assert_eq!(stocked["data"][0]["name"], "Bravo");

    let (status, stats) = common::send(&app, Method::GET, "/api/products/stats", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["byCategory"][category.as_str()], 3);
    assert!(stats["data"]["lowStock"].as_i64().unwrap_or_default() >= 2);
    Ok(())
}

#[tokio::test]
async fn transaction_listing_honours_date_range() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;
    let tag = common::unique("batch");

    let body = json!({ "code": common::unique("ACC"), "name": "Till", "type": "asset" });
    let (_, account) = common::send(&app, Method::POST, "/api/accounts", Some(&token), Some(body)).await?;
    let account = account["data"]["id"].as_str().unwrap_or_default().to_string();

    for date in ["2020-01-10", "2020-01-31", "2020-03-10"] {
        let body = json!({
            "date": date,
            "description": format!("{} {}", tag, date),
            "type": "journal",
            "entries": [{ "account": account, "debit": 5 }, { "account": account, "credit": 5 }]
        });
        let (status, _) = common::send(&app, Method::POST, "/api/transactions", Some(&token), Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, all) = common::send(&app, Method::GET, &format!("/api/transactions?search={}", tag), Some(&token), None).await?;
    assert_eq!(all["pagination"]["total"], 3);
    assert_eq!(all["data"][0]["date"], "2020-03-10");
    assert_eq!(all["data"][2]["date"], "2020-01-10");

    let uri = format!("/api/transactions?search={}&startDate=2020-01-01&endDate=2020-01-31", tag);
    let (_, january) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(january["pagination"]["total"], 2);
    assert_eq!(january["data"][0]["date"], "2020-01-31");

    let uri = format!("/api/transactions?search={}&startDate=2020-02-01", tag);
    let (_, later) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(later["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn supplier_stats_track_soft_deletes() -> Result<()> {
    let pool = require_database!();
    let app = common::app_with(pool.clone());
    let (_, token) = common::seeded_user(&pool, UserRole::Employee).await?;
    let category = common::unique("parts");

    let body = json!({ "code": common::unique("SUP"), "name": "Gear Co", "category": category });
    let (status, created) = common::send(&app, Method::POST, "/api/suppliers", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap_or_default().to_string();

    let (status, stats) = common::send(&app, Method::GET, "/api/suppliers/stats", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["byCategory"][category.as_str()], 1);
    assert!(stats["data"]["total"].as_i64().unwrap_or_default() >= 1);

    common::send(&app, Method::DELETE, &format!("/api/suppliers/{}", id), Some(&token), None).await?;
    let (_, stats) = common::send(&app, Method::GET, "/api/suppliers/stats", Some(&token), None).await?;
    assert!(stats["data"]["byCategory"].get(category.as_str()).is_none());
    Ok(())
}
