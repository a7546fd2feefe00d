// routes.rs - the full router: public endpoints, the JWT-protected API and uploaded files

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers::protected::{
    attendance, auth, crud, products, resources, sales_outlets, settings, stats, tickets, transactions, users,
};
use crate::handlers::public;
use crate::middleware::jwt_auth_middleware;
use crate::models::resource::Bookable;
use crate::models::{
    Account, Attendance, Customer, Entity, Machine, Product, SalesOutlet, ServiceTemplate, Supplier, SupportTicket,
    Tool, Transaction, User, Workstation, Writable,
};
use crate::state::AppState;

pub fn app(state: AppState, config: &AppConfig) -> Router {
    let router = Router::new()
        .route("/health", get(public::health_get))
        .route("/api/auth/login", post(public::login_post))
        .merge(protected_routes())
        .nest_service(&config.uploads.public_prefix, ServeDir::new(state.uploads.root()))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors(config));

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me_get))
        .merge(crud_routes::<Account>("/api/accounts", get(stats::accounts)))
        .merge(transaction_routes())
        .merge(crud_routes::<Customer>("/api/customers", get(stats::customers)))
        .merge(crud_routes::<Supplier>("/api/suppliers", get(stats::suppliers)))
        .merge(crud_routes::<Product>("/api/products", get(stats::products)))
        .route("/api/products/:id/stock", post(products::stock_post))
        .merge(resource_routes::<Machine>("/api/machines"))
        .merge(resource_routes::<Tool>("/api/tools"))
        .merge(resource_routes::<Workstation>("/api/workstations"))
        .merge(attendance_routes())
        .merge(ticket_routes())
        .merge(user_routes())
        .merge(sales_outlet_routes())
        .merge(crud_routes::<ServiceTemplate>("/api/service-templates", get(stats::service_templates)))
        .route("/api/settings", get(settings::get).put(settings::put))
        .route("/api/settings/logo", post(settings::logo_post))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

/// `GET /` and `GET /:id` for any entity
fn read_routes<E: Entity>(base: &str, stats: MethodRouter<AppState>) -> Router<AppState> {
    Router::new()
        .route(base, get(crud::list::<E>))
        .route(&format!("{}/stats", base), stats)
        .route(&format!("{}/:id", base), get(crud::get::<E>))
}

fn crud_routes<E: Writable>(base: &str, stats: MethodRouter<AppState>) -> Router<AppState> {
    Router::new()
        .route(base, get(crud::list::<E>).post(crud::create::<E>))
        .route(&format!("{}/stats", base), stats)
        .route(
            &format!("{}/:id", base),
            get(crud::get::<E>).put(crud::update::<E>).delete(crud::remove::<E>),
        )
}

fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/transactions",
            get(crud::list::<Transaction>).post(crud::create::<Transaction>),
        )
        .route("/api/transactions/stats", get(stats::transactions))
        .route(
            "/api/transactions/:id",
            get(crud::get::<Transaction>)
                .put(crud::update::<Transaction>)
                .delete(transactions::delete),
        )
        .route("/api/transactions/:id/approve", put(transactions::approve_put))
        .route("/api/transactions/:id/post", put(transactions::post_put))
        .route("/api/transactions/:id/reconcile", put(transactions::reconcile_put))
}

fn resource_routes<B: Bookable>(base: &str) -> Router<AppState> {
    crud_routes::<B>(base, get(stats::resources::<B>))
        .route(&format!("{}/:id/book", base), post(resources::book_post::<B>))
        .route(&format!("{}/:id/release", base), post(resources::release_post::<B>))
        .route(
            &format!("{}/:id/maintenance/start", base),
            post(resources::maintenance_start_post::<B>),
        )
        .route(
            &format!("{}/:id/maintenance/complete", base),
            post(resources::maintenance_complete_post::<B>),
        )
}

fn attendance_routes() -> Router<AppState> {
    crud_routes::<Attendance>("/api/hrm/attendance", get(stats::attendance))
        .route("/api/hrm/attendance/checkin", post(attendance::checkin_post))
        .route("/api/hrm/attendance/checkout", post(attendance::checkout_post))
        .route("/api/hrm/attendance/break/start", post(attendance::break_start_post))
        .route("/api/hrm/attendance/break/end", post(attendance::break_end_post))
}

fn ticket_routes() -> Router<AppState> {
    crud_routes::<SupportTicket>("/api/tickets", get(stats::tickets))
        .route("/api/tickets/:id/assign", put(tickets::assign_put))
        .route("/api/tickets/:id/status", put(tickets::status_put))
        .route("/api/tickets/:id/rating", put(tickets::rating_put))
        .route("/api/tickets/:id/comments", post(tickets::comments_post))
}

fn user_routes() -> Router<AppState> {
    read_routes::<User>("/api/users", get(stats::users))
        .route("/api/users", post(users::create))
        .route("/api/users/:id", put(users::update).delete(users::remove))
}

fn sales_outlet_routes() -> Router<AppState> {
    read_routes::<SalesOutlet>("/api/sales-outlets", get(stats::sales_outlets))
        .route("/api/sales-outlets", post(sales_outlets::create))
        .route("/api/sales-outlets/:id", put(sales_outlets::update).delete(sales_outlets::remove))
}

fn cors(config: &AppConfig) -> CorsLayer {
    let origins = &config.security.cors_origins;
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::permissive().allow_origin(allowed)
}
