#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    auth::{AuthConfig, AuthService},
    cache::InMemoryCache,
    config::AppConfig,
    db,
    entities::{
        address, category, payment_method, product, user, AddressModel, AddressType,
        CategoryModel, PaymentMethodModel, PaymentType, ProductModel, UserModel,
    },
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Harness spinning up an application backed by a fresh SQLite database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with a clean schema.
    pub async fn new() -> Self {
        let db_path = std::env::temp_dir().join(format!("storefront_test_{}.db", Uuid::new_v4()));
        let cfg = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            environment: "test".to_string(),
            ..Default::default()
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        );
        let auth = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Arc::new(cfg.clone()),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            cache: Arc::new(InMemoryCache::new()),
            auth,
        };

        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Fire a request at the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: &str,
    ) -> Response {
        let auth = format!("Bearer {}", token);
        self.request_with_headers(method, uri, body, &[("authorization", &auth)])
            .await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Insert a user and return it with a valid access token.
    pub async fn seed_user(&self, email: &str, is_staff: bool) -> (UserModel, String) {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(String::new()),
            first_name: Set(None),
            last_name: Set(None),
            is_staff: Set(is_staff),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let user = model.insert(&*self.state.db).await.expect("seed user");
        let token = self.state.auth.issue_token(&user).expect("token");
        (user, token)
    }

    pub async fn seed_category(&self, name: &str, slug: &str) -> CategoryModel {
        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            image: Set(None),
            parent_id: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.state.db).await.expect("seed category")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        slug: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
        stock_quantity: i32,
        category_id: Uuid,
    ) -> ProductModel {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(format!("{} description", name)),
            short_description: Set(None),
            price: Set(price),
            sale_price: Set(sale_price),
            stock_quantity: Set(stock_quantity),
            is_in_stock: Set(stock_quantity > 0),
            low_stock_threshold: Set(5),
            category_id: Set(category_id),
            main_image: Set(None),
            is_active: Set(true),
            is_featured: Set(false),
            is_bestseller: Set(false),
            view_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.state.db).await.expect("seed product")
    }

    pub async fn seed_address(&self, user_id: Uuid) -> AddressModel {
        let now = Utc::now();
        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_type: Set(AddressType::Both),
            first_name: Set("Test".to_string()),
            last_name: Set("Shopper".to_string()),
            company: Set(None),
            address_line_1: Set("123 Test Street".to_string()),
            address_line_2: Set(None),
            city: Set("Testville".to_string()),
            state: Set("CA".to_string()),
            postal_code: Set("90210".to_string()),
            country: Set("United States".to_string()),
            phone_number: Set(None),
            is_default: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.state.db).await.expect("seed address")
    }

    pub async fn seed_payment_method(&self, user_id: Uuid) -> PaymentMethodModel {
        let now = Utc::now();
        let model = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            payment_type: Set(PaymentType::CreditCard),
            card_last_four: Set(Some("4242".to_string())),
            card_brand: Set(Some("Visa".to_string())),
            expiry_month: Set(Some("12".to_string())),
            expiry_year: Set(Some("2030".to_string())),
            is_default: Set(true),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("seed payment method")
    }
}

/// Parse a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

/// Parse a JSON field holding a decimal serialized as string or number.
pub fn dec_field(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal value, got {:?}", other),
    }
}
