use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Bearer token the server treats as expired.
pub const EXPIRED_TOKEN: &str = "expired";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkDelete {
    pub ids: Vec<u64>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub filter: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: Uuid,
    pub files: Vec<UploadedFile>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct Store {
    products: RwLock<HashMap<u64, Product>>,
    next_id: AtomicU64,
}

pub type Db = Arc<Store>;

/// Error response in the marketplace's JSON envelope.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
    kind: &'static str,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>, kind: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            kind,
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required", "authentication_required")
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Product not found", "not_found")
    }

    fn validation(message: &str) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "validation_error")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "bad_request")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
                "type": self.kind,
            }
        }));
        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(Store::default());
    Router::new()
        .route("/api/public/hello", get(hello))
        .route("/api/auth/me", get(current_user))
        .route(
            "/api/products",
            get(list_products).post(create_product).delete(delete_products),
        )
        .route(
            "/api/products/{id}",
            get(get_product)
                .put(replace_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .route("/api/uploads", post(upload))
        .route("/api/broken", get(broken))
        .route("/api/echo/headers", get(echo_headers))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn require_bearer(headers: &HeaderMap) -> Result<String, ApiFailure> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty() && *token != EXPIRED_TOKEN)
        .map(str::to_string)
        .ok_or_else(ApiFailure::unauthorized)
}

fn validate(name: &str, price: f64) -> Result<(), ApiFailure> {
    if name.trim().is_empty() {
        return Err(ApiFailure::validation("Name is required"));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(ApiFailure::validation("Invalid price"));
    }
    Ok(())
}

async fn hello() -> Json<Value> {
    Json(json!({"message": "Hello from the marketplace API"}))
}

async fn current_user(headers: HeaderMap) -> Result<Json<Value>, ApiFailure> {
    let token = require_bearer(&headers)?;
    Ok(Json(json!({"uid": token, "roles": ["buyer"]})))
}

async fn list_products(State(db): State<Db>, Query(query): Query<ListQuery>) -> Json<Value> {
    let products = db.products.read().await;
    let mut items: Vec<Product> = products
        .values()
        .filter(|p| match &query.filter {
            Some(filter) => p.name.contains(filter.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    items.sort_by_key(|p| p.id);
    Json(json!({
        "page": query.page.unwrap_or(1),
        "filter": query.filter,
        "items": items,
    }))
}

async fn create_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), ApiFailure> {
    require_bearer(&headers)?;
    validate(&input.name, input.price)?;
    let product = Product {
        id: db.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        name: input.name,
        price: input.price,
        description: input.description,
    };
    db.products.write().await.insert(product.id, product.clone());
    tracing::info!(id = product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Product>, ApiFailure> {
    let products = db.products.read().await;
    products.get(&id).cloned().map(Json).ok_or_else(ApiFailure::not_found)
}

async fn replace_product(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(input): Json<CreateProduct>,
) -> Result<Json<Product>, ApiFailure> {
    require_bearer(&headers)?;
    validate(&input.name, input.price)?;
    let mut products = db.products.write().await;
    let product = products.get_mut(&id).ok_or_else(ApiFailure::not_found)?;
    product.name = input.name;
    product.price = input.price;
    product.description = input.description;
    Ok(Json(product.clone()))
}

async fn update_product(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>, ApiFailure> {
    require_bearer(&headers)?;
    let mut products = db.products.write().await;
    let product = products.get_mut(&id).ok_or_else(ApiFailure::not_found)?;
    let name = input.name.unwrap_or_else(|| product.name.clone());
    let price = input.price.unwrap_or(product.price);
    validate(&name, price)?;
    product.name = name;
    product.price = price;
    if let Some(description) = input.description {
        product.description = Some(description);
    }
    Ok(Json(product.clone()))
}

async fn delete_product(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    require_bearer(&headers)?;
    let mut products = db.products.write().await;
    products.remove(&id).ok_or_else(ApiFailure::not_found)?;
    tracing::info!(id, "product deleted");
    Ok(Json(json!({"deleted": id})))
}

/// Removes every listed product that exists; unknown ids are skipped.
async fn delete_products(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<BulkDelete>,
) -> Result<Json<Value>, ApiFailure> {
    require_bearer(&headers)?;
    let mut products = db.products.write().await;
    let deleted: Vec<u64> = input
        .ids
        .into_iter()
        .filter(|id| products.remove(id).is_some())
        .collect();
    tracing::info!(count = deleted.len(), "products deleted");
    Ok(Json(json!({"deleted": deleted})))
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Result<(StatusCode, Json<UploadReceipt>), ApiFailure> {
    require_bearer(&headers)?;
    let mut files = Vec::new();
    let mut fields = BTreeMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
                files.push(UploadedFile {
                    field: name,
                    filename,
                    content_type,
                    size: data.len(),
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
                fields.insert(name, value);
            }
        }
    }
    let receipt = UploadReceipt {
        id: Uuid::new_v4(),
        files,
        fields,
    };
    tracing::info!(id = %receipt.id, files = receipt.files.len(), "upload received");
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn broken() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<html><body><h1>Internal Server Error</h1></body></html>"),
    )
}

async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let echoed = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    Json(echoed)
}
