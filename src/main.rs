use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Path, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{AssetClass, AssetStore, LocalAssetStore, OwnerId, payload_text};

mod config;
mod errors;
mod storage;

use config::AppConfig;
use errors::ApiError;

/// One store per asset class.
#[derive(Clone)]
struct AssetStores {
    avatars: Arc<dyn AssetStore>,
    gallery: Arc<dyn AssetStore>,
}

impl AssetStores {
    fn for_class(&self, class: AssetClass) -> &dyn AssetStore {
        match class {
            AssetClass::Avatar => self.avatars.as_ref(),
            AssetClass::Gallery => self.gallery.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreRequest {
    payload: serde_json::Value,
    previous_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoreResponse {
    path: String,
}

#[derive(Debug, Deserialize)]
struct RemoveRequest {
    path: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let stores = AssetStores {
        avatars: Arc::new(LocalAssetStore::new(config.avatars.clone())?),
        gallery: Arc::new(LocalAssetStore::new(config.gallery.clone())?),
    };

    let app = router(stores, config.auth_token.clone(), config.body_limit());

    let addr = config.socket_addr()?;
    tracing::info!("Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(stores: AssetStores, auth_token: String, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(health))
        .merge(
            Router::new()
                .route("/assets/{class}/{owner_id}", post(store_asset))
                .route("/assets/{class}", delete(remove_asset))
                .layer(middleware::from_fn(move |req: Request, next: Next| {
                    let token = auth_token.clone();
                    async move {
                        let auth_header = req
                            .headers()
                            .get("Authorization")
                            .and_then(|h| h.to_str().ok());

                        match auth_header {
                            Some(header) if header == format!("Bearer {token}") => {
                                next.run(req).await
                            }
                            _ => ApiError::Unauthorized.into_response(),
                        }
                    }
                })),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(stores))
}

async fn health() -> &'static str {
    "OK\nAPI Version: 1.0"
}

async fn store_asset(
    Path((class, owner_id)): Path<(AssetClass, String)>,
    Extension(stores): Extension<AssetStores>,
    Json(request): Json<StoreRequest>,
) -> Result<Json<StoreResponse>, ApiError> {
    let owner = OwnerId::parse(&owner_id)?;
    let payload = payload_text(&request.payload)?;

    let path = stores
        .for_class(class)
        .store(payload, &owner, request.previous_path.as_deref())
        .await?;

    Ok(Json(StoreResponse { path }))
}

async fn remove_asset(
    Path(class): Path<AssetClass>,
    Extension(stores): Extension<AssetStores>,
    Json(request): Json<RemoveRequest>,
) -> Result<StatusCode, ApiError> {
    stores.for_class(class).remove(&request.path).await?;
    Ok(StatusCode::NO_CONTENT)
}
