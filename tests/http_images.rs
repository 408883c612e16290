use std::io::Cursor;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
};
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use curio::application::books::BookService;
use curio::application::games::GameService;
use curio::application::images::{AssetResolver, ImageConfig, ImageWriter};
use curio::application::repos::{BooksRepo, GamesRepo, ImageBlobStore};
use curio::infra::db::PostgresRepositories;
use curio::infra::disk_cache::DiskCache;
use curio::infra::http::{HttpState, build_router};

const BOUNDARY: &str = "curio-test-boundary";

struct TestApp {
    router: Router,
    resolver: AssetResolver,
    cache_dir: TempDir,
    pool: PgPool,
}

impl TestApp {
    fn new(pool: PgPool) -> Self {
        Self::with_upload_limit(pool, 10 * 1024 * 1024)
    }

    fn with_upload_limit(pool: PgPool, upload_limit: u64) -> Self {
        let cache_dir = tempfile::tempdir().expect("tempdir");
        let repos = Arc::new(PostgresRepositories::new(pool.clone()));
        let books_repo: Arc<dyn BooksRepo> = repos.clone();
        let games_repo: Arc<dyn GamesRepo> = repos.clone();
        let blob_store: Arc<dyn ImageBlobStore> = repos.clone();

        let config = ImageConfig {
            cache_root: cache_dir.path().to_path_buf(),
            target_height: NonZeroU32::new(300).expect("non-zero"),
            quality: 80,
        };
        let cache = DiskCache::new(cache_dir.path());
        let writer = Arc::new(ImageWriter::new(&config, cache.clone()));

        let resolver = AssetResolver::new(cache, blob_store);
        let state = HttpState {
            resolver: resolver.clone(),
            books: Arc::new(BookService::new(books_repo, writer.clone())),
            games: Arc::new(GameService::new(games_repo, writer)),
            db: repos,
            upload_limit,
        };

        Self {
            router: build_router(state),
            resolver,
            cache_dir,
            pool,
        }
    }

    fn cache_root(&self) -> &Path {
        self.cache_dir.path()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, headers, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    async fn submit(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        image: Option<&[u8]>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, image)))
            .expect("request");
        let (status, _, body) = self.send(request).await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT count(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("count rows")
    }
}

fn multipart_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"cover.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .expect("encode jpeg");
    buf.into_inner()
}

fn filename_of(image_url: &str) -> &str {
    image_url.rsplit('/').next().expect("filename segment")
}

#[sqlx::test(migrations = "./migrations")]
async fn uploaded_cover_is_transcoded_cached_and_served(pool: PgPool) {
    let app = TestApp::new(pool);

    let (status, json) = app
        .submit(
            Method::POST,
            "/games",
            &[("title", "Azul"), ("players", "2-4")],
            Some(&jpeg(1200, 800)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["slug"], "azul");
    assert_eq!(json["title"], "Azul");

    let image_url = json["image_url"].as_str().expect("image url").to_string();
    let filename = filename_of(&image_url);
    assert!(image_url.starts_with("/images/games/game-"));
    let millis = filename
        .strip_prefix("game-")
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .expect("identifier shape");
    assert!(millis.parse::<i64>().is_ok());

    let cached = std::fs::read(app.cache_root().join("games").join(filename))
        .expect("cache file written on upload");

    let (status, headers, body) = app.get(&image_url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[CONTENT_LENGTH], body.len().to_string().as_str());
    assert_eq!(
        headers[CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    assert_eq!(body.as_ref(), cached.as_slice());

    let decoded = image::load_from_memory(&body).expect("served bytes are an image");
    assert_eq!((decoded.width(), decoded.height()), (450, 300));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleted_cache_file_is_served_from_durable_copy_and_repaired(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, json) = app
        .submit(
            Method::POST,
            "/books",
            &[("title", "Piranesi"), ("author", "Susanna Clarke")],
            Some(&jpeg(400, 600)),
        )
        .await;
    let image_url = json["image_url"].as_str().expect("image url").to_string();
    let cached_path = app.cache_root().join("books").join(filename_of(&image_url));
    let original = std::fs::read(&cached_path).expect("cached on upload");

    std::fs::remove_file(&cached_path).expect("evict cache file");

    let (status, headers, body) = app.get(&image_url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "image/jpeg");
    assert_eq!(body.as_ref(), original.as_slice());

    app.resolver.wait_for_repairs().await;
    let repaired = std::fs::read(&cached_path).expect("cache repaired");
    assert_eq!(repaired, original);
}

#[sqlx::test(migrations = "./migrations")]
async fn wiped_cache_root_is_rebuilt_on_demand(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, json) = app
        .submit(
            Method::POST,
            "/games",
            &[("title", "Cascadia")],
            Some(&jpeg(300, 300)),
        )
        .await;
    let image_url = json["image_url"].as_str().expect("image url").to_string();

    std::fs::remove_dir_all(app.cache_root().join("games")).expect("wipe namespace dir");

    let (status, _, _) = app.get(&image_url).await;
    assert_eq!(status, StatusCode::OK);
    app.resolver.wait_for_repairs().await;
    assert!(
        app.cache_root()
            .join("games")
            .join(filename_of(&image_url))
            .exists()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_images_fall_through_to_not_found(pool: PgPool) {
    let app = TestApp::new(pool);

    for uri in [
        "/images/games/game-404.jpg",
        "/images/events/event-1.jpg",
        "/images/books/..%2F..%2Fetc%2Fpasswd",
    ] {
        let (status, _, _) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert!(!app.cache_root().join("games").join("game-404.jpg").exists());
}

#[sqlx::test(migrations = "./migrations")]
async fn malformed_upload_is_rejected_without_side_effects(pool: PgPool) {
    let app = TestApp::new(pool);

    let (status, _) = app
        .submit(
            Method::POST,
            "/games",
            &[("title", "Broken")],
            Some(b"<html>definitely not an image</html>"),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.count("games").await, 0);
    let cached = std::fs::read_dir(app.cache_root().join("games"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(cached, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn extreme_aspect_ratio_upload_is_rejected_as_unprocessable(pool: PgPool) {
    let app = TestApp::new(pool);

    let (status, _) = app
        .submit(
            Method::POST,
            "/books",
            &[("title", "Ribbon"), ("author", "Anon")],
            Some(&jpeg(4000, 1)),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.count("books").await, 0);
    let cached = std::fs::read_dir(app.cache_root().join("books"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(cached, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn missing_required_field_is_a_bad_request(pool: PgPool) {
    let app = TestApp::new(pool);

    let (status, _) = app
        .submit(
            Method::POST,
            "/books",
            &[("title", "No Author")],
            Some(&jpeg(100, 100)),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.count("books").await, 0);
    assert!(!app.cache_root().join("books").exists());
}

#[sqlx::test(migrations = "./migrations")]
async fn entity_without_upload_has_no_image(pool: PgPool) {
    let app = TestApp::new(pool);

    let (status, json) = app
        .submit(Method::POST, "/games", &[("title", "Codenames")], None)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["image_url"], Value::Null);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_keeps_or_replaces_cover(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, created) = app
        .submit(
            Method::POST,
            "/games",
            &[("title", "Hanabi")],
            Some(&jpeg(600, 300)),
        )
        .await;
    let id = created["id"].as_str().expect("id").to_string();
    let first_url = created["image_url"].as_str().expect("image url").to_string();

    let (status, kept) = app
        .submit(
            Method::PUT,
            &format!("/games/{id}"),
            &[("title", "Hanabi"), ("tagline", "Cooperative fireworks")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["image_url"], first_url.as_str());

    let (status, replaced) = app
        .submit(
            Method::PUT,
            &format!("/games/{id}"),
            &[("title", "Hanabi")],
            Some(&jpeg(300, 600)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second_url = replaced["image_url"].as_str().expect("image url");
    assert_ne!(second_url, first_url);

    let (status, _, body) = app.get(second_url).await;
    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).expect("image");
    assert_eq!((decoded.width(), decoded.height()), (150, 300));

    let (status, _, body) = app.get(&format!("/games/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let record: Value = serde_json::from_slice(&body).expect("json record");
    assert_eq!(record["tagline"], Value::Null);
    assert_eq!(record["image_url"], second_url);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_missing_entity_is_not_found(pool: PgPool) {
    let app = TestApp::new(pool);
    let (status, _, _) = app
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/books/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn delete_removes_record(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, created) = app
        .submit(Method::POST, "/games", &[("title", "Patchwork")], None)
        .await;
    let id = created["id"].as_str().expect("id").to_string();

    let (status, _, _) = app
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/games/{id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = app.get(&format!("/games/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn oversized_upload_is_rejected(pool: PgPool) {
    let app = TestApp::with_upload_limit(pool, 1024);

    let (status, _) = app
        .submit(
            Method::POST,
            "/games",
            &[("title", "Too Big")],
            Some(&jpeg(800, 800)),
        )
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.count("games").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn health_check_reports_database_reachable(pool: PgPool) {
    let app = TestApp::new(pool);
    let (status, _, _) = app.get("/_health/db").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
