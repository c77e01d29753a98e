#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chartmatch::config::{Config, ReferenceSpec};
use chartmatch::embedder::ImageEmbedder;
use chartmatch::index::Decision;
use chartmatch::server::build_router;
use chartmatch::state::AppState;
use chartmatch::Embedding;
use tempfile::TempDir;

pub const BOUNDARY: &str = "chartmatch-test-boundary";

/// Stand-in for the model: "images" are text files of comma-separated floats.
pub struct TextEmbedder;

impl ImageEmbedder for TextEmbedder {
    fn embed(&self, path: &Path) -> Result<Embedding> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let values = raw
            .trim()
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("{} is not a feature file", path.display()))?;
        Ok(Embedding::new(values))
    }
}

/// Write reference "images" into `dir` and return the matching mapping.
pub fn write_references(dir: &Path, refs: &[(&str, Decision, &str)]) -> Result<Vec<ReferenceSpec>> {
    std::fs::create_dir_all(dir)?;
    refs.iter()
        .map(|(label, decision, features)| {
            std::fs::write(dir.join(label), features)?;
            Ok(ReferenceSpec {
                label: label.to_string(),
                decision: *decision,
            })
        })
        .collect()
}

/// A fully wired app over the two-entry buy/sell fixture.
pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new(rate_limit_per_minute: u32) -> Result<Self> {
        Self::with_config(|config| config.rate_limit_per_minute = rate_limit_per_minute)
    }

    /// Same fixture, with `tweak` applied to the config before startup.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let image_root = dir.path().join("cheatsheet");
        let references = write_references(
            &image_root,
            &[("a.png", Decision::Buy, "1,0"), ("b.png", Decision::Sell, "0,1")],
        )?;

        std::fs::create_dir_all(dir.path().join("templates"))?;
        std::fs::write(
            dir.path().join("templates/frontend.html"),
            "<html><body>chartmatch</body></html>",
        )?;
        std::fs::create_dir_all(dir.path().join("static"))?;
        std::fs::write(dir.path().join("static/app.js"), "console.log('ok');")?;

        let mut config = Config {
            image_root,
            upload_dir: dir.path().join("uploads"),
            static_dir: dir.path().join("static"),
            frontend: dir.path().join("templates/frontend.html"),
            references,
            ..Config::default()
        };
        tweak(&mut config);

        let state = Arc::new(AppState::build(config, Arc::new(TextEmbedder))?);
        let router = build_router(state.clone());
        Ok(Self { dir, state, router })
    }

    pub fn upload_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.dir.path().join("uploads"))?.count())
    }
}

pub fn multipart_request(field: &str, content: &[u8]) -> Result<Request<Body>> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"chart.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Ok(Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))?)
}

pub fn get(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().uri(uri).body(Body::empty())?)
}

pub async fn json_body(response: Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn text_body(response: Response) -> Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}
