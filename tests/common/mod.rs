// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared helpers: a throw-away HTTP server standing in for civitai.com.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use civitai_dl::Config;
use serde_json::{json, Value};

pub const TOKEN: &str = "secret-token-1234";
pub const MODEL_BYTES: &[u8] = b"\x00safetensors-model-payload\xff";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\npreview";
pub const MP4_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42video";

/// Start `make_router(base_url)` on an ephemeral port and return the base URL.
///
/// The server runs on its own runtime thread for the rest of the test binary.
pub fn spawn_server<F>(make_router: F) -> String
where
    F: FnOnce(String) -> Router + Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("test runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test listener");
            let base = format!("http://{}", listener.local_addr().expect("local addr"));
            let router = make_router(base.clone());
            tx.send(base).expect("send base url");
            axum::serve(listener, router).await.expect("serve");
        });
    });
    rx.recv().expect("server did not start")
}

/// Registry endpoint for a server started with [`spawn_server`].
pub fn api_base(base: &str) -> String {
    format!("{}/api/v1/model-versions/", base)
}

/// YAML config text pointing at the test server and an output directory.
pub fn config_yaml(base: &str, models_dir: &Path) -> String {
    format!(
        "civitai:\n  token: {}\n  api_base: {}\ncomfyui:\n  base_model_path: {}\n",
        TOKEN,
        api_base(base),
        models_dir.display()
    )
}

/// Config pointing at the test server and an output directory.
pub fn config_for(base: &str, models_dir: &Path) -> Config {
    Config::from_yaml(&config_yaml(base, models_dir)).expect("valid test config")
}

/// A model-version body in the registry's wire format.
pub fn version_json(base: &str, version_id: u64, images: &[(&str, &str)], description: Option<&str>) -> Value {
    let images: Vec<Value> = images
        .iter()
        .map(|(path, kind)| json!({
            "url": format!("{}{}", base, path),
            "type": kind,
            "width": 832,
            "height": 1216,
            "nsfwLevel": 1
        }))
        .collect();
    json!({
        "id": version_id,
        "modelId": 328553,
        "name": "v1.0",
        "baseModel": "SDXL 1.0",
        "files": [{
            "id": 282900,
            "sizeKB": 223101.45,
            "name": "pixel-art-xl.safetensors",
            "type": "Model",
            "downloadUrl": format!("{}/api/download/models/{}", base, version_id)
        }],
        "images": images,
        "description": description,
        "downloadUrl": format!("{}/api/download/models/{}", base, version_id)
    })
}

/// Sorted file names in `dir`, empty when it does not exist.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Request counter shared with route handlers.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
