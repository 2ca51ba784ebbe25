//! Raw text of predicted and converted structures, for the 3D viewer.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use foldrun_core::collector::MOLECULES_DIR;
use foldrun_core::store::ArtifactStore;

use crate::state::SharedState;

const STRUCTURE_EXTENSIONS: [&str; 2] = ["cif", "pdb"];

/// Accept bare `.cif`/`.pdb` file names only.
fn is_structure_file(file: &str) -> bool {
    let path = FsPath::new(file);
    let bare = path.file_name().and_then(|n| n.to_str()) == Some(file) && !file.starts_with('.');
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STRUCTURE_EXTENSIONS.contains(&e));
    bare && ext_ok
}

pub async fn api_structure(State(state): State<SharedState>, Path(file): Path<String>) -> Response {
    if !is_structure_file(&file) {
        return (StatusCode::BAD_REQUEST, "expected a .cif or .pdb file name").into_response();
    }

    let key = format!("{MOLECULES_DIR}/{file}");
    match state.results.exists(&key).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::NOT_FOUND, format!("{file} not found")).into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }

    match state.results.read(&key).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            String::from_utf8_lossy(&bytes).into_owned(),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Could not read structure");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
