//! Static asset serving.

use std::path::{Path, PathBuf};

use actix_files::NamedFile;
use actix_web::{HttpRequest, HttpResponse, http::Method};
use gateway_core::GatewayError;

use crate::state::AppState;

/// Serve `relative` from `root`. Anything that is not a readable regular file
/// inside `root` is a 404.
pub async fn serve(req: &HttpRequest, root: &Path, relative: &str, state: &AppState) -> HttpResponse {
    let not_found = || {
        state
            .responder
            .respond(req.method(), req.path(), &GatewayError::not_found())
    };

    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        return not_found();
    }

    let Some(path) = resolve_asset(root, relative) else {
        tracing::debug!(path = req.path(), "Refused asset path");
        return not_found();
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return not_found(),
    }

    match NamedFile::open_async(&path).await {
        Ok(file) => file.into_response(req),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open asset");
            not_found()
        }
    }
}

/// Join a percent-encoded request path onto `root`, refusing anything that
/// could leave it.
///
/// Segments are decoded one at a time. Dot segments (including hidden files),
/// separators, drive prefixes and NUL are rejected after decoding.
pub fn resolve_asset(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut pushed = false;

    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        let segment = urlencoding::decode(segment).ok()?;
        if segment.starts_with('.') || segment.contains(['/', '\\', ':', '\0']) {
            return None;
        }
        path.push(&*segment);
        pushed = true;
    }

    pushed.then_some(path)
}
