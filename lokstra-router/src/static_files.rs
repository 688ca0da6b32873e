//! Static-file and SPA fallback mounts (spec §4.B "Fallback mounts").
//!
//! SPA mode: a missing path with no extension on its last segment serves
//! `index.html` verbatim; a missing path with an extension 404s. Non-SPA
//! mode always 404s on a missing file (spec §8 property 7).

use http::StatusCode;
use lokstra_core::{Body, LokstraError, Response};
use std::path::{Path, PathBuf};

/// A static-file mount: a filesystem root plus SPA fallback mode.
pub struct StaticMount {
    root: PathBuf,
    spa: bool,
}

impl StaticMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StaticMount { root: root.into(), spa: false }
    }

    pub fn spa(mut self, enabled: bool) -> Self {
        self.spa = enabled;
        self
    }

    fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let clean = requested.trim_start_matches('/');
        let candidate = self.root.join(clean);
        if candidate.is_file() {
            return Some(candidate);
        }
        if self.spa && last_segment_has_no_extension(clean) {
            let index = self.root.join("index.html");
            if index.is_file() {
                return Some(index);
            }
        }
        None
    }

    fn serve(&self, requested: &str) -> Response {
        match self.resolve(requested) {
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => {
                    let content_type = guess_content_type(&path);
                    let mut resp = Response::new(StatusCode::OK, Body::Full(bytes.into()));
                    if let Ok(value) = http::HeaderValue::from_str(content_type) {
                        resp.headers_mut().insert(http::header::CONTENT_TYPE, value);
                    }
                    resp
                }
                Err(_) => LokstraError::NotFound(format!("file not found: {requested}")).into_response(),
            },
            None => LokstraError::NotFound(format!("file not found: {requested}")).into_response(),
        }
    }

    /// Adapt this mount into the façade's [`crate::router::Handler`] shape;
    /// the `{rest...}` path param supplies the requested sub-path.
    pub fn into_handler(self) -> lokstra_core::MiddlewareFn {
        use lokstra_core::{Ctx, IntoResponse};
        std::sync::Arc::new(move |ctx: &mut Ctx| {
            let requested = ctx.path_param("rest", "");
            let resp = self.serve(&requested);
            Box::pin(async move {
                ctx.respond(resp.into_response());
                Ok::<(), LokstraError>(())
            })
        })
    }
}

fn last_segment_has_no_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    !last.contains('.')
}

fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn serves_existing_file() {
        let dir = scratch_dir(&[("app.js", "console.log(1)")]);
        let mount = StaticMount::new(dir.path());
        let resp = mount.serve("app.js");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"console.log(1)");
    }

    #[test]
    fn spa_mode_falls_back_to_index_for_extensionless_path() {
        let dir = scratch_dir(&[("index.html", "<html></html>")]);
        let mount = StaticMount::new(dir.path()).spa(true);
        let resp = mount.serve("dashboard/settings");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"<html></html>");
    }

    #[test]
    fn spa_mode_404s_missing_path_with_extension() {
        let dir = scratch_dir(&[("index.html", "<html></html>")]);
        let mount = StaticMount::new(dir.path()).spa(true);
        let resp = mount.serve("missing.png");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn non_spa_mode_404s_missing_extensionless_path() {
        let dir = scratch_dir(&[("index.html", "<html></html>")]);
        let mount = StaticMount::new(dir.path());
        let resp = mount.serve("dashboard");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
