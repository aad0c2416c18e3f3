//! Serving files from a directory under a URL prefix.

use std::fs;
use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::response::Response;

/// A directory exposed under a URL prefix.
///
/// ```rust,no_run
/// use tern::{App, StaticFiles};
///
/// let app = App::new().static_files(StaticFiles::new("./public", "/static/"));
/// // GET /static/css/site.css → ./public/css/site.css
/// ```
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
    prefix: String,
}

impl StaticFiles {
    /// Name of the path variable carrying the asset path.
    pub const VARIABLE: &'static str = "asset_path";

    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        let prefix = format!("/{}", prefix.trim_matches('/'));
        Self { root: root.into(), prefix }
    }

    pub fn root(&self) -> &Path { &self.root }
    pub fn prefix(&self) -> &str { &self.prefix }

    pub(crate) fn route_template(&self) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        format!("{prefix}/<any:{}>", Self::VARIABLE)
    }

    /// Maps an asset path onto the root. `None` when any component would
    /// leave it (`..`, an absolute path, a drive prefix).
    fn resolve(&self, asset_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(asset_path).decode_utf8().ok()?;
        let mut path = self.root.clone();
        for component in Path::new(decoded.as_ref()).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }

    /// The file at `asset_path` with a content type guessed from its
    /// extension, or a 404.
    pub fn serve(&self, asset_path: &str) -> Response {
        let Some(path) = self.resolve(asset_path) else {
            debug!(asset_path, "rejecting asset path outside the root");
            return not_found();
        };
        if !path.is_file() {
            return not_found();
        }
        match fs::read(&path) {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                Response::builder().typed(mime.essence_str(), bytes)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "asset unreadable");
                not_found()
            }
        }
    }
}

fn not_found() -> Response {
    Response::builder().status(StatusCode::NOT_FOUND).html("Not Found")
}
