use super::AssetClassConfig;
use std::path::{Component, Path, PathBuf};

/// Normalizes a configured public prefix to `/a/b` form.
///
/// Backslashes become `/`, repeated separators collapse, exactly one leading
/// separator is kept and trailing ones are dropped. Returns `None` for input
/// that is empty, names the bare root, or contains `.`/`..` segments.
pub fn normalize_prefix(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let unified = raw.replace('\\', "/");
    let segments: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }

    Some(format!("/{}", segments.join("/")))
}

/// Translates between public paths and files under one class's storage root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    preferred_prefix: String,
    accepted_prefixes: Vec<String>,
}

impl PathResolver {
    /// Creates the storage root if needed and pins it to its canonical form.
    pub fn new(config: &AssetClassConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;
        let root = std::fs::canonicalize(&config.storage_root)?;

        Ok(Self {
            root,
            preferred_prefix: config.preferred_prefix.clone(),
            accepted_prefixes: config.accepted_prefixes().map(str::to_string).collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a public path to a file inside the storage root.
    ///
    /// Every accepted prefix is tried, so a short preferred prefix does not
    /// shadow a nested legacy one. `None` means the path is not an asset of
    /// this class, or would land outside the root.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let mut matched = false;
        for prefix in &self.accepted_prefixes {
            let Some(remainder) = strip_prefix_at_boundary(public_path, prefix) else {
                continue;
            };
            matched = true;
            if let Some(path) = self.confine(remainder) {
                return Some(path);
            }
        }

        if matched {
            tracing::warn!(public_path, "Rejected asset path escaping storage root");
        }
        None
    }

    /// The remainder must be exactly one plain filename.
    fn confine(&self, remainder: &str) -> Option<PathBuf> {
        let name = remainder.trim_start_matches(['/', '\\']);
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return None;
        }

        let mut components = Path::new(name).components();
        let (Some(Component::Normal(file)), None) = (components.next(), components.next()) else {
            return None;
        };

        let candidate = self.root.join(file);
        (candidate.parent() == Some(self.root.as_path())).then_some(candidate)
    }

    /// Public path for a generated filename; always uses the preferred prefix.
    pub fn public_path(&self, filename: &str) -> String {
        format!("{}/{}", self.preferred_prefix, filename)
    }
}

// "/uploads/avatars" must not claim "/uploads/avatars-old/x.png".
fn strip_prefix_at_boundary<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(['/', '\\']) {
        Some(rest)
    } else {
        None
    }
}
