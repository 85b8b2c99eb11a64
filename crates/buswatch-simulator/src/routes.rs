//! Route sources for the simulated fleet.
//!
//! A route file is a JSON object with a `name` and a `coordinates` array of
//! `[lat, lng]` pairs. Other keys are ignored.

use std::path::{Path, PathBuf};

use buswatch_types::Route;
use tracing::debug;

use crate::error::SimulatorError;

/// Anything that can hand the fleet its routes.
pub trait RouteSource {
    /// Load every route this source knows about, in a stable order.
    fn load_routes(&self) -> Result<Vec<Route>, SimulatorError>;
}

impl RouteSource for Vec<Route> {
    fn load_routes(&self) -> Result<Vec<Route>, SimulatorError> {
        Ok(self.clone())
    }
}

/// A directory of `*.json` route files, read in file-name order.
#[derive(Debug, Clone)]
pub struct RouteDirectory {
    path: PathBuf,
}

impl RouteDirectory {
    /// Point at a directory of route files.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The directory being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteSource for RouteDirectory {
    fn load_routes(&self) -> Result<Vec<Route>, SimulatorError> {
        let entries = std::fs::read_dir(&self.path).map_err(|e| {
            SimulatorError::Routes(format!("cannot read {}: {e}", self.path.display()))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| SimulatorError::Routes(format!("cannot list {}: {e}", self.path.display())))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        files.iter().map(|file| load_route_file(file)).collect()
    }
}

fn load_route_file(file: &Path) -> Result<Route, SimulatorError> {
    let contents = std::fs::read_to_string(file)
        .map_err(|e| SimulatorError::Routes(format!("cannot read {}: {e}", file.display())))?;
    let route: Route = serde_json::from_str(&contents)
        .map_err(|e| SimulatorError::Routes(format!("invalid route file {}: {e}", file.display())))?;
    debug!(route = route.name(), points = route.len(), file = %file.display(), "Route loaded");
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scratch directory unique to this process and test.
    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("buswatch-{test}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let created = std::fs::create_dir_all(&dir);
        assert!(created.is_ok(), "{created:?}");
        dir
    }

    #[test]
    fn loads_json_files_in_name_order() {
        let dir = scratch_dir("routes-order");
        let written = [
            std::fs::write(dir.join("b.json"), r#"{"name":"B","coordinates":[[1.0,2.0]]}"#),
            std::fs::write(
                dir.join("a.json"),
                r#"{"name":"A","station_start_name":"x","coordinates":[[3.0,4.0],[5.0,6.0]]}"#,
            ),
            std::fs::write(dir.join("notes.txt"), "not a route"),
        ];
        assert!(written.iter().all(Result::is_ok));

        let routes = RouteDirectory::new(&dir).load_routes();
        let names: Vec<String> = routes
            .unwrap_or_default()
            .iter()
            .map(|r| r.name().to_owned())
            .collect();
        assert_eq!(names, vec![String::from("A"), String::from("B")]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_route_file_is_an_error() {
        let dir = scratch_dir("routes-empty");
        let written = std::fs::write(dir.join("x.json"), r#"{"name":"X","coordinates":[]}"#);
        assert!(written.is_ok());

        let result = RouteDirectory::new(&dir).load_routes();
        assert!(matches!(result, Err(SimulatorError::Routes(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = RouteDirectory::new("/definitely/not/a/route/dir").load_routes();
        assert!(matches!(result, Err(SimulatorError::Routes(_))));
    }

    #[test]
    fn bundled_routes_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("routes");
        if dir.exists() {
            let routes = RouteDirectory::new(dir).load_routes();
            assert!(routes.is_ok(), "Failed to load bundled routes: {routes:?}");
        }
    }
}
