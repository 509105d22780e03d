// load on startup, save on quit; the project lives next to whatever the user is working on
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ProjectError;
use crate::pipeline::project::Project;

const SIDGRID_DIR: &str = ".sidgrid";
const PROJECT_FILE: &str = "project.json";
const LOG_FILE: &str = "sidgrid.log";

// <project_dir>/.sidgrid/project.json
pub fn project_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(SIDGRID_DIR).join(PROJECT_FILE)
}

pub fn log_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(SIDGRID_DIR).join(LOG_FILE)
}

pub fn from_json(json: &str) -> Result<Project, ProjectError> {
    Ok(serde_json::from_str(json)?)
}

pub fn to_json(project: &Project) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(project)?)
}

pub fn load_project(project_dir: &Path) -> Result<Project, ProjectError> {
    let path = project_file_path(project_dir);
    let data = std::fs::read_to_string(&path)?;
    let project = from_json(&data)?;
    debug!(path = %path.display(), notes = project.grid.note_count(), "project loaded");
    Ok(project)
}

// a missing or broken file just means a fresh project
pub fn load_or_default(project_dir: &Path) -> Project {
    match load_project(project_dir) {
        Ok(project) => project,
        Err(ProjectError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Project::default(),
        Err(e) => {
            warn!("could not load project, starting empty: {e}");
            Project::default()
        }
    }
}

// Save the project state to disk, making the directory if it doesn't exist already
pub fn save_project(project_dir: &Path, project: &Project) -> Result<(), ProjectError> {
    let path = project_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, to_json(project)?)?;
    debug!(path = %path.display(), "project saved");
    Ok(())
}
