// End-to-end runs through the public API: edit a grid, save and reload it,
// export it. No sound device involved.

use std::io::Cursor;

use sidgrid::pipeline::persistence;
use sidgrid::pipeline::render::OfflineRenderer;
use sidgrid::pipeline::selection::Selection;
use sidgrid::{Config, ExportError, Grid, Project};

#[test]
fn place_then_delete_from_the_middle() {
    let mut grid = Grid::default();
    assert_eq!(grid.place(0, 0, 0, 4), Ok(true));
    assert!(grid.is_continuation(0, 0, 2));

    assert!(grid.delete_at(0, 0, 2));
    assert_eq!(grid.note_at(0, 0, 0), None);
    assert!(!grid.is_continuation(0, 0, 2));
    assert_eq!(grid.note_count(), 0);
}

#[test]
fn overlap_is_reported_with_the_blocking_note() {
    let mut grid = Grid::default();
    grid.place(1, 10, 4, 4).unwrap();
    let err = grid.place(1, 10, 2, 3).unwrap_err();
    assert_eq!(err.existing_col, 4);
    // other rows and voices are independent lanes
    assert_eq!(grid.place(1, 11, 2, 3), Ok(true));
    assert_eq!(grid.place(2, 10, 2, 3), Ok(true));
}

#[test]
fn project_survives_a_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::default();
    project.bpm = 140;
    project.grid.place(0, 15, 0, 4).unwrap();
    project.grid.place(2, 36, 63, 1).unwrap();
    let sel = Selection::new(0, 15..16, 0..4);
    assert!(project.grid.duplicate(&sel));

    persistence::save_project(dir.path(), &project).unwrap();
    let loaded = persistence::load_project(dir.path()).unwrap();
    assert_eq!(loaded, project);
    assert_eq!(loaded.grid.notes(0), vec![(15, 0, 4), (15, 4, 4)]);
}

#[test]
fn export_default_project_to_wav() {
    let renderer = OfflineRenderer::new(Config::default());
    let mut project = Project::default();
    project.grid.place(0, 15, 0, 8).unwrap();
    project.grid.place(1, 20, 16, 4).unwrap();
    assert!((renderer.render_duration(&project) - 9.0).abs() < 1e-12);

    let mut buf = Cursor::new(Vec::new());
    let audio = renderer.export_wav(&project, &mut buf, |_| {}).unwrap();
    assert!(audio.peak() > 0.0);
    assert!(audio.peak() <= 1.0);

    buf.set_position(0);
    let reader = hound::WavReader::new(buf).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration() as usize, 9 * 44100);
}

#[test]
fn export_to_file_then_busy_is_free_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.wav");
    let renderer = OfflineRenderer::new(Config::default());
    let mut project = Project::default();
    project.grid = Grid::new(16);
    project.grid.place(2, 3, 0, 2).unwrap();

    let result = renderer.export_wav_file(&project, &path, |_| {});
    assert!(!matches!(result, Err(ExportError::Busy)));
    assert!(path.exists());
    assert!(!renderer.is_busy());
}
