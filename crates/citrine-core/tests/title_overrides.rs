use std::fs;
use std::path::Path;
use std::rc::Rc;

use citrine_core::headless::{
    system_save_data_path, HeadlessBackend, HeadlessImage, HeadlessOptions, HeadlessState,
    HeadlessWindow,
};
use citrine_core::{ResultStatus, Settings, System};
use pretty_assertions::assert_eq;

fn boot(program_id: u64, user_dir: &Path) -> (System, Rc<HeadlessState>) {
    let backend = HeadlessBackend::new(HeadlessOptions {
        user_dir: Some(user_dir.to_path_buf()),
        ..HeadlessOptions::default()
    });
    let state = backend.state();
    let mut system = System::new(Box::new(backend), Settings::default());

    let image = user_dir.join("title.ctr");
    fs::write(&image, HeadlessImage::new(program_id).to_bytes()).unwrap();
    assert_eq!(
        system.load(Rc::new(HeadlessWindow::new()), &image),
        ResultStatus::Success
    );
    (system, state)
}

#[test]
fn graphics_hacks_follow_the_title() {
    let dir = tempfile::tempdir().unwrap();
    let (system, state) = boot(0x0004_0000_0006_1300, dir.path());

    let settings = system.settings();
    assert!(settings.display_transfer_hack);
    assert!(settings.skip_slow_draw);
    assert!(!settings.texture_load_hack);
    assert!(system.title_override().is_some());
    assert!(state.save_data().is_empty());
}

#[test]
fn titles_needing_save_data_get_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let program_id = 0x0004_0000_001D_3A00;
    let (system, state) = boot(program_id, dir.path());

    assert_eq!(state.save_data(), vec![program_id]);
    let path = system_save_data_path(dir.path(), program_id);
    assert!(path.ends_with("sdmc/title/00040000/001d3a00/data/SystemData.bin"));
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(system.settings(), &Settings::default());
}

#[test]
fn other_titles_keep_the_user_settings() {
    let dir = tempfile::tempdir().unwrap();
    let (system, state) = boot(0x0004_0000_0000_0100, dir.path());

    assert!(system.title_override().is_none());
    assert_eq!(system.settings(), &Settings::default());
    assert!(state.save_data().is_empty());
    assert!(!dir.path().join("sdmc").exists());
}

#[test]
fn switching_titles_drops_the_previous_override() {
    let dir = tempfile::tempdir().unwrap();
    let (mut system, _state) = boot(0x0004_0000_0006_1300, dir.path());
    assert!(system.settings().display_transfer_hack);

    let plain = dir.path().join("plain.ctr");
    fs::write(&plain, HeadlessImage::new(0x0004_0000_0000_0100).to_bytes()).unwrap();
    assert_eq!(
        system.load(Rc::new(HeadlessWindow::new()), &plain),
        ResultStatus::Success
    );
    assert!(system.title_override().is_none());
    assert_eq!(system.settings(), &Settings::default());
}

#[test]
fn shutdown_restores_the_user_settings() {
    let dir = tempfile::tempdir().unwrap();
    let (mut system, _state) = boot(0x0004_0000_0006_8B00, dir.path());
    assert_ne!(system.settings(), system.base_settings());

    system.shutdown();
    assert!(system.title_override().is_none());
    assert_eq!(system.settings(), &Settings::default());
    assert_eq!(system.base_settings(), &Settings::default());
}
