use std::path::PathBuf;

use courtside::{
    assets::ImageRef,
    model::{Background, Logo, LogoSection, TextElement},
    store::{FsKvStore, StyleStore},
    style::{HexColor, TextRole},
};
use kurbo::Vec2;

fn temp_state(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("courtside-state-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn state_survives_a_reload_from_disk() {
    let dir = temp_state("reload");

    {
        let mut store = StyleStore::load(Box::new(FsKvStore::new(&dir)));
        store.set_role_color(TextRole::Competition, "#123456");
        store.set_shield_size(42.0);

        let mut element = TextElement::new("note");
        element.text = "Jornada 12".to_string();
        element.rotation = 15.0;
        store.upsert_text_element(element);
        store.set_text_position("note", Vec2::new(100.0, -200.0)).unwrap();

        store.upsert_logo(Logo::empty("club", "Club", LogoSection::Bottom));
        store.set_logo_position("club", Vec2::new(50.0, 20.0)).unwrap();

        store.upsert_background(Background {
            id: "bg".to_string(),
            image: ImageRef::new("https://img.example.com/court.png"),
            name: "court".to_string(),
            opacity: 0.8,
        });
        store.select_background("bg", None).unwrap();
    }

    let store = StyleStore::load(Box::new(FsKvStore::new(&dir)));

    let styles = store.resolved_styles();
    assert_eq!(
        styles.role(TextRole::Competition).color,
        HexColor::from_rgb(0x12, 0x34, 0x56)
    );
    assert_eq!(styles.shield.size.get(), 42.0);

    let element = &store.text_elements()[0];
    assert_eq!(element.id, "note");
    assert_eq!(element.text, "Jornada 12");
    assert_eq!(element.position, Vec2::new(100.0, -200.0));
    assert_eq!(element.rotation, 15.0);

    let logo = &store.logos()[0];
    assert_eq!(logo.id, "club");
    assert_eq!(logo.position, Vec2::new(50.0, 20.0));
    assert_eq!(logo.section, LogoSection::Bottom);

    let background = store.selected_background().unwrap();
    assert_eq!(background.id, "bg");
    assert_eq!(background.opacity, 0.8);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupted_state_files_fall_back_to_defaults() {
    let dir = temp_state("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("text-colors.json"), "{not valid json").unwrap();
    std::fs::write(dir.join("logos.json"), "[1, 2, 3]").unwrap();

    let store = StyleStore::load(Box::new(FsKvStore::new(&dir)));
    let styles = store.resolved_styles();
    assert_eq!(
        styles.role(TextRole::Competition).color,
        HexColor::from_rgb(0x99, 0x1B, 0x1B)
    );
    assert!(store.logos().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_state_directory_loads_defaults() {
    let dir = temp_state("missing");
    let store = StyleStore::load(Box::new(FsKvStore::new(&dir)));
    assert!(store.text_elements().is_empty());
    assert!(store.backgrounds().is_empty());
    assert!(store.selected_background().is_none());
}
