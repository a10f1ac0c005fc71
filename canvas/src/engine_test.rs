use frames::{Color, Point, Stroke};

use super::*;

fn stroke(id: &str) -> Stroke {
    Stroke {
        id: id.to_owned(),
        points: vec![Point::new(1.0, 1.0)],
        color: Color::BLACK,
        thickness: 2.0,
        user_id: "u1".to_owned(),
    }
}

// =============================================================
// Readiness
// =============================================================

#[test]
fn new_engine_is_not_ready() {
    let mut engine = Engine::new();
    assert!(!engine.is_ready());
    assert_eq!(engine.add(stroke("a")), Err(EngineError::NotReady));
    assert_eq!(engine.clear(), Err(EngineError::NotReady));
    assert_eq!(engine.strokes().map(<[Stroke]>::len), Err(EngineError::NotReady));
    assert!(engine.is_empty());
}

#[test]
fn mount_enables_operations() {
    let mut engine = Engine::new();
    engine.mount();
    assert_eq!(engine.add(stroke("a")), Ok(0));
    assert_eq!(engine.len(), 1);
}

#[test]
fn unmount_keeps_strokes_but_refuses_mutation() {
    let mut engine = Engine::mounted();
    engine.add(stroke("a")).expect("add");
    engine.unmount();
    assert_eq!(engine.remove_at(0), Err(EngineError::NotReady));
    assert_eq!(engine.len(), 1);
}

// =============================================================
// Positional operations
// =============================================================

#[test]
fn remove_at_returns_the_stroke() {
    let mut engine = Engine::mounted();
    engine.add(stroke("a")).expect("add");
    engine.add(stroke("b")).expect("add");
    let removed = engine.remove_at(0).expect("remove");
    assert_eq!(removed.id, "a");
    assert_eq!(engine.stroke(0).map(|s| s.id.as_str()), Some("b"));
}

#[test]
fn bad_index_is_reported_with_length() {
    let mut engine = Engine::mounted();
    engine.add(stroke("a")).expect("add");
    assert_eq!(engine.remove_at(3), Err(EngineError::IndexOutOfRange { index: 3, len: 1 }));
    assert_eq!(
        engine.translate_at(1, 0.0, 0.0),
        Err(EngineError::IndexOutOfRange { index: 1, len: 1 })
    );
}

#[test]
fn insert_at_places_stroke_before_later_ones() {
    let mut engine = Engine::mounted();
    engine.add(stroke("a")).expect("add");
    engine.add(stroke("c")).expect("add");
    engine.insert_at(1, stroke("b")).expect("insert");
    assert_eq!(engine.stroke(1).map(|s| s.id.as_str()), Some("b"));
    assert_eq!(engine.insert_at(5, stroke("z")), Err(EngineError::IndexOutOfRange { index: 5, len: 3 }));
}

#[test]
fn translate_at_moves_points() {
    let mut engine = Engine::mounted();
    engine.add(stroke("a")).expect("add");
    engine.translate_at(0, 2.0, 3.0).expect("translate");
    assert_eq!(engine.stroke(0).map(|s| s.points[0]), Some(Point::new(3.0, 4.0)));
}

#[test]
fn load_snapshot_and_clear() {
    let mut engine = Engine::mounted();
    engine.add(stroke("old")).expect("add");
    engine
        .load_snapshot(vec![stroke("x"), stroke("y")])
        .expect("snapshot");
    let ids: Vec<_> = engine
        .strokes()
        .expect("strokes")
        .iter()
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(ids, ["x", "y"]);

    engine.clear().expect("clear");
    assert!(engine.is_empty());
}
