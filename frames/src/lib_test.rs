use super::*;
use serde_json::json;

fn sample_stroke() -> Stroke {
    Stroke {
        id: "a".to_owned(),
        points: vec![Point::new(0.0, 0.0)],
        color: Color::rgba(0.0, 0.0, 0.0, 1.0),
        thickness: 2.0,
        user_id: "u1".to_owned(),
    }
}

// =============================================================
// Wire shape
// =============================================================

#[test]
fn stroke_add_uses_type_payload_envelope_with_camel_case_fields() {
    let text = encode_message(&Message::stroke_add(sample_stroke())).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(
        value,
        json!({
            "type": "stroke:add",
            "payload": {
                "stroke": {
                    "id": "a",
                    "points": [{"x": 0.0, "y": 0.0}],
                    "color": {"r": 0.0, "g": 0.0, "b": 0.0, "a": 1.0},
                    "thickness": 2.0,
                    "userId": "u1"
                }
            }
        })
    );
}

#[test]
fn decodes_every_client_message_from_literal_json() {
    let cases = [
        (r#"{"type":"stroke:remove","payload":{"strokeId":"a"}}"#, Message::stroke_remove("a")),
        (r#"{"type":"stroke:move","payload":{"strokeId":"a","dx":3,"dy":-4.5}}"#, Message::stroke_move("a", 3.0, -4.5)),
        (r#"{"type":"board:clear","payload":{"userId":"u1"}}"#, Message::board_clear("u1")),
        (
            r#"{"type":"chat:message","payload":{"userId":"u1","username":"A","message":"hi"}}"#,
            Message::chat("u1", "A", "hi"),
        ),
        (r#"{"type":"user:join","payload":{"userId":"u1","username":"A"}}"#, Message::user_join("u1", "A")),
    ];
    for (text, expected) in cases {
        assert_eq!(decode_message(text).expect(text), expected);
    }
}

#[test]
fn snapshot_messages_decode_with_camel_case_history() {
    let text = r#"{"type":"chat:sync","payload":{"chatHistory":[{"userId":"u1","username":"A","message":"hi"}]}}"#;
    let Message::ChatSync(sync) = decode_message(text).expect("decode") else {
        panic!("expected chat:sync");
    };
    assert_eq!(sync.chat_history, vec![ChatEntry { user_id: "u1".into(), username: "A".into(), message: "hi".into() }]);

    let text = r#"{"type":"board:sync","payload":{"strokes":[],"users":[]}}"#;
    assert_eq!(decode_message(text).expect("decode"), Message::BoardSync(BoardSync::default()));
}

#[test]
fn unknown_payload_fields_are_ignored() {
    let text = r#"{"type":"stroke:remove","payload":{"strokeId":"a","extra":true},"ts":1}"#;
    assert_eq!(decode_message(text).expect("decode"), Message::stroke_remove("a"));
}

// =============================================================
// Rejections
// =============================================================

#[test]
fn malformed_json_is_a_json_error() {
    let err = decode_message("{not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn unknown_type_is_reported_by_tag() {
    let err = decode_message(r#"{"type":"board:reset","payload":{}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::UnknownType(ref tag) if tag == "board:reset"));
}

#[test]
fn missing_type_is_a_json_error() {
    let err = decode_message(r#"{"payload":{"strokeId":"a"}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn payload_shape_mismatch_is_a_json_error() {
    let err = decode_message(r#"{"type":"stroke:move","payload":{"strokeId":"a"}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn out_of_range_color_is_invalid() {
    let mut stroke = sample_stroke();
    stroke.color.g = 1.5;
    let text = serde_json::to_string(&Message::stroke_add(stroke)).expect("serialize");
    let err = decode_message(&text).expect_err("should fail");
    assert!(matches!(
        err,
        CodecError::Invalid(ValidationError::ColorOutOfRange { channel: "g", .. })
    ));
}

#[test]
fn non_positive_thickness_is_invalid() {
    let mut stroke = sample_stroke();
    stroke.thickness = 0.0;
    assert_eq!(stroke.validate(), Err(ValidationError::BadThickness(0.0)));
    stroke.thickness = -1.0;
    assert!(encode_message(&Message::stroke_add(stroke)).is_err());
}

#[test]
fn empty_stroke_id_is_invalid() {
    assert_eq!(Message::stroke_remove("").validate(), Err(ValidationError::EmptyStrokeId));
    assert_eq!(Message::stroke_move("", 1.0, 1.0).validate(), Err(ValidationError::EmptyStrokeId));
}

#[test]
fn non_finite_geometry_is_invalid() {
    let mut stroke = sample_stroke();
    stroke.points.push(Point::new(f64::NAN, 1.0));
    assert_eq!(stroke.validate(), Err(ValidationError::NonFinitePoint { index: 1 }));
    assert_eq!(
        Message::stroke_move("a", f64::INFINITY, 0.0).validate(),
        Err(ValidationError::NonFiniteDelta)
    );
}

// =============================================================
// Kinds
// =============================================================

#[test]
fn kind_tags_are_closed_and_distinct() {
    for kind in MessageKind::ALL {
        assert_eq!(MessageKind::from_tag(kind.as_str()), Some(kind));
    }
    assert_eq!(MessageKind::from_tag("stroke:update"), None);
    assert_eq!(MessageKind::from_tag(""), None);
}

#[test]
fn only_snapshots_are_relay_originated() {
    let relay_only: Vec<_> = MessageKind::ALL
        .into_iter()
        .filter(|kind| !kind.is_client_originated())
        .collect();
    assert_eq!(relay_only, vec![MessageKind::BoardSync, MessageKind::ChatSync]);
}

#[test]
fn message_kind_matches_serialized_tag() {
    let msg = Message::chat("u1", "A", "hi");
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], json!(msg.kind().as_str()));
    assert_eq!(msg.kind().to_string(), "chat:message");
}

#[test]
fn check_translate_flags_the_first_point_that_would_overflow() {
    let mut stroke = sample_stroke();
    stroke.points.push(Point::new(-1e308, 0.0));
    assert_eq!(stroke.check_translate(1.0, 1.0), Ok(()));
    assert_eq!(
        stroke.check_translate(-1e308, 0.0),
        Err(ValidationError::TranslationOverflow { index: 1 })
    );
}

#[test]
fn translate_moves_every_point() {
    let mut stroke = sample_stroke();
    stroke.points.push(Point::new(10.0, -2.0));
    stroke.translate(1.5, 2.0);
    assert_eq!(stroke.points, vec![Point::new(1.5, 2.0), Point::new(11.5, 0.0)]);
}
