//! Shared message model and JSON codec for the realtime board channel.
//!
//! This crate owns the wire representation used by both `server` and `client`.
//! Every frame on the socket is a text JSON object of the form
//! `{ "type": <tag>, "payload": { ... } }`. The set of tags is closed: a body
//! that does not parse, carries an unknown tag, or fails field validation is
//! rejected by [`decode_message`] and never reaches application code.
//!
//! DESIGN
//! ======
//! - One enum variant per tag, one payload struct per variant. Payload field
//!   names are camelCase on the wire (`strokeId`, `userId`, `chatHistory`).
//! - Decoding happens in two steps: the envelope tag is checked against
//!   [`MessageKind`] first so unknown tags are reported distinctly from
//!   malformed payloads, then the typed message is decoded and validated.
//! - `board:sync` and `chat:sync` are synthesized by the relay only; see
//!   [`MessageKind::is_client_originated`].

use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by [`decode_message`] and [`encode_message`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The body is not JSON, or the payload does not match its tag's shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// The envelope `type` is not one of the protocol tags.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// The message parsed but violates a field constraint.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationError),
}

/// Field-level constraint violated by an otherwise well-formed message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("stroke id must not be empty")]
    EmptyStrokeId,
    #[error("stroke thickness must be a positive finite number, got {0}")]
    BadThickness(f64),
    #[error("color channel `{channel}` must be within [0, 1], got {value}")]
    ColorOutOfRange { channel: &'static str, value: f64 },
    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },
    #[error("move delta must be finite")]
    NonFiniteDelta,
    #[error("move would push point {index} of the stroke out of range")]
    TranslationOverflow { index: usize },
}

// =============================================================================
// DATA MODEL
// =============================================================================

/// A point in board coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// RGBA color with every channel in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    #[must_use]
    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// # Errors
    ///
    /// [`ValidationError::ColorOutOfRange`] for the first channel outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (channel, value) in [("r", self.r), ("g", self.g), ("b", self.b), ("a", self.a)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::ColorOutOfRange { channel, value });
            }
        }
        Ok(())
    }
}

/// One freehand stroke. Identity is `id`; the geometry never changes except
/// through `stroke:move` deltas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: String,
    pub points: Vec<Point>,
    pub color: Color,
    pub thickness: f64,
    pub user_id: String,
}

impl Stroke {
    /// Check the stroke's field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyStrokeId);
        }
        if !self.thickness.is_finite() || self.thickness <= 0.0 {
            return Err(ValidationError::BadThickness(self.thickness));
        }
        self.color.validate()?;
        for (index, point) in self.points.iter().enumerate() {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(ValidationError::NonFinitePoint { index });
            }
        }
        Ok(())
    }

    /// Check that shifting by `(dx, dy)` keeps every coordinate finite.
    ///
    /// # Errors
    ///
    /// [`ValidationError::TranslationOverflow`] for the first point that would
    /// leave the representable range.
    pub fn check_translate(&self, dx: f64, dy: f64) -> Result<(), ValidationError> {
        for (index, point) in self.points.iter().enumerate() {
            if !(point.x + dx).is_finite() || !(point.y + dy).is_finite() {
                return Err(ValidationError::TranslationOverflow { index });
            }
        }
        Ok(())
    }

    /// Shift every point by `(dx, dy)`. Callers check with
    /// [`Stroke::check_translate`] first.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for point in &mut self.points {
            point.x += dx;
            point.y += dy;
        }
    }
}

/// One chat line. Also the payload of `chat:message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub user_id: String,
    pub username: String,
    pub message: String,
}

/// Presence announcement. Also the element type of `board:sync.users`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub user_id: String,
    pub username: String,
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeAdd {
    pub stroke: Stroke,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRemove {
    pub stroke_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeMove {
    pub stroke_id: String,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardClear {
    pub user_id: String,
}

/// Full board snapshot sent to a newly connected session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSync {
    pub strokes: Vec<Stroke>,
    pub users: Vec<UserPresence>,
}

/// Full chat snapshot sent to a newly connected session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSync {
    pub chat_history: Vec<ChatEntry>,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// The closed set of protocol messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    #[serde(rename = "stroke:add")]
    StrokeAdd(StrokeAdd),
    #[serde(rename = "stroke:remove")]
    StrokeRemove(StrokeRemove),
    #[serde(rename = "stroke:move")]
    StrokeMove(StrokeMove),
    #[serde(rename = "board:clear")]
    BoardClear(BoardClear),
    #[serde(rename = "chat:message")]
    ChatMessage(ChatEntry),
    #[serde(rename = "user:join")]
    UserJoin(UserPresence),
    #[serde(rename = "board:sync")]
    BoardSync(BoardSync),
    #[serde(rename = "chat:sync")]
    ChatSync(ChatSync),
}

/// Tag of a [`Message`], usable without the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    StrokeAdd,
    StrokeRemove,
    StrokeMove,
    BoardClear,
    ChatMessage,
    UserJoin,
    BoardSync,
    ChatSync,
}

impl MessageKind {
    pub const ALL: [Self; 8] = [
        Self::StrokeAdd,
        Self::StrokeRemove,
        Self::StrokeMove,
        Self::BoardClear,
        Self::ChatMessage,
        Self::UserJoin,
        Self::BoardSync,
        Self::ChatSync,
    ];

    /// Wire tag, e.g. `"stroke:add"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrokeAdd => "stroke:add",
            Self::StrokeRemove => "stroke:remove",
            Self::StrokeMove => "stroke:move",
            Self::BoardClear => "board:clear",
            Self::ChatMessage => "chat:message",
            Self::UserJoin => "user:join",
            Self::BoardSync => "board:sync",
            Self::ChatSync => "chat:sync",
        }
    }

    /// Look up a wire tag. `None` for anything outside the protocol.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Whether clients may send this kind. Snapshots are relay-only.
    #[must_use]
    pub fn is_client_originated(self) -> bool {
        !matches!(self, Self::BoardSync | Self::ChatSync)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::StrokeAdd(_) => MessageKind::StrokeAdd,
            Self::StrokeRemove(_) => MessageKind::StrokeRemove,
            Self::StrokeMove(_) => MessageKind::StrokeMove,
            Self::BoardClear(_) => MessageKind::BoardClear,
            Self::ChatMessage(_) => MessageKind::ChatMessage,
            Self::UserJoin(_) => MessageKind::UserJoin,
            Self::BoardSync(_) => MessageKind::BoardSync,
            Self::ChatSync(_) => MessageKind::ChatSync,
        }
    }

    /// Check field constraints for every stroke the message carries.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::StrokeAdd(add) => add.stroke.validate(),
            Self::StrokeRemove(remove) => non_empty_id(&remove.stroke_id),
            Self::StrokeMove(mv) => {
                non_empty_id(&mv.stroke_id)?;
                if mv.dx.is_finite() && mv.dy.is_finite() {
                    Ok(())
                } else {
                    Err(ValidationError::NonFiniteDelta)
                }
            }
            Self::BoardSync(sync) => sync.strokes.iter().try_for_each(Stroke::validate),
            Self::BoardClear(_) | Self::ChatMessage(_) | Self::UserJoin(_) | Self::ChatSync(_) => Ok(()),
        }
    }

    /// Convenience constructor for `stroke:add`.
    #[must_use]
    pub fn stroke_add(stroke: Stroke) -> Self {
        Self::StrokeAdd(StrokeAdd { stroke })
    }

    /// Convenience constructor for `stroke:remove`.
    pub fn stroke_remove(stroke_id: impl Into<String>) -> Self {
        Self::StrokeRemove(StrokeRemove { stroke_id: stroke_id.into() })
    }

    /// Convenience constructor for `stroke:move`.
    pub fn stroke_move(stroke_id: impl Into<String>, dx: f64, dy: f64) -> Self {
        Self::StrokeMove(StrokeMove { stroke_id: stroke_id.into(), dx, dy })
    }

    /// Convenience constructor for `board:clear`.
    pub fn board_clear(user_id: impl Into<String>) -> Self {
        Self::BoardClear(BoardClear { user_id: user_id.into() })
    }

    /// Convenience constructor for `chat:message`.
    pub fn chat(user_id: impl Into<String>, username: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChatMessage(ChatEntry { user_id: user_id.into(), username: username.into(), message: message.into() })
    }

    /// Convenience constructor for `user:join`.
    pub fn user_join(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::UserJoin(UserPresence { user_id: user_id.into(), username: username.into() })
    }
}

fn non_empty_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() { Err(ValidationError::EmptyStrokeId) } else { Ok(()) }
}

// =============================================================================
// CODEC
// =============================================================================

/// Only the tag is read here; the payload is decoded by [`Message`] itself.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode and validate one text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for bodies that are not JSON or whose payload
/// does not match the tag, [`CodecError::UnknownType`] for tags outside the
/// protocol, and [`CodecError::Invalid`] for field violations.
pub fn decode_message(text: &str) -> Result<Message, CodecError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if MessageKind::from_tag(&envelope.kind).is_none() {
        return Err(CodecError::UnknownType(envelope.kind));
    }
    let message: Message = serde_json::from_str(text)?;
    message.validate()?;
    Ok(message)
}

/// Validate and encode one message as a text frame.
///
/// # Errors
///
/// Returns [`CodecError::Invalid`] if the message violates a field constraint.
pub fn encode_message(message: &Message) -> Result<String, CodecError> {
    message.validate()?;
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
