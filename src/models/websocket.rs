use serde::{ Serialize, Deserialize };
use super::chat::{ ChatMessage, Role };
use crate::markdown::render_markdown;

/// A message as the page draws it: the raw text plus its HTML rendering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub role: Role,
    pub content: String,
    pub html: String,
}

impl From<&ChatMessage> for RenderedMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role(),
            content: msg.content().to_string(),
            html: render_markdown(msg.content()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full transcript, sent once when the session starts.
    #[serde(rename = "history")] History {
        messages: Vec<RenderedMessage>,
    },
    #[serde(rename = "message")] Message {
        role: Role,
        content: String,
        html: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    /// The session could not reach its backend and will not accept input.
    #[serde(rename = "fatal")] Fatal {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
}

impl From<&ChatMessage> for ServerMessage {
    fn from(msg: &ChatMessage) -> Self {
        let RenderedMessage { role, content, html } = RenderedMessage::from(msg);
        ServerMessage::Message { role, content, html }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_frame() {
        let parsed: ClientMessage = serde_json
            ::from_str(r#"{"type":"chat","content":"What is 2+2?"}"#)
            .unwrap();
        let ClientMessage::Chat { content } = parsed;
        assert_eq!(content, "What is 2+2?");
    }

    #[test]
    fn server_frames_are_type_tagged() {
        let json = serde_json::to_string(&ServerMessage::Processing).unwrap();
        assert_eq!(json, r#"{"type":"processing"}"#);

        let json = serde_json::to_string(&ServerMessage::from(&ChatMessage::user("q"))).unwrap();
        assert_eq!(
            json,
            r#"{"type":"message","role":"user","content":"q","html":"<p>q</p>\n"}"#
        );

        let json = serde_json
            ::to_string(&(ServerMessage::Fatal { message: "down".into() }))
            .unwrap();
        assert_eq!(json, r#"{"type":"fatal","message":"down"}"#);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reset"}"#).is_err());
    }
}
