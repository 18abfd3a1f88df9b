use serde_json::Value;

use crate::types::Direction;

#[derive(Debug)]
pub enum ParsedClientMessage {
    Hello {
        name: String,
        reconnect_token: Option<String>,
    },
    Start {
        seed: Option<u64>,
        time_limit_seconds: Option<i64>,
        debug_paths: bool,
    },
    Input {
        dir: Direction,
    },
    Debug {
        enabled: bool,
    },
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            let reconnect_token = match object.get("reconnectToken") {
                None => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            Some(ParsedClientMessage::Hello {
                name,
                reconnect_token,
            })
        }
        "start" => {
            let seed = match object.get("seed") {
                None => None,
                Some(value) => Some(value.as_u64()?),
            };
            let time_limit_seconds = match object.get("timeLimitSeconds") {
                None => None,
                Some(value) => Some(value.as_i64()?),
            };
            let debug_paths = match object.get("debugPaths") {
                None => false,
                Some(value) => value.as_bool()?,
            };
            Some(ParsedClientMessage::Start {
                seed,
                time_limit_seconds,
                debug_paths,
            })
        }
        "input" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Input { dir })
        }
        "debug" => {
            let enabled = object.get("enabled")?.as_bool()?;
            Some(ParsedClientMessage::Debug { enabled })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

pub fn normalize_time_limit_ms(value: Option<i64>) -> Option<u64> {
    value.map(|seconds| seconds.clamp(30, 1_800) as u64 * 1_000)
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_time_limit_ms, parse_client_message, sanitize_name, ParsedClientMessage,
    };
    use crate::types::Direction;

    #[test]
    fn parses_hello_with_optional_token() {
        let parsed = parse_client_message(r#"{"type":"hello","name":"Alice"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Hello { ref name, ref reconnect_token })
                if name == "Alice" && reconnect_token.is_none()
        ));

        let parsed =
            parse_client_message(r#"{"type":"hello","name":"Bob","reconnectToken":"tok"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Hello { ref reconnect_token, .. })
                if reconnect_token.as_deref() == Some("tok")
        ));
    }

    #[test]
    fn parses_start_with_defaults() {
        let parsed = parse_client_message(r#"{"type":"start"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Start {
                seed: None,
                time_limit_seconds: None,
                debug_paths: false,
            })
        ));

        let parsed = parse_client_message(
            r#"{"type":"start","seed":7,"timeLimitSeconds":120,"debugPaths":true}"#,
        );
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Start {
                seed: Some(7),
                time_limit_seconds: Some(120),
                debug_paths: true,
            })
        ));
    }

    #[test]
    fn parses_input_directions() {
        let parsed = parse_client_message(r#"{"type":"input","dir":"left"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Input {
                dir: Direction::Left
            })
        ));
        assert!(parse_client_message(r#"{"type":"input","dir":"sideways"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"input"}"#).is_none());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message(r#"{"type":"unknown"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"hello"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"start","seed":"seven"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"debug"}"#).is_none());
    }

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn normalize_time_limit_ms_clamps_seconds() {
        assert_eq!(normalize_time_limit_ms(None), None);
        assert_eq!(normalize_time_limit_ms(Some(-5)), Some(30_000));
        assert_eq!(normalize_time_limit_ms(Some(120)), Some(120_000));
        assert_eq!(normalize_time_limit_ms(Some(999_999)), Some(1_800_000));
    }
}
