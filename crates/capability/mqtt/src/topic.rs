use crate::SessionError;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

/// `channels/<channel>/messages[/<subtopic>][?<query>]`，前导 `/` 可选。
static CHANNEL_TOPIC: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^/?channels/([A-Za-z0-9_\-]+)/messages(/[^?]*)?(\?.*)?$").ok()
});

/// 从 MQTT topic 中提取通道 id 与原始 subtopic（未规范化）。
pub fn parse_channel_topic(topic: &str) -> Result<(String, String), SessionError> {
    let pattern = CHANNEL_TOPIC.as_ref().ok_or(SessionError::MalformedTopic)?;
    let captures = pattern.captures(topic).ok_or(SessionError::MalformedTopic)?;
    let channel = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .ok_or(SessionError::MalformedTopic)?;
    let subtopic = captures
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok((channel, subtopic))
}

/// 规范化 subtopic：URL 反转义，`/` 转为 `.`，去掉空段。
///
/// 长度大于 1 的段不允许包含通配符 `*` 或 `>`。
pub fn parse_subtopic(raw: &str) -> Result<String, SessionError> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    let unescaped = query_unescape(raw)?.replace('/', ".");
    let mut segments = Vec::new();
    for segment in unescaped.split('.') {
        if segment.is_empty() {
            continue;
        }
        if segment.len() > 1 && (segment.contains('*') || segment.contains('>')) {
            return Err(SessionError::MalformedSubtopic);
        }
        segments.push(segment);
    }
    Ok(segments.join("."))
}

/// 通道消息对应的 MQTT topic：`channels/<channel>/messages[/<subtopic>]`。
pub fn mqtt_topic(channel: &str, subtopic: &str) -> String {
    if subtopic.is_empty() {
        format!("channels/{channel}/messages")
    } else {
        format!("channels/{channel}/messages/{}", subtopic.replace('.', "/"))
    }
}

/// 查询串风格反转义：`+` 为空格，`%XX` 必须是合法十六进制。
fn query_unescape(raw: &str) -> Result<String, SessionError> {
    let bytes = raw.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let valid = bytes
                .get(index + 1..index + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(SessionError::MalformedSubtopic);
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| SessionError::MalformedSubtopic)
}
