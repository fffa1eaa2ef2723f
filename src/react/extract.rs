//! 从嘈杂的模型文本中提取首个完整 JSON 块
//!
//! 先试 Markdown 围栏块：仅当围栏的完整内容本身就是一个 {...} 或 [...] 才接受；
//! 否则退回引号与转义感知的括号栈扫描，返回首个顶层配平的子串。

use std::sync::OnceLock;

use regex::Regex;

use crate::core::AgentError;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex"))
}

fn standalone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\s*(\{.*\}|\[.*\])\s*$").expect("static regex"))
}

/// 提取首个候选 JSON 块；找不到返回 Extraction 错误
pub fn extract_json_block(text: &str) -> Result<&str, AgentError> {
    if text.trim().is_empty() {
        return Err(AgentError::Extraction("empty assistant text".to_string()));
    }
    for caps in fence_re().captures_iter(text) {
        if let Some(block) = caps.get(1).map(|m| m.as_str()) {
            if standalone_re().is_match(block) {
                return Ok(block);
            }
        }
    }
    scan_balanced(text).ok_or_else(|| {
        AgentError::Extraction("no complete JSON block found in assistant text".to_string())
    })
}

/// 括号栈扫描：跳过字符串字面量与转义，返回首个顶层配平的 {...}/[...] 子串
fn scan_balanced(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' | b'[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' | b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start?..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let text = "Sure, here is the step:\n```json\n{\"tool_call\": {\"action\": \"wait\", \"parameters\": {\"seconds\": 1}}}\n```\nDone.";
        let block = extract_json_block(text).unwrap();
        assert_eq!(
            block,
            "{\"tool_call\": {\"action\": \"wait\", \"parameters\": {\"seconds\": 1}}}"
        );
    }

    #[test]
    fn test_fence_without_language_tag() {
        let text = "```\n{\"final_response\": \"ok\"}\n```";
        assert_eq!(extract_json_block(text).unwrap(), "{\"final_response\": \"ok\"}");
    }

    #[test]
    fn test_bare_text_fallback_scan() {
        let text = "I think we should do {\"final_response\": \"done\"} now";
        assert_eq!(
            extract_json_block(text).unwrap(),
            "{\"final_response\": \"done\"}"
        );
    }

    #[test]
    fn test_fence_with_prose_falls_back_to_scan() {
        // 围栏里混了解释文字，不是纯 JSON；扫描应当仍能找到对象本身
        let text = "```json\nfirst we call: {\"final_response\": \"hi\"}\n```";
        assert_eq!(extract_json_block(text).unwrap(), "{\"final_response\": \"hi\"}");
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = "{\"final_response\": \"use } and { freely, even \\\" quoted\"}";
        assert_eq!(extract_json_block(text).unwrap(), text);
    }

    #[test]
    fn test_no_json_is_extraction_error() {
        let err = extract_json_block("I could not decide on a step.").unwrap_err();
        assert!(matches!(err, AgentError::Extraction(_)));
        assert!(matches!(
            extract_json_block("   ").unwrap_err(),
            AgentError::Extraction(_)
        ));
    }

    #[test]
    fn test_unbalanced_is_extraction_error() {
        let err = extract_json_block("{\"final_response\": \"oops\"").unwrap_err();
        assert!(matches!(err, AgentError::Extraction(_)));
    }
}
