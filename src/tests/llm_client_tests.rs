#[cfg(test)]
mod tests {
    use crate::errors::OracleError;
    use crate::implementations::llm_client::{ parse_anthropic_response, parse_chat_response };

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "```python\nprint(1)\n```"}}]
        }"#;

        let (content, model) = parse_chat_response(body).unwrap();
        assert_eq!(content, "```python\nprint(1)\n```");
        assert_eq!(model.as_deref(), Some("gpt-4o-2024-08-06"));
    }

    #[test]
    fn test_chat_response_without_choices() {
        let result = parse_chat_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(OracleError::Api(_))));

        let result = parse_chat_response("<html>bad gateway</html>");
        assert!(matches!(result, Err(OracleError::Parse(_))));
    }

    #[test]
    fn test_parse_anthropic_response_joins_text_blocks() {
        let body = r#"{
            "model": "claude-3-5-sonnet-latest",
            "content": [
                {"type": "text", "text": "First "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "second"}
            ]
        }"#;

        let (content, model) = parse_anthropic_response(body).unwrap();
        assert_eq!(content, "First second");
        assert_eq!(model.as_deref(), Some("claude-3-5-sonnet-latest"));
    }

    #[test]
    fn test_anthropic_response_without_text() {
        let result = parse_anthropic_response(r#"{"content": []}"#);
        assert!(matches!(result, Err(OracleError::Parse(_))));
    }
}
