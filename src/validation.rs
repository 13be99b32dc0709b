//! Input validation for stream endpoints

/// Maximum accepted task id length
const MAX_TASK_ID_LEN: usize = 128;

/// Validates a task identifier before it is embedded in an endpoint path
pub fn validate_task_id(task_id: &str) -> Result<(), String> {
    if task_id.is_empty() {
        return Err("Task id cannot be empty".to_string());
    }

    if task_id.len() > MAX_TASK_ID_LEN {
        return Err(format!("Task id too long (max {} characters)", MAX_TASK_ID_LEN));
    }

    // Ids end up as a single URL path segment
    if let Some(c) = task_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.'))
    {
        return Err(format!("Invalid character '{}' in task id", c.escape_default()));
    }

    if task_id == "." || task_id == ".." {
        return Err("Task id cannot be a relative path segment".to_string());
    }

    Ok(())
}

/// Validates a WebSocket base URL (`ws://host[:port][/path]` or `wss://...`)
pub fn validate_ws_base_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("Stream URL cannot be empty".to_string());
    }

    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| "Stream URL must start with ws:// or wss://".to_string())?;

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err("Stream URL has no host".to_string());
    }

    if url.contains(|c: char| c.is_whitespace() || c.is_control()) {
        return Err("Stream URL contains invalid characters".to_string());
    }

    if let Some((host, port)) = authority.rsplit_once(':') {
        // Bracketed IPv6 literals carry colons of their own
        if !host.is_empty() && !port.contains(']') {
            let port_num = port
                .parse::<u16>()
                .map_err(|_| format!("Invalid port number: {}", port))?;
            if port_num == 0 {
                return Err("Port number must be greater than 0".to_string());
            }
        }
    }

    Ok(())
}
