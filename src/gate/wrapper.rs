//! Delivery payload wrapper
//!
//! Wraps a raw script body in the anti-dump protection shim before
//! transmission: a client-environment self-check, the delivery token and
//! timestamp as inline constants, and an inner execution block whose
//! failures are caught and warned about without propagating.
//!
//! The check is advisory obfuscation, not a security boundary. The body's
//! line structure is preserved (indentation only) so line-numbered errors
//! from the original script stay meaningful.

/// Wrap a script body in the protection shim
///
/// Pure string transformation; no store or network access.
pub fn wrap_script(script_content: &str, script_id: &str, token: &str, timestamp: i64) -> String {
    let indented_body = script_content
        .split('\n')
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
-- Anti-dump protection layer
local function _verify()
  local success, result = pcall(function()
    -- Check if running in Roblox environment
    if not game or not game:GetService then
      return false
    end

    -- Check for common dump indicators
    local Players = game:GetService("Players")
    local LocalPlayer = Players.LocalPlayer
    if not LocalPlayer then
      return false
    end

    -- Heartbeat verification
    local RunService = game:GetService("RunService")
    if not RunService:IsClient() then
      return false
    end

    return true
  end)

  return success and result
end

if not _verify() then
  warn("[Security] Nice try buddy - unauthorized access detected")
  return
end

-- Dynamic token validation (expires after 60 seconds)
local _token = "{token}"
local _timestamp = {timestamp}
local _scriptId = "{script_id}"

-- Execute protected content
local function _execute()
{indented_body}
end

-- Run with error handling
local success, err = pcall(_execute)
if not success then
  warn("[Script Error] " .. tostring(err))
end
"#,
        token = token,
        timestamp = timestamp,
        script_id = script_id,
        indented_body = indented_body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute_block(wrapped: &str) -> &str {
        let start = wrapped
            .find("local function _execute()\n")
            .map(|i| i + "local function _execute()\n".len())
            .expect("execute block missing");
        let end = wrapped[start..]
            .find("\nend")
            .map(|i| start + i)
            .expect("execute block unterminated");
        &wrapped[start..end]
    }

    #[test]
    fn test_preserves_line_count() {
        let body = "local a = 1\nlocal b = 2\n\nprint(a + b)";
        let wrapped = wrap_script(body, "s1", "tok", 1_700_000_000);

        let inner = execute_block(&wrapped);
        assert_eq!(inner.lines().count(), body.lines().count());
    }

    #[test]
    fn test_indentation_only() {
        let body = "print('x')\n  nested()";
        let wrapped = wrap_script(body, "s1", "tok", 0);

        let inner = execute_block(&wrapped);
        let restored: Vec<&str> = inner
            .lines()
            .map(|l| l.strip_prefix("  ").unwrap_or(l))
            .collect();
        assert_eq!(restored.join("\n"), body);
    }

    #[test]
    fn test_embeds_token_and_timestamp() {
        let wrapped = wrap_script("print('hi')", "abc123", "tok36", 1_700_000_000);

        assert!(wrapped.contains("local _token = \"tok36\""));
        assert!(wrapped.contains("local _timestamp = 1700000000"));
        assert!(wrapped.contains("local _scriptId = \"abc123\""));
    }

    #[test]
    fn test_wraps_body_in_nonfatal_harness() {
        let wrapped = wrap_script("error('boom')", "s1", "tok", 0);

        // Self-check runs before the body, and the body runs under pcall so
        // a failure warns instead of aborting the harness
        let verify_pos = wrapped.find("if not _verify()").expect("no verify gate");
        let exec_pos = wrapped.find("local function _execute()").expect("no execute block");
        assert!(verify_pos < exec_pos);
        assert!(wrapped.contains("local success, err = pcall(_execute)"));
        assert!(wrapped.contains("warn(\"[Script Error] \""));
    }

    #[test]
    fn test_empty_body() {
        let wrapped = wrap_script("", "s1", "tok", 0);
        let inner = execute_block(&wrapped);
        assert_eq!(inner, "  ");
    }
}
