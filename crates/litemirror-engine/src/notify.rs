#[cfg(target_os = "macos")]
use std::process::Command;

/// Delivers a notification to the user, best-effort. Implementations swallow
/// every failure; a missed notification is never worth failing a poll cycle.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Desktop notifications via `osascript`, spawned fire-and-forget.
pub struct SystemNotifier;

impl Notifier for SystemNotifier {
    fn notify(&self, title: &str, body: &str) {
        let script = format!(
            "display notification {} with title {}",
            applescript_string(body),
            applescript_string(title)
        );
        #[cfg(target_os = "macos")]
        {
            let _ = Command::new("osascript").arg("-e").arg(&script).spawn();
        }
        #[cfg(not(target_os = "macos"))]
        tracing::debug!(%script, "osascript unavailable on this platform, notification dropped");
    }
}

/// JSON string encoding gives exactly the quote-and-backslash escaping an
/// AppleScript string literal needs, which keeps crafted titles or messages
/// from breaking out of the script.
fn applescript_string(s: &str) -> String {
    serde_json::to_string(&s.replace('\n', " ")).unwrap_or_else(|_| "\"\"".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(applescript_string(r"back\slash"), r#""back\\slash""#);
    }

    #[test]
    fn flattens_newlines() {
        assert_eq!(applescript_string("line one\nline two"), "\"line one line two\"");
    }

    #[test]
    fn plain_text_is_just_quoted() {
        assert_eq!(applescript_string("Dana: shipped it"), "\"Dana: shipped it\"");
    }
}
