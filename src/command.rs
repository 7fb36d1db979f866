//! Client input parsing
//!
//! Turns one typed line into either a local command or chat text, and
//! builds the bytes that go on the wire.

use crate::error::InputError;
use crate::nickname::SEPARATOR;

/// Longest nickname accepted locally, in bytes
pub const MAX_NICKNAME_LEN: usize = 32;

/// Raw query forwarded for `/users`
pub const USERS_QUERY: &str = "/users";

/// Help text for local commands
pub const HELP: &str = "Commands: /nick <name>, /users, /clear, /help, /quit or /exit";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// End the session
    Quit,
    /// Change the local nickname and tell the peers
    Nick(String),
    /// Forward a raw user-list query
    Users,
    /// Clear the local screen
    Clear,
    /// Show local help
    Help,
    /// Chat text to prefix with the nickname and send
    Text(String),
}

/// Parse one line of input
pub fn parse_input(line: &str) -> Result<Input, InputError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(InputError::EmptyMessage);
    }

    if let Some(command) = line.trim().strip_prefix('/') {
        let (word, rest) = match command.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (command, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "quit" | "exit" => return Ok(Input::Quit),
            "nick" => {
                validate_nickname(rest)?;
                return Ok(Input::Nick(rest.to_string()));
            }
            "users" => return Ok(Input::Users),
            "clear" => return Ok(Input::Clear),
            "help" => return Ok(Input::Help),
            // Anything else is ordinary text
            _ => {}
        }
    }

    Ok(Input::Text(line.to_string()))
}

/// Check a nickname against the local rules
pub fn validate_nickname(name: &str) -> Result<(), InputError> {
    if name.trim().is_empty() {
        return Err(InputError::EmptyNickname);
    }
    if name.len() > MAX_NICKNAME_LEN {
        return Err(InputError::NicknameTooLong {
            len: name.len(),
            max: MAX_NICKNAME_LEN,
        });
    }
    if name.contains(SEPARATOR) {
        return Err(InputError::NicknameSeparator);
    }
    Ok(())
}

/// Build `"<nickname>: <body>"`, rejecting it if it exceeds `max` bytes
pub fn compose_message(nickname: &str, body: &str, max: usize) -> Result<String, InputError> {
    let message = format!("{}{}{}", nickname, SEPARATOR, body);
    if message.len() > max {
        return Err(InputError::MessageTooLong {
            len: message.len(),
            max,
        });
    }
    Ok(message)
}

/// System line announcing a nickname change
pub fn rename_notice(old: &str, new: &str) -> String {
    format!("* {} is now known as {}", old, new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_and_exit_any_case() {
        assert_eq!(parse_input("/quit"), Ok(Input::Quit));
        assert_eq!(parse_input("/EXIT"), Ok(Input::Quit));
        assert_eq!(parse_input("/Quit\r"), Ok(Input::Quit));
    }

    #[test]
    fn test_nick_command() {
        assert_eq!(parse_input("/nick Bob"), Ok(Input::Nick("Bob".into())));
        assert_eq!(parse_input("/nick"), Err(InputError::EmptyNickname));
        assert_eq!(parse_input("/nick   "), Err(InputError::EmptyNickname));
        assert_eq!(parse_input("/nick a: b"), Err(InputError::NicknameSeparator));

        let long = format!("/nick {}", "x".repeat(MAX_NICKNAME_LEN + 1));
        assert!(matches!(
            parse_input(&long),
            Err(InputError::NicknameTooLong { .. })
        ));
    }

    #[test]
    fn test_local_commands() {
        assert_eq!(parse_input("/users"), Ok(Input::Users));
        assert_eq!(parse_input("/clear"), Ok(Input::Clear));
        assert_eq!(parse_input("/help"), Ok(Input::Help));
    }

    #[test]
    fn test_text_and_unknown_slash() {
        assert_eq!(parse_input("hello there"), Ok(Input::Text("hello there".into())));
        assert_eq!(parse_input("/shrug"), Ok(Input::Text("/shrug".into())));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(parse_input(""), Err(InputError::EmptyMessage));
        assert_eq!(parse_input("   \r"), Err(InputError::EmptyMessage));
    }

    #[test]
    fn test_compose_message() {
        assert_eq!(compose_message("A", "hello", 1024), Ok("A: hello".into()));
    }

    #[test]
    fn test_compose_rejects_oversized() {
        let body = "x".repeat(1022);
        // "A: " plus 1022 bytes is 1025
        assert_eq!(
            compose_message("A", &body, 1024),
            Err(InputError::MessageTooLong { len: 1025, max: 1024 })
        );
        assert!(compose_message("A", &body[1..], 1024).is_ok());
    }

    #[test]
    fn test_rename_notice_has_no_separator() {
        let notice = rename_notice("A", "B");
        assert_eq!(notice, "* A is now known as B");
        assert!(!notice.contains(SEPARATOR));
    }
}
