//! Console command text and the per-server command history.

use std::collections::VecDeque;

pub const MAX_COMMAND_HISTORY: usize = 100;

pub const STOP: &str = "stop";
pub const SAVE_OFF: &str = "save-off";
pub const SAVE_ALL: &str = "save-all";
pub const SAVE_ON: &str = "save-on";

pub fn kick_all(reason: &str) -> String {
    format!("kick @a {}", reason)
}

pub fn say(message: &str) -> String {
    format!("say {}", message)
}

/// Big red title on every connected client.
pub fn title_all(text: &str) -> String {
    let payload = serde_json::json!({ "text": text, "color": "red" });
    format!("title @a title {}", payload)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Op,
    Deop,
    WhitelistAdd,
    WhitelistRemove,
    Ban,
    Pardon,
    Kick,
}

impl std::str::FromStr for PlayerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "op" => Ok(PlayerAction::Op),
            "deop" => Ok(PlayerAction::Deop),
            "whitelist-add" | "whitelist_add" => Ok(PlayerAction::WhitelistAdd),
            "whitelist-remove" | "whitelist_remove" => Ok(PlayerAction::WhitelistRemove),
            "ban" => Ok(PlayerAction::Ban),
            "pardon" | "unban" => Ok(PlayerAction::Pardon),
            "kick" => Ok(PlayerAction::Kick),
            _ => Err(format!("Unknown player action: {}", s)),
        }
    }
}

/// Minecraft player names: 1-16 chars of `[A-Za-z0-9_]`.
pub fn is_valid_player_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 16
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn player_command(action: PlayerAction, name: &str) -> Option<String> {
    if !is_valid_player_name(name) {
        return None;
    }
    let cmd = match action {
        PlayerAction::Op => format!("op {}", name),
        PlayerAction::Deop => format!("deop {}", name),
        PlayerAction::WhitelistAdd => format!("whitelist add {}", name),
        PlayerAction::WhitelistRemove => format!("whitelist remove {}", name),
        PlayerAction::Ban => format!("ban {}", name),
        PlayerAction::Pardon => format!("pardon {}", name),
        PlayerAction::Kick => format!("kick {}", name),
    };
    Some(cmd)
}

/// Bounded history with shell-style recall.
///
/// The cursor sits one past the newest entry after every push; `recall_previous`
/// walks towards the oldest entry, `recall_next` back towards an empty prompt.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    cursor: usize,
    cap: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_COMMAND_HISTORY)
    }
}

impl CommandHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cursor: 0,
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, command: &str) {
        if self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(command.to_string());
        self.cursor = self.entries.len();
    }

    pub fn recall_previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// `None` once the cursor moves past the newest entry (empty prompt).
    pub fn recall_next(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.entries.get(self.cursor).map(String::as_str)
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped_fifo() {
        let mut h = CommandHistory::default();
        for i in 0..(MAX_COMMAND_HISTORY + 5) {
            h.push(&format!("cmd {}", i));
        }
        assert_eq!(h.len(), MAX_COMMAND_HISTORY);
        assert_eq!(h.entries()[0], "cmd 5");
    }

    #[test]
    fn recall_walks_back_and_forth() {
        let mut h = CommandHistory::default();
        h.push("list");
        h.push("time set day");

        assert_eq!(h.recall_previous(), Some("time set day"));
        assert_eq!(h.recall_previous(), Some("list"));
        assert_eq!(h.recall_previous(), Some("list"), "stops at oldest");
        assert_eq!(h.recall_next(), Some("time set day"));
        assert_eq!(h.recall_next(), None, "past newest is an empty prompt");
        assert_eq!(h.recall_next(), None);
    }

    #[test]
    fn empty_history_recalls_nothing() {
        let mut h = CommandHistory::default();
        assert_eq!(h.recall_previous(), None);
        assert_eq!(h.recall_next(), None);
    }

    #[test]
    fn player_commands_reject_bad_names() {
        assert_eq!(
            player_command(PlayerAction::WhitelistAdd, "Steve"),
            Some("whitelist add Steve".into())
        );
        assert_eq!(player_command(PlayerAction::Op, "bad name"), None);
        assert_eq!(player_command(PlayerAction::Ban, ""), None);
        assert_eq!(player_command(PlayerAction::Kick, "a_very_long_name_xx"), None);
    }

    #[test]
    fn title_is_valid_json_text_component() {
        let cmd = title_all("Restart");
        let json = cmd.strip_prefix("title @a title ").unwrap();
        let v: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(v["text"], "Restart");
        assert_eq!(v["color"], "red");
    }
}
