//! Connected-player tracking derived from console output.
//!
//! The server is never queried; the set is rebuilt from join/leave lines and
//! can drift from ground truth (e.g. lines lost while the manager was down).

use regex::Regex;

/// Login/logout line patterns. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct PlayerPatterns {
    login: Regex,
    logout: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Joined(String),
    Left(String),
}

impl PlayerPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            login: Regex::new(r"(?:^|:\s+)([A-Za-z0-9_]{1,16})\[[^\]]*\]\s+logged in with")?,
            logout: Regex::new(r"(?:^|:\s+)([A-Za-z0-9_]{1,16})\s+left the game")?,
        })
    }

    pub fn parse(&self, line: &str) -> Option<PresenceChange> {
        if let Some(caps) = self.login.captures(line) {
            return Some(PresenceChange::Joined(caps[1].to_string()));
        }
        self.logout
            .captures(line)
            .map(|caps| PresenceChange::Left(caps[1].to_string()))
    }
}

/// Names in join order, without duplicates.
#[derive(Debug, Default, Clone)]
pub struct ConnectedPlayers {
    names: Vec<String>,
}

impl ConnectedPlayers {
    /// Applies a change; returns true when the set actually changed.
    pub fn apply(&mut self, change: &PresenceChange) -> bool {
        match change {
            PresenceChange::Joined(name) => {
                if self.names.iter().any(|n| n == name) {
                    false
                } else {
                    self.names.push(name.clone());
                    true
                }
            }
            PresenceChange::Left(name) => {
                let before = self.names.len();
                self.names.retain(|n| n != name);
                before != self.names.len()
            }
        }
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> PlayerPatterns {
        PlayerPatterns::new().unwrap()
    }

    #[test]
    fn bare_login_line() {
        assert_eq!(
            patterns().parse("Steve[/1.2.3.4:1234] logged in with entity id 123"),
            Some(PresenceChange::Joined("Steve".into()))
        );
    }

    #[test]
    fn vanilla_prefixed_lines() {
        let p = patterns();
        assert_eq!(
            p.parse("[12:01:02] [Server thread/INFO]: Alex_99[/10.0.0.5:51234] logged in with entity id 7 at (0.5, 64.0, 0.5)"),
            Some(PresenceChange::Joined("Alex_99".into()))
        );
        assert_eq!(
            p.parse("[12:05:00] [Server thread/INFO]: Alex_99 left the game"),
            Some(PresenceChange::Left("Alex_99".into()))
        );
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let p = patterns();
        assert_eq!(p.parse("[12:00:00] [Server thread/INFO]: Done (3.1s)!"), None);
        assert_eq!(p.parse("Steve joined the game"), None);
    }

    #[test]
    fn join_and_leave_update_count() {
        let p = patterns();
        let mut players = ConnectedPlayers::default();

        let join = p.parse("Steve[/1.2.3.4:1234] logged in with entity id 123").unwrap();
        assert!(players.apply(&join));
        assert!(!players.apply(&join), "duplicate join must not double count");
        assert_eq!(players.count(), 1);
        assert!(players.contains("Steve"));

        let leave = p.parse("Steve left the game").unwrap();
        assert!(players.apply(&leave));
        assert_eq!(players.count(), 0);
        assert!(!players.apply(&leave));
    }
}
