//! Operator console commands read from stdin.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Stats,
    Players,
    Save,
    /// Regenerate the world, with a fixed seed or a random one.
    Reset(Option<u64>),
    Module { name: String, enabled: bool },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "Commands: help, stats, players, save, reset [seed], module <name> <on|off>, stop";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ParseError("empty command".into()));
        };
        let args: Vec<&str> = words.collect();

        match (head.to_lowercase().as_str(), args.as_slice()) {
            ("help" | "?", _) => Ok(Self::Help),
            ("stats", []) => Ok(Self::Stats),
            ("players" | "list", []) => Ok(Self::Players),
            ("save", []) => Ok(Self::Save),
            ("reset", []) => Ok(Self::Reset(None)),
            ("reset", [seed]) => seed
                .parse()
                .map(|s| Self::Reset(Some(s)))
                .map_err(|_| ParseError(format!("invalid seed: {seed}"))),
            ("module", [name, state]) => {
                let enabled = match state.to_lowercase().as_str() {
                    "on" | "true" | "enable" => true,
                    "off" | "false" | "disable" => false,
                    other => return Err(ParseError(format!("expected on or off, got {other}"))),
                };
                Ok(Self::Module {
                    name: name.to_string(),
                    enabled,
                })
            }
            ("stop" | "exit" | "quit", []) => Ok(Self::Stop),
            ("stats" | "players" | "list" | "save" | "stop" | "exit" | "quit" | "reset" | "module", _) => {
                Err(ParseError(format!("wrong arguments for {head}. {HELP}")))
            }
            _ => Err(ParseError(format!("unknown command: {head}. {HELP}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(ConsoleCommand::parse("stats"), Ok(ConsoleCommand::Stats));
        assert_eq!(ConsoleCommand::parse("  PLAYERS "), Ok(ConsoleCommand::Players));
        assert_eq!(ConsoleCommand::parse("reset"), Ok(ConsoleCommand::Reset(None)));
        assert_eq!(ConsoleCommand::parse("reset 99"), Ok(ConsoleCommand::Reset(Some(99))));
        assert_eq!(
            ConsoleCommand::parse("module weatherEnabled off"),
            Ok(ConsoleCommand::Module {
                name: "weatherEnabled".into(),
                enabled: false
            })
        );
        assert_eq!(ConsoleCommand::parse("stop"), Ok(ConsoleCommand::Stop));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ConsoleCommand::parse("").is_err());
        assert!(ConsoleCommand::parse("reset abc").is_err());
        assert!(ConsoleCommand::parse("module animalMovement maybe").is_err());
        assert!(ConsoleCommand::parse("stats now").is_err());
        let err = ConsoleCommand::parse("fly").unwrap_err();
        assert!(err.to_string().starts_with("unknown command: fly"));
    }
}
