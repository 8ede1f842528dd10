/// Drill prompt commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillAction {
  Know,
  Reveal,
  Next,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: DrillAction,
}

/// All commands accepted at the drill prompt
pub const COMMANDS: &[Command] = &[
  Command {
    name: "know",
    aliases: &["k", "y", "yes"],
    description: "I know this word (counts a recall)",
    action: DrillAction::Know,
  },
  Command {
    name: "reveal",
    aliases: &["d", "dont", "flip"],
    description: "I don't know it, show the other side",
    action: DrillAction::Reveal,
  },
  Command {
    name: "next",
    aliases: &["n", "skip"],
    description: "Move to the next card",
    action: DrillAction::Next,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "End the drill",
    action: DrillAction::Quit,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Best matching action, `None` for empty or unknown input.
pub fn resolve(input: &str) -> Option<DrillAction> {
  if input.trim().is_empty() {
    return None;
  }
  get_suggestions(input).first().map(|cmd| cmd.action)
}
