use std::sync::Arc;

use certwatch_core::Registry;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;

const COMMANDS: &[&str] = &[
    "help", "exit", "quit", "list", "add", "remove", "refresh", "import", "export", "note",
    "watch", "set", "clear",
];

/// Commands whose first argument is a tracked domain
const DOMAIN_COMMANDS: &[&str] = &["remove", "rm", "note"];

const SET_OPTIONS: &[&str] = &["output", "interval"];

const OUTPUT_FORMATS: &[&str] = &["human", "json"];

fn pairs<'a>(candidates: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<Pair> {
    candidates
        .filter(|c| c.starts_with(prefix))
        .map(|c| Pair {
            display: c.to_string(),
            replacement: c.to_string(),
        })
        .collect()
}

pub struct CertwatchCompleter {
    registry: Arc<Registry>,
}

impl CertwatchCompleter {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Completer for CertwatchCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];
        let words: Vec<&str> = line_to_cursor.split_whitespace().collect();

        if words.is_empty() || (words.len() == 1 && !line_to_cursor.ends_with(' ')) {
            let prefix = words.first().copied().unwrap_or("");
            let start = line_to_cursor.len() - prefix.len();
            return Ok((start, pairs(COMMANDS.iter().copied(), prefix)));
        }

        let command = words[0].to_lowercase();
        let current_word = if line_to_cursor.ends_with(' ') {
            ""
        } else {
            words.last().copied().unwrap_or("")
        };
        let start = line_to_cursor.len() - current_word.len();
        let completing_first_arg =
            words.len() == 1 || (words.len() == 2 && !line_to_cursor.ends_with(' '));

        if DOMAIN_COMMANDS.contains(&command.as_str()) && completing_first_arg {
            let domains: Vec<String> = self
                .registry
                .list()
                .into_iter()
                .map(|r| r.domain)
                .collect();
            let prefix = current_word.to_lowercase();
            return Ok((start, pairs(domains.iter().map(String::as_str), &prefix)));
        }

        if command == "set" {
            if completing_first_arg {
                return Ok((start, pairs(SET_OPTIONS.iter().copied(), current_word)));
            } else if words.len() >= 2 && words[1] == "output" {
                return Ok((start, pairs(OUTPUT_FORMATS.iter().copied(), current_word)));
            }
        }

        Ok((pos, vec![]))
    }
}

impl Hinter for CertwatchCompleter {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() || !line.ends_with(' ') {
            return None;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() != 1 {
            return None;
        }

        let hint = match words[0].to_lowercase().as_str() {
            "add" => "<domain> [notes]",
            "remove" | "rm" => "<domain|--all>",
            "import" => "<file.csv>",
            "export" => "[file.csv]",
            "note" => "<domain> [text]",
            "watch" => "[interval, e.g. 5m]",
            "set" => "output <human|json> | interval <30s|5m|1h>",
            _ => return None,
        };
        Some(hint.to_string())
    }
}

impl Highlighter for CertwatchCompleter {}
impl Validator for CertwatchCompleter {}
impl Helper for CertwatchCompleter {}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::DefaultHistory;

    fn complete(completer: &CertwatchCompleter, line: &str) -> Vec<String> {
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);
        let (_, candidates) = completer.complete(line, line.len(), &ctx).unwrap();
        candidates.into_iter().map(|p| p.replacement).collect()
    }

    #[test]
    fn test_completes_commands_and_tracked_domains() {
        let registry = Arc::new(Registry::in_memory());
        registry.add("shop.example", None).unwrap();
        registry.add("api.example", None).unwrap();
        let completer = CertwatchCompleter::new(registry);

        assert_eq!(complete(&completer, "re"), vec!["remove", "refresh"]);
        assert_eq!(complete(&completer, "note sh"), vec!["shop.example"]);
        assert_eq!(complete(&completer, "rm ").len(), 2);
        assert_eq!(complete(&completer, "set output j"), vec!["json"]);
    }
}
