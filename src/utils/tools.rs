use crate::store::ServerEntry;
use crate::utils::error::{Result, RiptError};
use log::warn;
use std::io::{stdin, stdout, Write};

/// Source of interactive answers.
pub trait Prompt {
    fn ask(&mut self, question: &str) -> Result<String>;
}

pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        print!("Enter {}: ", question);
        let _ = stdout().flush();
        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            return Err(RiptError::Input("end of input".to_owned()));
        }
        Ok(input.trim().to_owned())
    }
}

pub fn yes_no(prompt: &mut dyn Prompt, question: &str) -> Result<bool> {
    loop {
        let input = prompt.ask(&format!("{} (y/n)", question))?;
        match input.to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => warn!("Invalid input"),
        }
    }
}

/// Ask until `validate` accepts the answer.
pub fn ask_validated<T, F>(prompt: &mut dyn Prompt, question: &str, validate: F) -> Result<T>
where
    F: Fn(&str) -> Result<T>,
{
    loop {
        let input = prompt.ask(question)?;
        match validate(&input) {
            Ok(value) => return Ok(value),
            Err(RiptError::Validation { reason, .. }) => warn!("{}", reason),
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    One(usize),
    All,
}

impl Selection {
    pub fn pick<T: Clone>(&self, items: &[T]) -> Vec<T> {
        match self {
            Selection::One(i) => items.get(*i).cloned().into_iter().collect(),
            Selection::All => items.to_vec(),
        }
    }
}

/// `None` when the answer does not look like a selection at all.
pub fn parse_selection(input: &str, len: usize, allow_all: bool) -> Option<Result<Selection>> {
    let input = input.trim();
    if allow_all && input == "*" {
        return Some(Ok(Selection::All));
    }
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(match input.parse::<usize>() {
        Ok(i) if i < len => Ok(Selection::One(i)),
        _ => Err(RiptError::Input("Invalid selection".to_owned())),
    })
}

pub fn ask_selection(prompt: &mut dyn Prompt, len: usize, allow_all: bool) -> Result<Selection> {
    loop {
        let input = prompt.ask("result number")?;
        match parse_selection(&input, len, allow_all) {
            Some(selection) => return selection,
            None => warn!("Invalid input"),
        }
    }
}

pub fn display_results(results: &[ServerEntry]) {
    if results.is_empty() {
        println!("No results found");
        return;
    }
    for (i, entry) in results.iter().enumerate() {
        println!("[{}]  {}", i, entry);
    }
}

/// Label each non-blank output line with the host it came from.
pub fn format_output(label: &str, output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("[{}]: {}", label, l))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPrompt;
    use super::*;

    #[test]
    fn selection_parsing() {
        assert!(matches!(parse_selection("2", 3, false), Some(Ok(Selection::One(2)))));
        assert!(matches!(parse_selection("*", 3, true), Some(Ok(Selection::All))));
        assert!(parse_selection("*", 3, false).is_none());
        assert!(parse_selection("abc", 3, true).is_none());
        assert!(matches!(parse_selection("3", 3, true), Some(Err(RiptError::Input(_)))));
    }

    #[test]
    fn selection_reprompts_on_garbage_then_rejects_out_of_range() {
        let mut prompt = ScriptedPrompt::new(&["x", "7"]);
        assert!(matches!(ask_selection(&mut prompt, 2, true), Err(RiptError::Input(_))));
        assert_eq!(prompt.asked.len(), 2);
    }

    #[test]
    fn yes_no_accepts_long_and_short_forms() {
        let mut prompt = ScriptedPrompt::new(&["maybe", "YES"]);
        assert!(yes_no(&mut prompt, "confirm").unwrap());
        let mut prompt = ScriptedPrompt::new(&["n"]);
        assert!(!yes_no(&mut prompt, "confirm").unwrap());
    }

    #[test]
    fn validated_answers_reprompt() {
        let mut prompt = ScriptedPrompt::new(&["bad host", "web01"]);
        let host = ask_validated(&mut prompt, "hostname", |s| {
            crate::store::validate_hostname(s).map(str::to_owned)
        })
        .unwrap();
        assert_eq!(host, "web01");
    }

    #[test]
    fn output_lines_are_labelled() {
        let lines = format_output("web01", "-P INPUT DROP\n\n  -A INPUT -j ACCEPT  \n");
        assert_eq!(lines, vec!["[web01]: -P INPUT DROP", "[web01]: -A INPUT -j ACCEPT"]);
    }

    #[test]
    fn pick_all_or_one() {
        let items = vec!["a", "b", "c"];
        assert_eq!(Selection::One(1).pick(&items), vec!["b"]);
        assert_eq!(Selection::All.pick(&items), items);
    }
}
