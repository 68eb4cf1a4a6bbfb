use std::io::{self, BufRead, Write};

/// A yes/no question put to the user. Blocks until answered.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Asks on stdin. Anything but `y`/`yes` declines.
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let mut stdout = io::stdout();
        if write!(stdout, "{prompt} [y/N] ").and_then(|_| stdout.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!("couldn't read confirmation: {e}");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_confirm() {
        let mut asked = Vec::new();
        let mut confirm = |prompt: &str| {
            asked.push(prompt.to_string());
            false
        };
        assert!(!Confirm::confirm(&mut confirm, "Sure?"));
        assert_eq!(asked, vec!["Sure?".to_string()]);
    }

    #[test]
    fn assume_yes_skips_prompt() {
        let mut confirm = StdinConfirm { assume_yes: true };
        assert!(confirm.confirm("Mark this task as completed?"));
    }

    #[test]
    fn answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }
}
