//! External command templates
//!
//! A template is an argv list; each element may contain `{name}` placeholders
//! filled from a variable table. No shell is involved, so values containing
//! spaces stay a single argument.

use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::{Command, ExitStatus};

pub type Vars = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Substitute every placeholder. Unknown names and unbalanced braces are errors.
    pub fn render(&self, vars: &Vars) -> Result<Vec<String>> {
        if self.argv.is_empty() {
            return Err(TransferError::Template("empty command".into()));
        }
        self.argv.iter().map(|arg| render_arg(arg, vars)).collect()
    }

    /// Render and run to completion, inheriting stdio. Blocks without timeout.
    pub fn run(&self, vars: &Vars) -> Result<(Vec<String>, ExitStatus)> {
        let argv = self.render(vars)?;
        let status = execute(&argv)?;
        Ok((argv, status))
    }
}

/// Run an already rendered argv, inheriting stdio.
pub fn execute(argv: &[String]) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TransferError::Template("empty command".into()))?;
    Ok(Command::new(program).args(args).status()?)
}

fn render_arg(arg: &str, vars: &Vars) -> Result<String> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| TransferError::Template(format!("unclosed placeholder in `{arg}`")))?;
        let name = &after[..close];
        let value = vars
            .get(name)
            .ok_or_else(|| TransferError::Template(format!("unknown placeholder `{{{name}}}` in `{arg}`")))?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(TransferError::Template(format!("unbalanced `}}` in `{arg}`")));
    }
    out.push_str(rest);
    Ok(out)
}

/// Command line for display, with `secret` masked if given.
pub fn display_command(argv: &[String], secret: Option<&str>) -> String {
    let line = argv.join(" ");
    match secret {
        Some(s) if !s.is_empty() => line.replace(s, "***"),
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut v = Vars::new();
        v.insert("src", "/data/FR1/R1111M/session_0/".into());
        v.insert("user", "tech".into());
        v.insert("hostname", "archive.example.org".into());
        v.insert("remote_dir", "/incoming".into());
        v
    }

    #[test]
    fn renders_placeholders_inside_arguments() {
        let t = CommandTemplate::new(["rsync", "-az", "{src}", "{user}@{hostname}:{remote_dir}"]);
        let argv = t.render(&vars()).unwrap();
        assert_eq!(
            argv,
            vec![
                "rsync",
                "-az",
                "/data/FR1/R1111M/session_0/",
                "tech@archive.example.org:/incoming"
            ]
        );
    }

    #[test]
    fn unknown_or_broken_placeholders_are_rejected() {
        let t = CommandTemplate::new(["rsync", "{nope}"]);
        assert!(matches!(t.render(&vars()), Err(TransferError::Template(_))));
        let t = CommandTemplate::new(["rsync", "{src"]);
        assert!(matches!(t.render(&vars()), Err(TransferError::Template(_))));
        let t = CommandTemplate::new(["rsync", "src}"]);
        assert!(matches!(t.render(&vars()), Err(TransferError::Template(_))));
        let t = CommandTemplate::new(Vec::<String>::new());
        assert!(t.render(&vars()).is_err());
    }

    #[test]
    fn display_masks_secret() {
        let argv = vec!["mount_smbfs".to_string(), "//u:hunter2@h/share".to_string()];
        assert_eq!(display_command(&argv, Some("hunter2")), "mount_smbfs //u:***@h/share");
    }

    #[cfg(unix)]
    #[test]
    fn run_reports_exit_status() {
        let ok = CommandTemplate::new(["true"]);
        assert!(ok.run(&Vars::new()).unwrap().1.success());
        let bad = CommandTemplate::new(["false"]);
        assert!(!bad.run(&Vars::new()).unwrap().1.success());
    }
}
