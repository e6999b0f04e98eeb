use std::path::PathBuf;

use tracing::info;

use crate::app::{App, CommandItem, UiMode};
use crate::constants::DEFAULT_EXPORT_PATH;
use crate::transcript::write_transcript;

pub fn commands_list() -> Vec<CommandItem> {
    vec![
        CommandItem {
            name: "clear",
            shortcut: Some("c"),
            description: "Start a new conversation",
            action: "session:clear",
        },
        CommandItem {
            name: "refs",
            shortcut: Some("r"),
            description: "Show legal references from this conversation",
            action: "view:references",
        },
        CommandItem {
            name: "export",
            shortcut: Some("e"),
            description: "Save the conversation as HTML",
            action: "session:export",
        },
        CommandItem {
            name: "about",
            shortcut: None,
            description: "About Apna Waqeel",
            action: "help:about",
        },
        CommandItem {
            name: "quit",
            shortcut: Some("q"),
            description: "Exit",
            action: "app:quit",
        },
    ]
}

pub fn filter_commands(commands: &[CommandItem], query: &str) -> Vec<CommandItem> {
    if query.trim().is_empty() {
        return commands.to_vec();
    }
    let q = query.trim().to_lowercase();
    commands
        .iter()
        .filter(|c| {
            c.name.starts_with(&q)
                || c.description.to_lowercase().contains(&q)
                || c.shortcut.map(|s| s.starts_with(&q)).unwrap_or(false)
        })
        .cloned()
        .collect()
}

pub fn parse_command(input: &str) -> Option<(CommandItem, Option<String>)> {
    let trimmed = input.trim();
    let rest = trimmed.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let name = parts.next()?.to_lowercase();
    let arg = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    commands_list()
        .into_iter()
        .find(|c| c.name == name || c.shortcut == Some(name.as_str()))
        .map(|c| (c, arg))
}

pub fn execute_command(app: &mut App, cmd: &CommandItem, arg: Option<String>) {
    match cmd.action {
        "session:clear" => {
            app.mode = UiMode::Normal;
            app.new_conversation();
        }
        "view:references" => {
            if app.mode == UiMode::References {
                app.mode = UiMode::Normal;
            } else if app.session.conversation().references().next().is_none() {
                app.set_toast("No references yet");
            } else {
                app.references_scroll = 0;
                app.mode = UiMode::References;
            }
        }
        "session:export" => {
            let path = arg
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH));
            match write_transcript(app.session.conversation(), &path) {
                Ok(()) => {
                    info!(path = %path.display(), "transcript exported");
                    app.set_toast(format!("Saved {}", path.display()));
                }
                Err(err) => app.set_toast(format!("Export failed: {err:#}")),
            }
        }
        "help:about" => {
            app.mode = UiMode::HelpAbout;
        }
        "app:quit" => {
            app.should_quit = true;
        }
        _ => {}
    }
    app.mark_dirty();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatResponse;
    use crate::conversation::Reference;
    use crate::session::ChatSession;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::new(ChatSession::default(), "http://127.0.0.1:8000/chat".to_string())
    }

    fn answered_app() -> App {
        let mut app = app();
        app.insert_str("Q");
        app.submit_input().unwrap();
        app.apply_reply(Ok(ChatResponse {
            chat_response: "A".to_string(),
            references: vec![Reference {
                title: "IPC 420".to_string(),
                url: "https://example.org/420".to_string(),
            }],
        }));
        app
    }

    #[test]
    fn parses_names_shortcuts_and_arguments() {
        let (cmd, arg) = parse_command("/export  notes.html ").unwrap();
        assert_eq!(cmd.name, "export");
        assert_eq!(arg.as_deref(), Some("notes.html"));

        let (cmd, arg) = parse_command("/R").unwrap();
        assert_eq!(cmd.name, "refs");
        assert_eq!(arg, None);

        assert!(parse_command("/unknown").is_none());
        assert!(parse_command("clear").is_none());
    }

    #[test]
    fn filter_matches_prefix_and_description() {
        let names: Vec<&str> = filter_commands(&commands_list(), "html")
            .iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["export"]);
        assert_eq!(filter_commands(&commands_list(), "").len(), commands_list().len());
    }

    #[test]
    fn clear_starts_over() {
        let mut app = answered_app();
        assert_eq!(app.session.conversation().len(), 2);
        let (cmd, arg) = parse_command("/clear").unwrap();
        execute_command(&mut app, &cmd, arg);
        assert!(app.session.conversation().is_empty());
        assert!(app.needs_clear);
    }

    #[test]
    fn refs_opens_panel_only_when_there_are_references() {
        let mut empty = app();
        let (cmd, _) = parse_command("/refs").unwrap();
        execute_command(&mut empty, &cmd, None);
        assert_eq!(empty.mode, UiMode::Normal);
        assert!(empty.toast.is_some());

        let mut app = answered_app();
        execute_command(&mut app, &cmd, None);
        assert_eq!(app.mode, UiMode::References);
        execute_command(&mut app, &cmd, None);
        assert_eq!(app.mode, UiMode::Normal);
    }

    #[test]
    fn export_writes_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let mut app = answered_app();
        let (cmd, _) = parse_command("/export").unwrap();
        execute_command(&mut app, &cmd, Some(path.display().to_string()));
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("IPC 420"));
    }

    #[test]
    fn quit_sets_flag() {
        let mut app = app();
        let (cmd, _) = parse_command("/q").unwrap();
        execute_command(&mut app, &cmd, None);
        assert!(app.should_quit);
    }
}
