//! Line-oriented interactive session.
//!
//! Classification runs in the background, so files can still be listed,
//! added or removed while requests are in flight.

use crate::commands::{chart, classifier, files};
use crate::output;
use crate::state::AppState;
use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  add <path>... [-r]      add image files or directories (-r walks subfolders)
  remove <index>          remove the file at index
  list                    show files and their top label
  classify [--all]        classify pending and failed files (--all: every file)
  chart                   show the label chart once every file has a result
  model [id]              show or set the model
  labels [a;b;c]          show or set candidate labels
  notice                  show whether the oversize notice is up
  preview <index> <dir>   write a JPEG preview
  clear                   remove every file
  help                    show this help
  quit                    leave";

#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Add { paths: Vec<PathBuf>, recursive: bool },
    Remove(usize),
    List,
    Classify { all: bool },
    Chart,
    Model(Option<String>),
    Labels(Option<String>),
    Notice,
    Preview { index: usize, dir: PathBuf },
    Clear,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    // Labels take the raw line, apostrophes included
    let args = if verb == "labels" { Vec::new() } else { split_args(rest)? };

    let parse_index = |s: Option<&String>| -> Result<usize, String> {
        s.ok_or_else(|| "missing index".to_string())?
            .parse::<usize>()
            .map_err(|_| "index must be a non-negative number".to_string())
    };

    let command = match verb {
        "add" => {
            let is_flag = |a: &String| a == "-r" || a == "--recursive";
            let recursive = args.iter().any(is_flag);
            let paths: Vec<PathBuf> = args
                .iter()
                .filter(|a| !is_flag(a))
                .map(PathBuf::from)
                .collect();
            if paths.is_empty() {
                return Err("usage: add <path>... [-r]".into());
            }
            ShellCommand::Add { paths, recursive }
        }
        "remove" | "rm" => ShellCommand::Remove(parse_index(args.first())?),
        "list" | "ls" => ShellCommand::List,
        "classify" => ShellCommand::Classify {
            all: args.iter().any(|a| a == "--all"),
        },
        "chart" => ShellCommand::Chart,
        "model" => ShellCommand::Model(args.first().cloned()),
        "labels" => ShellCommand::Labels((!rest.is_empty()).then(|| rest.to_string())),
        "notice" => ShellCommand::Notice,
        "preview" => {
            let index = parse_index(args.first())?;
            let dir = args.get(1).ok_or("usage: preview <index> <dir>")?;
            ShellCommand::Preview {
                index,
                dir: PathBuf::from(dir),
            }
        }
        "clear" => ShellCommand::Clear,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

/// Split on whitespace; single or double quotes group a path with spaces.
fn split_args(rest: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in rest.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err("unterminated quote".into());
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}

pub async fn run_shell(state: &AppState) -> Result<()> {
    // Print the notice whenever a batch raises it
    let mut notice_rx = state.store.notice().subscribe();
    let notice_task = tokio::spawn(async move {
        while notice_rx.changed().await.is_ok() {
            if *notice_rx.borrow_and_update() {
                println!("{}", output::OVERSIZE_NOTICE);
            }
        }
    });

    println!("deep-img shell, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(ShellCommand::Quit)) => break,
            Ok(Some(command)) => execute(state, command).await,
            Err(msg) => eprintln!("{}", msg),
        }
    }

    notice_task.abort();
    Ok(())
}

async fn execute(state: &AppState, command: ShellCommand) {
    match command {
        ShellCommand::Add { paths, recursive } => match files::add_paths(state, &paths, recursive).await {
            Ok(report) => {
                // The notice line itself comes from the watcher task
                let mut report = report;
                let oversized = std::mem::take(&mut report.oversized);
                println!("{}", output::format_intake(&report));
                for name in oversized {
                    println!("  skipped {} (over 5MB)", name);
                }
            }
            Err(e) => eprintln!("{}", e),
        },
        ShellCommand::Remove(index) => match files::remove_file(state, index) {
            Ok(entry) => println!("removed {}", entry.name),
            Err(e) => eprintln!("{}", e),
        },
        ShellCommand::List => println!("{}", output::format_files(&files::list_files(state))),
        ShellCommand::Classify { all } => {
            let state = state.clone();
            tokio::spawn(async move {
                match classifier::classify_files(&state, all).await {
                    Ok(report) => println!("{}", output::format_report(&report)),
                    Err(e) => eprintln!("{}", e),
                }
            });
            println!("classifying in the background...");
        }
        ShellCommand::Chart => match chart::get_chart(state) {
            Some(chart) => println!("{}", output::format_chart(&chart)),
            None if state.store.is_running() => println!("classification in progress"),
            None => println!("no chart yet: every file needs a result first"),
        },
        ShellCommand::Model(None) => println!("{}", classifier::get_settings(state).await.model),
        ShellCommand::Model(Some(id)) => match classifier::set_model_type(state, &id).await {
            Ok(model) => println!("model set to {}", model),
            Err(e) => eprintln!("{}", e),
        },
        ShellCommand::Labels(None) => {
            println!("{}", classifier::get_settings(state).await.labels.as_slice().join(";"))
        }
        ShellCommand::Labels(Some(joined)) => match classifier::set_labels(state, &joined).await {
            Ok(labels) => println!("labels set to {}", labels.as_slice().join(";")),
            Err(e) => eprintln!("{}", e),
        },
        ShellCommand::Notice => {
            let visible = state.store.notice().is_visible();
            println!("{}", if visible { output::OVERSIZE_NOTICE } else { "no notice" });
        }
        ShellCommand::Preview { index, dir } => match files::write_preview(state, index, &dir) {
            Ok(path) => println!("wrote {}", path.display()),
            Err(e) => eprintln!("{}", e),
        },
        ShellCommand::Clear => println!("removed {} file(s)", files::clear_files(state)),
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
    }
}
