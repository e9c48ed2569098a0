use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process::ExitCode;

use taskroll::api;
use taskroll::clock::SystemClock;
use taskroll::commands::*;
use taskroll::config::Config;
use taskroll::logging;
use taskroll::storage::JsonStore;

#[derive(Parser)]
#[command(name = "taskroll")]
#[command(about = "Task manager with recurring tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task description (quoted if it has spaces)
        description: String,
        /// Project id
        #[arg(short, long)]
        project: Option<u64>,
        /// Label (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,
        /// Due date in YYYY-MM-DD
        #[arg(short, long)]
        due: Option<String>,
        /// Due date and time, "YYYY-MM-DD HH:MM"
        #[arg(short, long, conflicts_with = "due")]
        at: Option<String>,
        /// Recurrence: daily, mon,wed,fri, tue, 15, "25 dec"
        #[arg(short, long)]
        recur: Option<String>,
    },
    /// List tasks, soonest due first
    List {
        /// Show completed tasks
        #[arg(short, long)]
        all: bool,
        /// Only tasks in this project
        #[arg(short, long)]
        project: Option<u64>,
        /// Only tasks with this label
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Mark a task as complete (recurring tasks move to their next due date)
    Complete {
        id: u64,
    },
    /// Remove a task
    Remove {
        id: u64,
    },
    /// Edit a task
    Edit {
        id: u64,
        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// New project id, or "none"
        #[arg(short, long)]
        project: Option<String>,
        /// Replace labels (repeatable)
        #[arg(short, long = "label")]
        labels: Option<Vec<String>>,
        /// New due date, or "none"
        #[arg(short, long)]
        due: Option<String>,
        /// New due date and time, or "none"
        #[arg(short, long)]
        at: Option<String>,
        /// New recurrence ("" to stop repeating)
        #[arg(short, long)]
        recur: Option<String>,
    },
    /// Show the next occurrence of a recurrence expression
    Next {
        expression: String,
        /// Anchor date or date-time (default: now)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Run the HTTP API
    Serve {
        /// Listen address (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Add a new project
    Add {
        name: String,
    },
    /// List projects
    List,
    /// Rename a project
    Rename {
        id: u64,
        name: String,
    },
    /// Remove a project (its tasks are kept)
    Remove {
        id: u64,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Add a note
    Add {
        content: String,
        /// Attach to this task
        #[arg(short, long)]
        task: Option<u64>,
    },
    /// List notes
    List {
        /// Only notes for this task
        #[arg(short, long)]
        task: Option<u64>,
    },
    /// Replace a note's content
    Edit {
        id: u64,
        content: String,
    },
    /// Remove a note
    Remove {
        id: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    logging::init(&config);

    if let Commands::Completions { shell } = &cli.command {
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "powershell" => Shell::PowerShell,
            "elvish" => Shell::Elvish,
            _ => {
                eprintln!("Unsupported shell: {}", shell);
                return ExitCode::FAILURE;
            }
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "taskroll", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let clock = SystemClock;
    if let Commands::Next { expression, from } = cli.command {
        return report(cmd_next(&clock, &expression, from));
    }

    let store = match JsonStore::open(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.db_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Add { description, project, labels, due, at, recur } => {
            cmd_add(&store, &clock, description, project, labels, due, at, recur, false).map(|_| ())
        }
        Commands::List { all, project, label } => {
            cmd_list(&store, &clock, all, project, label);
            Ok(())
        }
        Commands::Complete { id } => cmd_complete(&store, &clock, id, false),
        Commands::Remove { id } => cmd_remove(&store, id, false),
        Commands::Edit { id, description, project, labels, due, at, recur } => {
            cmd_edit(&store, &clock, id, description, project, labels, due, at, recur, false)
        }
        Commands::Project { command } => match command {
            ProjectCommands::Add { name } => cmd_project_add(&store, name, false).map(|_| ()),
            ProjectCommands::List => {
                cmd_project_list(&store);
                Ok(())
            }
            ProjectCommands::Rename { id, name } => cmd_project_rename(&store, id, name, false),
            ProjectCommands::Remove { id } => cmd_project_remove(&store, id, false),
        },
        Commands::Note { command } => match command {
            NoteCommands::Add { content, task } => {
                cmd_note_add(&store, &clock, content, task, false).map(|_| ())
            }
            NoteCommands::List { task } => {
                cmd_note_list(&store, task);
                Ok(())
            }
            NoteCommands::Edit { id, content } => cmd_note_edit(&store, id, content, false),
            NoteCommands::Remove { id } => cmd_note_remove(&store, id, false),
        },
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            return match api::serve(&config, store).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Server error: {:#}", e);
                    ExitCode::FAILURE
                }
            };
        }
        Commands::Next { .. } | Commands::Completions { .. } => Ok(()),
    };
    report(result)
}

fn report(result: Result<(), taskroll::error::TaskError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
