pub mod command;
pub mod parse;

use crate::{
    fs::config::VolumeConfig,
    shell::{
        command::{execute_command, print_help, Command, Session},
        parse::{parse_command, parse_tokens},
    },
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use log::warn;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    io::{self, stdout},
    path::PathBuf,
    process::ExitCode,
};

const COMMANDS: [&str; 11] = [
    "help", "create", "ls", "cpin", "cpout", "rm", "map", "info", "stat", "drop", "exit",
];

pub fn start_shell(config: VolumeConfig) {
    if let Err(e) = print_banner() {
        warn!("cannot draw banner: {}", e);
    }

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    let session = Session {
        config,
        interactive: true,
    };

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minivol_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => warn!("command history disabled: {}", e),
    }

    // 命令补全
    let completer = DefaultCompleter::new_with_wordlen(
        COMMANDS.iter().map(|c| c.to_string()).collect(),
        2,
    );
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!("{}@{}", username, hostname)),
        DefaultPromptSegment::Basic("minivol".to_string()),
    );

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if cmd == Command::Exit {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or missing arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting minivol...".yellow());
                break;
            }
            Ok(_) => {
                // Ctrl-C 只清空当前行
                println!();
                continue;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
}

/// 非交互模式：执行进程参数给出的一条命令
pub fn run_once(args: &[String], config: VolumeConfig) -> ExitCode {
    let session = Session {
        config,
        interactive: false,
    };

    let Some(cmd) = parse_tokens(args) else {
        eprintln!("{}", "⚠️  Unknown command or missing arguments.".yellow());
        print_help();
        return ExitCode::from(2);
    };

    match execute_command(&cmd, &session) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "❌ Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_banner() -> io::Result<()> {
    let mut stdout = stdout();
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to minivol v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )
}
