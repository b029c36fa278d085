use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    parse_tokens(&tokens)
}

/// 解析已经切分好的参数（交互输入或进程命令行）
pub fn parse_tokens<T: AsRef<str>>(tokens: &[T]) -> Option<Command> {
    let (cmd, args) = tokens.split_first()?;
    let arg = |i: usize| args.get(i).map(|s| s.as_ref().to_string());

    match cmd.as_ref() {
        "help" => Some(Command::Help),
        "create" => Some(Command::Create(arg(0)?, parse_size(&arg(1)?)?)),
        "ls" => arg(0).map(Command::Ls),
        "cpin" => Some(Command::CopyIn(arg(0)?, arg(1)?)),
        "cpout" => Some(Command::CopyOut(arg(0)?, arg(1)?, arg(2))),
        "rm" => Some(Command::Rm(arg(0)?, arg(1)?)),
        "map" => arg(0).map(Command::Map),
        "info" => arg(0).map(Command::Info),
        "stat" => Some(Command::Stat(arg(0)?, arg(1)?)),
        "drop" => arg(0).map(Command::Drop),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

/// 容器大小，可带 K / M 后缀（按 1024 进制）
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    let (digits, unit) = match text.char_indices().last()? {
        (i, 'k') | (i, 'K') => (&text[..i], 1024),
        (i, 'm') | (i, 'M') => (&text[..i], 1024 * 1024),
        _ => (text, 1),
    };
    digits.parse::<u64>().ok()?.checked_mul(unit)
}
