use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::{error::Error, path::Path, time::Duration};

use crate::{
    disk::FileDisk,
    fs::{config::VolumeConfig, error::Result as FsResult, Region, Volume},
};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Create(String, u64),                     // 容器, 大小
    Ls(String),                              // 容器
    CopyIn(String, String),                  // 容器, 宿主机文件
    CopyOut(String, String, Option<String>), // 容器, 卷内文件, 目标路径
    Rm(String, String),                      // 容器, 卷内文件
    Map(String),
    Info(String),
    Stat(String, String),
    Drop(String),
    Exit,
}

/// 命令执行的上下文
pub struct Session {
    pub config: VolumeConfig,
    pub interactive: bool, // 交互模式下才显示进度和确认提示
}

/// 执行一条命令；每条命令自己打开容器，结束时关闭
pub fn execute_command(cmd: &Command, session: &Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Create(disc, size) => {
            let path = Path::new(disc);
            if path.exists()
                && !confirm(session, &format!("Container {} exists. Overwrite it?", disc))?
            {
                println!("{}", "Skipped.".bright_black());
                return Ok(());
            }

            let volume = with_spinner(session, format!("Formatting {}...", disc), || {
                Volume::create_file(path, *size, &session.config)
            })?;
            let header = volume.header().clone();
            volume.close()?;

            println!(
                "✅ Created disc {}: {} blocks of {} bytes, {} file slots",
                disc.green(),
                header.blocks_number,
                header.block_payload_size,
                header.entry_slots
            );
        }
        Command::Ls(disc) => {
            let volume = Volume::open_file(Path::new(disc), &session.config)?;
            let names = volume.list()?;
            volume.close()?;

            if names.is_empty() {
                println!("{}", "(no files on disc)".bright_black());
            }
            for name in names {
                println!("📄  {}", name);
            }
        }
        Command::CopyIn(disc, host) => {
            let mut volume = Volume::open_file(Path::new(disc), &session.config)?;
            let info = with_spinner(session, format!("Copying {}...", host), || {
                volume.copy_in(Path::new(host))
            })?;
            volume.close()?;

            println!(
                "✅ File {} copied to disc {} ({} bytes, {} blocks)",
                info.name.green(),
                disc.cyan(),
                info.size,
                info.blocks.len()
            );
        }
        Command::CopyOut(disc, file, dest) => {
            let dest = dest.as_deref().unwrap_or(file);
            let volume = Volume::open_file(Path::new(disc), &session.config)?;
            let written = with_spinner(session, format!("Copying {}...", file), || {
                volume.copy_out(file, Path::new(dest))
            })?;
            volume.close()?;

            println!(
                "✅ File {} copied from disc {} to {} ({} bytes)",
                file.green(),
                disc.cyan(),
                dest.cyan(),
                written
            );
        }
        Command::Rm(disc, file) => {
            let mut volume = Volume::open_file(Path::new(disc), &session.config)?;
            let released = volume.delete(file)?;
            volume.close()?;

            println!(
                "❌ Deleted {} from disc {} ({} blocks released)",
                file.red(),
                disc.cyan(),
                released
            );
        }
        Command::Map(disc) => {
            let volume = Volume::open_file(Path::new(disc), &session.config)?;
            let records = volume.dump_map()?;
            volume.close()?;

            println!(
                "{}",
                format!(
                    "{:<12} {:<8} {:>6} {:>8}  {}",
                    "OFFSET", "REGION", "INDEX", "SIZE", "USED"
                )
                .bright_cyan()
                .bold()
            );
            for record in records {
                let index = match record.region {
                    Region::Entry(slot) => slot.to_string(),
                    Region::Block(index) => index.to_string(),
                    Region::Header | Region::FreeMap => "-".to_string(),
                };
                let used = if record.used {
                    "1".green()
                } else {
                    "0".bright_black()
                };
                println!(
                    "{:<12} {:<8} {:>6} {:>8}  {}",
                    format!("[{}]", record.offset),
                    record.region.label(),
                    index,
                    record.size,
                    used
                );
            }
        }
        Command::Info(disc) => {
            let volume = Volume::open_file(Path::new(disc), &session.config)?;
            let header = volume.header().clone();
            let usage = volume.usage()?;
            volume.close()?;

            println!("{}", "💾 Disc Info".bright_yellow().bold());
            println!("{}: {}", "Name".blue(), header.volume_name());
            println!("{}: {} bytes", "Size".blue(), header.size);
            println!(
                "{}: {} bytes payload + 8 bytes link",
                "Block".blue(),
                header.block_payload_size
            );
            println!(
                "{}: {} / {} free",
                "Blocks".blue(),
                header.free_blocks,
                header.blocks_number
            );
            println!(
                "{}: {} / {} free",
                "Slots".blue(),
                header.free_entry_slots,
                header.entry_slots
            );
            match usage.first_free_block {
                Some(index) => println!("{}: {}", "Next block".blue(), index),
                None => println!("{}: {}", "Next block".blue(), "none (disc full)".red()),
            }
            if usage.free_blocks != header.free_blocks as u64
                || usage.free_entry_slots != header.free_entry_slots
            {
                println!(
                    "{} free map shows {} free blocks and {} free slots",
                    "⚠️  Counters disagree:".yellow().bold(),
                    usage.free_blocks,
                    usage.free_entry_slots
                );
            }
        }
        Command::Stat(disc, file) => {
            let volume = Volume::open_file(Path::new(disc), &session.config)?;
            let info = volume.file_info(file)?;
            volume.close()?;

            let mut chain: Vec<String> = info.blocks.iter().map(u64::to_string).collect();
            chain.push("end".to_string());
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {} bytes\n{}: {}",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                info.name,
                "Slot".blue(),
                info.slot,
                "Size".blue(),
                info.size,
                "Blocks".blue(),
                chain.join(" → ")
            );
        }
        Command::Drop(disc) => {
            if !confirm(session, &format!("Remove container {} and all its files?", disc))? {
                println!("{}", "Skipped.".bright_black());
                return Ok(());
            }
            FileDisk::remove(disc)?;
            println!("🗑️ Removed disc {}", disc.red());
        }
        Command::Exit => println!("{}", "👋 Exiting minivol shell...".yellow().bold()),
    }

    Ok(())
}

// 非交互模式下默认同意
fn confirm(session: &Session, prompt: &str) -> Result<bool, Box<dyn Error>> {
    if !session.interactive {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn with_spinner<T>(
    session: &Session,
    message: String,
    work: impl FnOnce() -> FsResult<T>,
) -> Result<T, Box<dyn Error>> {
    if !session.interactive {
        return Ok(work()?);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    let result = work();
    pb.finish_and_clear();
    Ok(result?)
}

pub fn print_help() {
    println!("{}", "📘 minivol Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  create <disc> <size>          Create and format a disc (size in bytes, K or M suffix)
  ls <disc>                     List files on a disc
  cpin <disc> <host-file>       Copy a host file onto a disc
  cpout <disc> <file> [dest]    Copy a file from a disc to the host
  rm <disc> <file>              Delete a file from a disc
  map <disc>                    Show the disc layout map
  info <disc>                   Show disc geometry and free space
  stat <disc> <file>            Show a file's size and block chain
  drop <disc>                   Remove a disc container
  help                          Show this help message
  exit                          Quit the shell
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::fs::error::FileSystemError;

    fn session() -> Session {
        Session {
            config: VolumeConfig::new(64).unwrap(),
            interactive: false,
        }
    }

    fn listing(disc: &str, session: &Session) -> Vec<String> {
        let volume = Volume::open_file(Path::new(disc), &session.config).unwrap();
        let names = volume.list().unwrap();
        volume.close().unwrap();
        names
    }

    #[test]
    fn one_shot_commands_drive_a_disc_end_to_end() {
        let dir = TempDir::new().unwrap();
        let session = session();
        let disc = dir.path().join("disc.vol").display().to_string();
        let host = dir.path().join("notes.txt");
        let out = dir.path().join("copy.txt");
        let data: Vec<u8> = (0..200u8).collect();
        fs::write(&host, &data).unwrap();

        execute_command(&Command::Create(disc.clone(), 4096), &session).unwrap();
        execute_command(
            &Command::CopyIn(disc.clone(), host.display().to_string()),
            &session,
        )
        .unwrap();
        execute_command(&Command::Ls(disc.clone()), &session).unwrap();
        assert_eq!(listing(&disc, &session), vec!["notes.txt"]);

        execute_command(
            &Command::CopyOut(
                disc.clone(),
                "notes.txt".into(),
                Some(out.display().to_string()),
            ),
            &session,
        )
        .unwrap();
        assert_eq!(fs::read(&out).unwrap(), data);

        execute_command(&Command::Stat(disc.clone(), "notes.txt".into()), &session).unwrap();
        execute_command(&Command::Map(disc.clone()), &session).unwrap();
        execute_command(&Command::Info(disc.clone()), &session).unwrap();

        execute_command(&Command::Rm(disc.clone(), "notes.txt".into()), &session).unwrap();
        assert!(listing(&disc, &session).is_empty());

        // 非交互模式下覆盖和删除容器都不再询问
        execute_command(&Command::Create(disc.clone(), 4096), &session).unwrap();
        execute_command(&Command::Drop(disc.clone()), &session).unwrap();
        assert!(!Path::new(&disc).exists());
    }

    #[test]
    fn failed_command_returns_the_volume_error() {
        let dir = TempDir::new().unwrap();
        let session = session();
        let disc = dir.path().join("disc.vol").display().to_string();

        let err = execute_command(&Command::Ls(disc.clone()), &session).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FileSystemError>(),
            Some(FileSystemError::StorageUnavailable { .. })
        ));

        execute_command(&Command::Create(disc.clone(), 4096), &session).unwrap();
        let err = execute_command(&Command::Rm(disc, "ghost".into()), &session).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FileSystemError>(),
            Some(FileSystemError::NotFound(_))
        ));
    }
}
