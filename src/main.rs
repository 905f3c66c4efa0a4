//! `matador` command line front end.
//!
//! Identity and recipient files live in `--home` (or `MATADOR_HOME`, or the
//! current directory). Armored messages and decrypted plaintext go to stdout;
//! prompts, status and errors go to stderr.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind as ClapErrorKind;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use matador::{codec, decrypt, encrypt_for, parse_public_key_pem, Config, Recipient};
use matador::{MatadorError, RecipientDirectory};

#[derive(Parser, Debug)]
#[command(
    name = "matador",
    version,
    about = "Encrypt messages that only your group of friends can read",
    arg_required_else_help = true
)]
struct Cli {
    /// Directory holding private_key.pem and friends.json
    #[arg(long, global = true, env = "MATADOR_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an identity for yourself and generate its keys
    Init {
        /// Name you would like to be known as (prompted if omitted)
        #[arg(long)]
        name: Option<String>,
        /// Replace an existing private key
        #[arg(long)]
        force: bool,
    },
    /// Add a friend's public key; they can read every message you encrypt from now on
    Add {
        /// Path to the friend's .pub.pem file
        path: PathBuf,
        /// Name of the key's owner (prompted if omitted)
        #[arg(long)]
        name: Option<String>,
    },
    /// List friends in your group
    List,
    /// Remove a friend by fingerprint or unique fingerprint prefix
    Delete { fingerprint: String },
    /// Encrypt a message for everyone in your group
    Encrypt {
        /// Read the message from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Decrypt a message addressed to you
    Decrypt {
        /// Read the armored message from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = Config::resolve(cli.home);
    debug!(home = %cfg.home().display(), "using config");
    match cli.command {
        Commands::Init { name, force } => init_command(&cfg, name, force),
        Commands::Add { path, name } => add_command(&cfg, &path, name),
        Commands::List => list_command(&cfg),
        Commands::Delete { fingerprint } => delete_command(&cfg, &fingerprint),
        Commands::Encrypt { input } => encrypt_command(&cfg, input.as_deref()),
        Commands::Decrypt { input } => decrypt_command(&cfg, input.as_deref()),
    }
}

fn init_command(cfg: &Config, name: Option<String>, force: bool) -> Result<()> {
    let store = cfg.identity_store();
    if store.exists() && !force {
        bail!(
            "an identity already exists at {}; pass --force to replace it",
            store.path().display()
        );
    }
    let name = match name {
        Some(n) => n,
        None => prompt_line("Please enter the name you would like to be known as: ")?,
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }

    eprint!("Generating key...");
    let identity = store.create(force)?;
    eprintln!("done!");

    let public_path = cfg.public_key_path(name);
    fs::write(&public_path, identity.public_key_pem()?)
        .with_context(|| format!("writing {}", public_path.display()))?;

    println!("Fingerprint: {}", identity.fingerprint());
    eprintln!(
        "Identity generated. Restrict access to {} and send {} to the other members of your group.",
        store.path().display(),
        public_path.display()
    );
    Ok(())
}

fn add_command(cfg: &Config, path: &Path, name: Option<String>) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("unable to read public key at {}", path.display()))?;
    let key = parse_public_key_pem(&text)?;
    let name = match name {
        Some(n) => n,
        None => prompt_line("Please enter the name of the person who owns this key: ")?,
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }

    let recipient = Recipient::new(name, key)?;
    let mut directory = cfg.open_directory()?;
    directory.add(recipient.clone())?;
    println!(
        "Added \"{}\", Fingerprint: {}",
        recipient.name(),
        recipient.fingerprint()
    );
    Ok(())
}

fn list_command(cfg: &Config) -> Result<()> {
    let directory = cfg.open_directory()?;
    let entries = directory.all_entries();
    if entries.is_empty() {
        eprintln!("You have no friends added yet; use \"add <public key path>\" to add one.");
        return Ok(());
    }
    eprintln!("The following people can decrypt messages you create:");
    for r in entries {
        println!("- \"{}\", Fingerprint: {}", r.name(), r.fingerprint());
    }
    Ok(())
}

fn delete_command(cfg: &Config, fingerprint: &str) -> Result<()> {
    let mut directory = cfg.open_directory()?;
    let removed = directory.remove(fingerprint)?;
    println!(
        "Deleted \"{}\", Fingerprint: {}",
        removed.name(),
        removed.fingerprint()
    );
    Ok(())
}

fn encrypt_command(cfg: &Config, input: Option<&Path>) -> Result<()> {
    let directory = cfg.open_directory()?;
    if directory.is_empty() {
        return Err(anyhow::Error::new(MatadorError::NoRecipients)
            .context("add at least one friend with \"add <public key path>\" first"));
    }

    let message = match input {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            eprintln!("Type your message. End it with a line containing only a single '.':");
            read_message(io::stdin().lock())?.into_bytes()
        }
    };

    let envelope = encrypt_for(&message, &directory)?;
    let armored = codec::serialize(&envelope)?;
    io::stdout().write_all(armored.as_bytes())?;
    Ok(())
}

fn decrypt_command(cfg: &Config, input: Option<&Path>) -> Result<()> {
    let text = match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            eprintln!("Paste the message, including the BEGIN and END lines:");
            read_armored(io::stdin().lock())?
        }
    };

    let identity = cfg
        .identity_store()
        .load()
        .context("run `matador init` to create an identity")?;
    let envelope = codec::deserialize(&text)?;
    let plaintext = decrypt(&envelope, &identity)?;
    io::stdout().write_all(&plaintext)?;
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("no input on stdin");
    }
    Ok(line.trim().to_string())
}

/// Lines up to (not including) a line that is exactly `.`, or EOF.
fn read_message(reader: impl BufRead) -> io::Result<String> {
    let mut message = String::new();
    for line in reader.lines() {
        let line = line?;
        if line == "." {
            break;
        }
        message.push_str(&line);
        message.push('\n');
    }
    Ok(message)
}

/// Lines up to and including the armor END line, or EOF.
fn read_armored(reader: impl BufRead) -> io::Result<String> {
    let end = format!("-----END {}-----", codec::ARMOR_LABEL);
    let mut data = String::new();
    for line in reader.lines() {
        let line = line?;
        data.push_str(&line);
        data.push('\n');
        if line.contains(&end) {
            break;
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_stops_at_dot_line() {
        let input = "hello\nworld\n.\nignored\n";
        assert_eq!(read_message(input.as_bytes()).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn message_without_terminator_reads_to_eof() {
        assert_eq!(read_message("a\n..\n".as_bytes()).unwrap(), "a\n..\n");
    }

    #[test]
    fn armored_stops_after_end_line() {
        let input = "-----BEGIN MATADOR ENCRYPTED MESSAGE-----\nAAAA\n-----END MATADOR ENCRYPTED MESSAGE-----\nrest\n";
        let got = read_armored(input.as_bytes()).unwrap();
        assert!(got.ends_with("-----END MATADOR ENCRYPTED MESSAGE-----\n"));
        assert!(!got.contains("rest"));
    }

    #[test]
    fn cli_parses_global_home() {
        let cli = Cli::try_parse_from(["matador", "--home", "/tmp/x", "delete", "ab12"]).unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Delete { fingerprint } if fingerprint == "ab12"));
    }
}
