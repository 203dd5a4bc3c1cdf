//! `cradle` - CLI for the child identification registry
//!
//! This binary is a thin front end over the `cradle` library: every command
//! maps to one registry operation.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;

use cradle::cli::{
    AddChildCommand, ChildCommand, Cli, Command, ConfigCommand, Credentials, OutputFormat,
    RegisterCommand, SosCommand,
};
use cradle::{init_logging, Child, Config, Cradle, NewChild, PhotoUpload, Session, SosEvent};

/// Most guardians the add form accepts.
const MAX_GUARDIANS: usize = 2;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Register(cmd) => handle_register(&open(&config)?, &cmd),
        Command::Child(cmd) => handle_child(&open(&config)?, cmd),
        Command::Sos(cmd) => handle_sos(&open(&config)?, &cmd),
        Command::Status(cmd) => handle_status(&open(&config)?, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open(config: &Config) -> anyhow::Result<Cradle> {
    Cradle::open(config).context("opening data directory")
}

fn login(cradle: &Cradle, credentials: &Credentials) -> anyhow::Result<Session> {
    let session = cradle.login(&credentials.email, &credentials.password)?;
    Ok(session)
}

fn handle_register(cradle: &Cradle, cmd: &RegisterCommand) -> anyhow::Result<()> {
    let user = cradle
        .accounts()
        .register(&cmd.name, &cmd.email, &cmd.password)?;
    println!("Registered {}. You can now log in.", user.email);
    Ok(())
}

fn handle_child(cradle: &Cradle, cmd: ChildCommand) -> anyhow::Result<()> {
    match cmd {
        ChildCommand::Add(add) => handle_child_add(cradle, add),
        ChildCommand::List {
            credentials,
            format,
        } => {
            let session = login(cradle, &credentials)?;
            let children = cradle.children().list_children(&session)?;
            let greeting = cradle
                .accounts()
                .get_user(session.email())?
                .map_or_else(|| session.full_name().to_string(), |user| user.full_name);
            print_children(&greeting, &children, format)
        }
        ChildCommand::Card {
            credentials,
            id,
            output,
        } => {
            let session = login(cradle, &credentials)?;
            let image = cradle
                .children()
                .get_identification_payload(&session, &id)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &image)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Card for child {id} written to {}", path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&image)),
            }
            Ok(())
        }
    }
}

fn handle_child_add(cradle: &Cradle, cmd: AddChildCommand) -> anyhow::Result<()> {
    if cmd.guardian.len() > MAX_GUARDIANS {
        bail!("at most {MAX_GUARDIANS} guardians can be added");
    }

    let session = login(cradle, &cmd.credentials)?;
    let photo = cmd.photo.as_deref().map(read_photo).transpose()?;

    let id = cradle.children().create_child(
        &session,
        NewChild {
            name: cmd.name,
            age: cmd.age,
            notes: cmd.notes,
            photo,
            guardians: cmd.guardian,
        },
    )?;
    println!("Child added with ID {id}.");
    Ok(())
}

fn read_photo(path: &Path) -> anyhow::Result<PhotoUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PhotoUpload { file_name, bytes })
}

fn print_children(
    full_name: &str,
    children: &[Child],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(children)?);
        return Ok(());
    }

    println!("Welcome, {full_name}");
    if children.is_empty() {
        println!("You have no children added yet.");
        return Ok(());
    }

    for child in children {
        println!();
        println!("[{}] {} (Age {})", child.id, child.name, child.age);
        if !child.photo_ref.is_empty() {
            println!("  Photo:  {}", child.photo_ref);
        }
        if !child.notes.is_empty() {
            println!("  Notes:  {}", child.notes);
        }
        for (i, guardian) in child.guardians.iter().enumerate() {
            println!("  Parent {}: {}", i + 1, guardian.name);
            println!("    Email: {}", guardian.email);
            println!("    Phone: {}", guardian.phone);
        }
    }
    Ok(())
}

fn handle_sos(cradle: &Cradle, cmd: &SosCommand) -> anyhow::Result<()> {
    match cmd {
        SosCommand::Raise { credentials, id } => {
            let session = login(cradle, credentials)?;
            let event = cradle.raise_alert(&session, id)?;
            println!("SOS raised for {}", event.child_name);
            print_alerts(&cradle.alerts().list_alerts(), OutputFormat::Plain)
        }
        SosCommand::List { format } => print_alerts(&cradle.alerts().list_alerts(), *format),
    }
}

fn print_alerts(alerts: &[SosEvent], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("No alerts raised in this session.");
    }
    for alert in alerts {
        println!(
            "#{} {} at {}",
            alert.sequence,
            alert.child_name,
            alert.raised_at.to_rfc3339()
        );
    }
    Ok(())
}

fn handle_status(cradle: &Cradle, json: bool) -> anyhow::Result<()> {
    let status = cradle.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("cradle status");
        println!("-------------");
        println!("Data directory: {}", status.data_dir.display());
        println!("Accounts:       {}", status.users);
        println!("Children:       {}", status.children);
        println!("Photos:         {}", status.photos);
        println!("Cards:          {}", status.images);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Data directory:     {}", config.data_dir().display());
                println!("  Users file:         {}", config.storage.users_file);
                println!("  Children file:      {}", config.storage.children_file);
                println!("  Photos:             {}", config.photos_dir().display());
                println!("  Cards:              {}", config.qrcodes_dir().display());
                println!();
                println!("[Accounts]");
                println!(
                    "  Min password length: {}",
                    config.accounts.min_password_length
                );
                println!();
                println!("[Children]");
                println!("  Max age:            {}", config.children.max_age);
                println!();
                println!("[Payload]");
                println!("  Box size:           {}", config.payload.box_size);
                println!("  Border:             {}", config.payload.border);
                println!(
                    "  Error correction:   {}",
                    config.payload.error_correction
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
