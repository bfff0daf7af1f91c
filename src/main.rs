use std::io::{Read, Write};

use clap::Parser;
use kdam::{Bar, BarExt, tqdm};
use notebert::{
    ConfigDb,
    DataDir,
    ModelManager,
    NoteStore,
    checklist::{Checklist, ChecklistStatus},
    cli::{self, ChecklistAction, Cli, Command, ModelAction},
    config_db::MODEL_SETTING,
    error,
    mcp,
    model_manager::{DEFAULT_MODEL_ID, MODEL_ENV_VAR},
    note_store,
    recall::{self, Recall, RecallOptions},
    reflow::reflow,
    text_util::{DEFAULT_PREVIEW_CHARS, add_line_numbers, preview},
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("NOTEBERT_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    let open_store = || -> error::Result<NoteStore> {
        let kind = config_db.resolve_store_kind(cli.store)?;
        NoteStore::open(kind, &data_dir)
    };
    let load_model = || -> error::Result<ModelManager> {
        let model_id = config_db.resolve_model_id(cli.model.as_deref())?;
        Ok(ModelManager::with_model_id(model_id))
    };

    match &cli.command {
        Command::Add(args) => {
            cmd_add(&open_store()?, args.text.as_deref())?;
        }
        Command::List(args) => {
            cmd_list(&open_store()?, args)?;
        }
        Command::Get(args) => {
            cmd_get(&open_store()?, args)?;
        }
        Command::Recall(args) => {
            cmd_recall(&open_store()?, &mut load_model()?, args, cli.quiet)?;
        }
        Command::Reflow => {
            print!("{}", reflow(&read_stdin()?));
        }
        Command::Import(args) => {
            cmd_import(&open_store()?, &args.path)?;
        }
        Command::Export(args) => {
            cmd_export(&open_store()?, args)?;
        }
        Command::Checklist { action } => {
            cmd_checklist(&data_dir, action)?;
        }
        Command::Model { action } => match action {
            ModelAction::Show { json } => {
                cmd_model_show(&config_db, cli.model.as_deref(), *json)?;
            }
            ModelAction::Set { model } => {
                config_db.set_setting(MODEL_SETTING, model)?;
                println!("Default model set to '{model}'");
            }
            ModelAction::Clear => {
                if config_db.remove_setting(MODEL_SETTING)? {
                    println!("Cleared stored model setting");
                } else {
                    println!("No stored model setting to clear");
                }
            }
        },
        Command::Status(args) => {
            cmd_status(
                &config_db,
                &data_dir,
                &open_store()?,
                cli.model.as_deref(),
                args.json,
            )?;
        }
        Command::Mcp => {
            mcp::run_mcp(open_store()?, load_model()?)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

fn read_stdin() -> error::Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

fn cmd_add(store: &NoteStore, text: Option<&str>) -> error::Result<()> {
    let text = match text {
        Some(text) => text.to_string(),
        None => read_stdin()?.trim_end_matches(['\n', '\r']).to_string(),
    };

    match recall::add_note(store, &text)? {
        Some(key) => println!("Stored note {key}"),
        None => eprintln!(
            "Warning: nothing stored, notes need at least {} characters",
            recall::MIN_NOTE_CHARS
        ),
    }
    Ok(())
}

fn cmd_list(store: &NoteStore, args: &cli::ListArgs) -> error::Result<()> {
    let notes = store.load_all()?.unwrap_or_default();

    if args.json {
        let items: Vec<_> = notes
            .iter()
            .map(|(key, text)| json!({ "key": key, "text": text }))
            .collect();
        println!("{}", serde_json::to_string(&items)?);
    } else if notes.is_empty() {
        println!("No notes stored.");
    } else if args.full {
        for (key, text) in &notes {
            println!("--- {key} ---");
            println!("{text}");
        }
    } else {
        for (key, text) in &notes {
            println!("{key}\t{}", preview(text, DEFAULT_PREVIEW_CHARS));
        }
    }
    Ok(())
}

fn cmd_get(store: &NoteStore, args: &cli::GetArgs) -> error::Result<()> {
    let text = store.get(args.key)?.ok_or_else(|| error::Error::NotFound {
        kind: "note",
        name: args.key.to_string(),
    })?;

    if args.json {
        println!("{}", json!({ "key": args.key, "text": text }));
    } else if args.line_numbers {
        println!("{}", add_line_numbers(&text));
    } else {
        println!("{text}");
    }
    Ok(())
}

fn cmd_recall(
    store: &NoteStore,
    model: &mut ModelManager,
    args: &cli::RecallArgs,
    quiet: bool,
) -> error::Result<()> {
    let options = RecallOptions { reflow: !args.raw };
    let mut bar: Option<Bar> = None;

    let outcome = recall::recall_with_progress(
        store,
        model,
        &args.query,
        options,
        |done, total| {
            if quiet {
                return;
            }
            let bar = bar.get_or_insert_with(|| {
                tqdm!(total = total, desc = "Embedding notes")
            });
            if let Err(e) = bar.update_to(done) {
                tracing::debug!(error = %e, "progress bar update failed");
            }
        },
    )?;

    if let Some(mut bar) = bar {
        bar.refresh()?;
        eprintln!();
    }

    match outcome {
        Recall::NoNotes => {
            eprintln!("Warning: no notes stored yet. Add one with `notebert add`.");
        }
        Recall::Found(hit) => {
            if args.json {
                println!(
                    "{}",
                    json!({
                        "query": args.query,
                        "key": hit.key,
                        "distance": hit.distance,
                        "text": hit.text,
                    })
                );
            } else {
                println!("{}", hit.text);
            }
        }
    }
    Ok(())
}

fn cmd_import(store: &NoteStore, path: &std::path::Path) -> error::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let record = note_store::parse_record(&raw).map_err(|e| {
        error::Error::Config(format!(
            "{} is not a note record: {e}",
            path.display()
        ))
    })?;

    let keys = store.import(&record)?;
    match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => {
            println!("Imported {} notes as keys {first}..={last}", keys.len());
        }
        _ => println!("No notes to import from {}", path.display()),
    }
    Ok(())
}

fn cmd_export(store: &NoteStore, args: &cli::ExportArgs) -> error::Result<()> {
    let notes = store.load_all()?.unwrap_or_default();

    match &args.output {
        Some(path) => {
            note_store::write_record(path, &notes)?;
            eprintln!("Exported {} notes to {}", notes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&note_store::encode_record(&notes)?)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn cmd_checklist(
    data_dir: &DataDir,
    action: &ChecklistAction,
) -> error::Result<()> {
    let checklist = Checklist::production_readiness();
    let mut status = ChecklistStatus::load(&data_dir.checklist_status());

    let (name, checked) = match action {
        ChecklistAction::Show { json } => {
            print_checklist(&checklist, &status, *json)?;
            return Ok(());
        }
        ChecklistAction::Check { item } => (item, true),
        ChecklistAction::Uncheck { item } => (item, false),
    };

    let item = checklist.resolve(name).ok_or_else(|| error::Error::NotFound {
        kind: "checklist item",
        name: name.clone(),
    })?;
    status.set(item, checked);
    status.save()?;

    let mark = if checked { "Checked" } else { "Unchecked" };
    println!(
        "{mark} '{item}' ({}/{} done)",
        status.checked_count(&checklist),
        checklist.items().count()
    );
    Ok(())
}

fn print_checklist(
    checklist: &Checklist,
    status: &ChecklistStatus,
    json: bool,
) -> error::Result<()> {
    if json {
        let sections: Vec<_> = checklist
            .sections()
            .iter()
            .map(|section| {
                let items: Vec<_> = section
                    .items
                    .iter()
                    .map(|item| json!({ "item": item, "checked": status.is_checked(item) }))
                    .collect();
                json!({ "title": section.title, "items": items })
            })
            .collect();
        println!("{}", serde_json::to_string(&sections)?);
        return Ok(());
    }

    for (i, section) in checklist.sections().iter().enumerate() {
        if i > 0 {
            println!();
        }
        if !section.title.is_empty() {
            println!("{}", section.title);
        }
        for item in &section.items {
            let mark = if status.is_checked(item) { "x" } else { " " };
            println!("  [{mark}] {item}");
        }
    }
    println!(
        "\n{}/{} done",
        status.checked_count(checklist),
        checklist.items().count()
    );
    Ok(())
}

fn cmd_model_show(
    config_db: &ConfigDb,
    cli_model: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let stored = config_db.get_setting(MODEL_SETTING)?;
    let env = std::env::var(MODEL_ENV_VAR).ok();
    let resolved = config_db.resolve_model_id(cli_model)?;

    let source = if cli_model.is_some() {
        "cli"
    } else if stored.is_some() {
        "config"
    } else if env.is_some() {
        "env"
    } else {
        "default"
    };

    if json {
        println!(
            "{}",
            json!({
                "resolved": resolved,
                "source": source,
                "stored": stored,
                "env": env,
                "default": DEFAULT_MODEL_ID,
            })
        );
    } else {
        println!("Model: {resolved} ({source})");
        if let Some(stored) = &stored {
            println!("Stored setting: {stored}");
        }
        if let Some(env) = &env {
            println!("{MODEL_ENV_VAR}: {env}");
        }
    }
    Ok(())
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    store: &NoteStore,
    cli_model: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let note_count = store.len()?;
    let model_name = config_db.resolve_model_id(cli_model)?;

    let checklist = Checklist::production_readiness();
    let status = ChecklistStatus::load(&data_dir.checklist_status());
    let checked = status.checked_count(&checklist);
    let total = checklist.items().count();

    if json {
        println!(
            "{}",
            json!({
                "data_dir": data_dir.root().display().to_string(),
                "store": store.describe(),
                "model": model_name,
                "notes": note_count,
                "checklist": { "checked": checked, "total": total },
            })
        );
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Store: {}", store.describe());
        println!("Model: {model_name}");
        println!("Notes: {note_count}");
        println!("Checklist: {checked}/{total} done");
    }
    Ok(())
}
