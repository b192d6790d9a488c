use crate::cli::{CheckpointArgs, CheckpointCommand};
use crate::context::{batch_key, AppContext};
use chrono::Utc;
use eyre::{Context, Result};
use shuttle_core::{CheckpointKey, CheckpointStore};

fn key_for(args: &CheckpointArgs) -> CheckpointKey {
    match args.batch_id {
        Some(batch_id) => batch_key(&args.task_id, batch_id, &args.run_id),
        None => CheckpointKey::new(args.task_id.clone(), args.run_id.clone()),
    }
}

pub fn run_checkpoint(ctx: &AppContext, command: &CheckpointCommand) -> Result<()> {
    match command {
        CheckpointCommand::Show(args) => show(ctx, args),
        CheckpointCommand::Clear(args) => clear(ctx, args),
    }
}

fn show(ctx: &AppContext, args: &CheckpointArgs) -> Result<()> {
    let store = ctx.checkpoint_store(args.checkpoint_dir.as_deref())?;
    let key = key_for(args);
    let entries = store.load(&key)?;

    if args.json {
        let body =
            serde_json::to_string_pretty(&entries).context("failed to serialize checkpoint")?;
        println!("{body}");
        return Ok(());
    }

    println!("Checkpoint {key}: {} committed file(s)", entries.len());
    println!("File: {}", store.path_for(&key).display());
    let now = Utc::now();
    for (file_name, entry) in &entries {
        let age = (now - entry.committed_at).num_seconds().max(0);
        println!(
            "  {file_name}  {} bytes  {} ({age}s ago)",
            entry.bytes_written,
            entry.committed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn clear(ctx: &AppContext, args: &CheckpointArgs) -> Result<()> {
    let store = ctx.checkpoint_store(args.checkpoint_dir.as_deref())?;
    let key = key_for(args);
    store.clear(&key)?;
    println!("Cleared checkpoint {key}.");
    Ok(())
}
