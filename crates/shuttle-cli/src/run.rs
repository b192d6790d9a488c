use crate::cli::RunArgs;
use crate::context::{batch_key, AppContext};
use crate::progress::{format_bytes, ProgressLogger};
use eyre::{bail, Result};
use rayon::prelude::*;
use shuttle_core::transform::parse_transform;
use shuttle_core::{BatchDescriptor, JobConfig, SyncError, TransferEngine, TransferStats};
use std::sync::Arc;
use std::time::Instant;

type BatchOutcome = (usize, shuttle_core::Result<TransferStats>);

/// Pick the batches this invocation is responsible for.
fn select_batches(job: &JobConfig, args: &RunArgs) -> Result<Vec<(usize, BatchDescriptor)>> {
    if let Some(batch_id) = args.batch_id {
        return Ok(vec![(batch_id, job.descriptor_for_batch(batch_id)?)]);
    }
    if let Some(modulo_id) = args.modulo_id {
        return Ok(vec![(modulo_id, job.descriptor_for_modulo(modulo_id)?)]);
    }
    if args.all {
        if job.batches.is_empty() {
            return (0..job.num_batches)
                .map(|id| -> Result<_> { Ok((id, job.descriptor_for_modulo(id)?)) })
                .collect();
        }
        return job
            .batches
            .iter()
            .map(|batch| -> Result<_> {
                Ok((batch.batch_id, job.descriptor_for_batch(batch.batch_id)?))
            })
            .collect();
    }
    if let Some(modulo_id) = job.modulo_id {
        return Ok(vec![(modulo_id, job.descriptor_for_modulo(modulo_id)?)]);
    }
    if let [batch] = job.batches.as_slice() {
        return Ok(vec![(batch.batch_id, job.descriptor_for_batch(batch.batch_id)?)]);
    }
    bail!("job has several batches; select one with --batch-id, --modulo-id or --all")
}

pub fn run_sync(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let job = JobConfig::load(&args.job)?;
    let selected = select_batches(&job, args)?;
    let store = ctx.checkpoint_store(args.checkpoint_dir.as_deref())?;
    log::debug!("checkpoints stored under {}", store.dir().display());

    let mut engine = TransferEngine::new(Arc::clone(&ctx.registry), Arc::new(store));
    if let Some(names) = args.transform.as_deref().or(job.transform.as_deref()) {
        engine = engine.with_transform(parse_transform(names)?);
    }
    let progress = args.progress.then(|| Arc::new(ProgressLogger::new()));
    if let Some(progress) = &progress {
        engine = engine.with_logger(progress.clone());
    }

    println!(
        "shuttle v{}: {} batch(es) {} -> {} (run {})",
        env!("CARGO_PKG_VERSION"),
        selected.len(),
        job.source_path,
        job.target_path,
        args.run_id
    );

    let start = Instant::now();
    let run_one = |(batch_id, descriptor): &(usize, BatchDescriptor)| -> BatchOutcome {
        let key = batch_key(&args.task_id, *batch_id, &args.run_id);
        (*batch_id, engine.run(descriptor, &key))
    };
    let mut outcomes: Vec<BatchOutcome> = if selected.len() > 1 {
        selected.par_iter().map(run_one).collect()
    } else {
        selected.iter().map(run_one).collect()
    };
    outcomes.sort_by_key(|(batch_id, _)| *batch_id);
    if let Some(progress) = &progress {
        progress.finish();
    }

    report(outcomes, start)
}

fn report(outcomes: Vec<BatchOutcome>, start: Instant) -> Result<()> {
    let batch_count = outcomes.len();
    let mut totals = TransferStats::default();
    let mut failures: Vec<(usize, SyncError)> = Vec::new();

    for (batch_id, outcome) in outcomes {
        match outcome {
            Ok(stats) => {
                totals.merge(&stats);
                println!(
                    "  batch {batch_id}: {} synced, {} skipped ({})",
                    stats.synced,
                    stats.skipped,
                    format_bytes(stats.total_bytes)
                );
            }
            Err(err) => {
                if let Some(stats) = err.stats() {
                    totals.merge(stats);
                }
                log::error!("batch {batch_id} failed ({:?}): {err}", err.category());
                println!("  batch {batch_id}: FAILED: {err}");
                failures.push((batch_id, err));
            }
        }
    }

    println!(
        "Synced {} of {} file(s), skipped {}, failed {} ({}) in {:.2?}",
        totals.synced,
        totals.total_files,
        totals.skipped,
        totals.failed,
        format_bytes(totals.total_bytes),
        start.elapsed()
    );

    match failures.len() {
        0 => Ok(()),
        1 if batch_count == 1 => {
            let (_, err) = failures.remove(0);
            Err(err.into())
        }
        n => {
            let ids: Vec<String> = failures.iter().map(|(id, _)| id.to_string()).collect();
            bail!("{n} of {batch_count} batch(es) failed: {}", ids.join(", "))
        }
    }
}
