use crate::cli::PlanArgs;
use crate::context::AppContext;
use eyre::{Context, Result};
use shuttle_core::partition::plan_batches;
use shuttle_core::JobConfig;
use std::fs;

pub fn run_plan(ctx: &AppContext, args: &PlanArgs) -> Result<()> {
    let job = JobConfig::load(&args.job)?;
    let source = ctx
        .registry
        .create(&job.source_type, &job.source_conn_id)
        .wrap_err_with(|| format!("failed to open source connection '{}'", job.source_conn_id))?;

    let plan = plan_batches(
        source.as_ref(),
        &job.source_path,
        job.num_batches,
        args.mode.into(),
    )?;
    let planned_files: usize = plan.batches.iter().map(|b| b.files.len()).sum();
    log::info!(
        "planned {planned_files} file(s) into {} batch(es) from {}",
        plan.batches.len(),
        plan.source_dir
    );

    let body = job.with_plan(plan).to_json_pretty()?;
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{body}\n"))
                .wrap_err_with(|| format!("failed to write plan: {}", path.display()))?;
            println!("Wrote plan for {planned_files} file(s) to {}", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}
