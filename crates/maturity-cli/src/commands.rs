use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use tokio::sync::broadcast;

use maturity_core::models::question::ALL_PROFILES;
use maturity_core::{Assessment, QuestionCatalog, keys, load_catalog};
use maturity_scoring::{overall_maturity, progress};
use maturity_storage::{FileStore, SyncFolderHandle};
use maturity_sync::{AppEvent, AssessmentController, ImportReport, SyncReport};

use crate::cli::{Cli, Command, Target};
use crate::config::{MaturityConfig, default_config_path, load_config, save_config};

/// Run one CLI invocation, writing user-facing output to `out`.
pub async fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_config(&config_path)?;

    if let Command::Config { init } = &cli.command {
        return print_config(&config, &config_path, *init, out);
    }
    if let Command::Catalog { profile, json } = &cli.command {
        let catalog = load_catalog(config.catalog_path.as_deref());
        return print_catalog(&catalog, profile.as_deref(), *json, out);
    }

    let controller = open_controller(&config).await?;
    if cli.command.uses_folder() {
        controller.restore_sync_folder().await?;
    }
    let result = dispatch(&controller, cli.command, out).await;
    controller.shutdown().await;
    result
}

pub async fn open_controller(config: &MaturityConfig) -> Result<AssessmentController> {
    let data_dir = config.data_dir()?;
    tracing::debug!(path = %data_dir.display(), "opening local store");
    let store = Arc::new(FileStore::new(data_dir));
    let catalog = load_catalog(config.catalog_path.as_deref());
    Ok(AssessmentController::open(store, catalog, config.sync_settings()).await)
}

async fn dispatch(
    controller: &AssessmentController,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Start { target, profile } => {
            let assessment = controller
                .start_assessment(&target.name, target.interview.as_deref(), profile.as_deref())
                .await?;
            controller.save_now().await?;
            writeln!(
                out,
                "{} ({} answered)",
                assessment.key(),
                assessment.answers.len()
            )?;
        }
        Command::Answer {
            target,
            question,
            answer,
            by,
        } => {
            open(controller, &target).await?;
            controller
                .record_answer(&question, answer, by.as_deref())
                .await?;
            controller.save_now().await?;
            print_progress(controller, out).await?;
        }
        Command::Clear { target, question } => {
            open(controller, &target).await?;
            if controller.clear_answer(&question).await?.is_none() {
                writeln!(out, "{question} was not answered")?;
            }
            controller.save_now().await?;
            print_progress(controller, out).await?;
        }
        Command::Comment {
            target,
            question,
            text,
        } => {
            open(controller, &target).await?;
            controller.record_comment(&question, &text).await?;
            controller.save_now().await?;
        }
        Command::Scores { target, json } => {
            open(controller, &target).await?;
            let scores = controller.compute_scores().await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&scores)?)?;
                return Ok(());
            }
            for theme in scores.iter() {
                writeln!(
                    out,
                    "{:<40} {}  {}",
                    theme.theme,
                    theme.score,
                    theme.level()
                )?;
            }
            if let Some(overall) = overall_maturity(&scores) {
                writeln!(out, "{:<40} {overall:.1}", "Overall")?;
            }
        }
        Command::List => {
            let catalog = controller.catalog();
            for a in controller.assessments().await {
                let profile = first_profile(&a);
                let done = progress(&a, catalog, profile);
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}/{}",
                    a.name,
                    a.interview_name_or_name(),
                    a.date.strftime("%Y-%m-%d %H:%M"),
                    done.answered,
                    done.total
                )?;
            }
        }
        Command::Delete { target } => {
            let removed = controller
                .delete_assessment(&target.name, target.interview.as_deref())
                .await?;
            writeln!(out, "deleted {}", removed.key())?;
        }
        Command::SyncFolder { dir } => {
            let report = controller
                .select_sync_folder(SyncFolderHandle::new(dir.clone()))
                .await
                .wrap_err_with(|| format!("cannot sync with {}", dir.display()))?;
            writeln!(out, "syncing with {}", dir.display())?;
            print_sync_report(&report, out)?;
        }
        Command::SyncOff => {
            controller.disable_sync().await?;
            writeln!(out, "folder sync disabled")?;
        }
        Command::Sync => {
            require_sync(controller)?;
            let report = controller.sync_now().await?;
            print_sync_report(&report, out)?;
        }
        Command::Watch => {
            require_sync(controller)?;
            watch(controller, out).await?;
        }
        Command::Export { file } => {
            let path = file.unwrap_or_else(|| {
                PathBuf::from(keys::backup_file(jiff::Zoned::now().date()))
            });
            let text = controller.export_backup().await?;
            write_backup(&path, &text)?;
            let count = controller.assessments().await.len();
            writeln!(out, "exported {count} assessments to {}", path.display())?;
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("failed to read {}", file.display()))?;
            let report = controller.import_backup(&text).await?;
            print_import_report(&report, out)?;
        }
        Command::Catalog { .. } | Command::Config { .. } => {}
    }
    Ok(())
}

async fn open(controller: &AssessmentController, target: &Target) -> Result<Assessment> {
    Ok(controller
        .open_assessment(&target.name, target.interview.as_deref())
        .await?)
}

fn require_sync(controller: &AssessmentController) -> Result<()> {
    if !controller.is_sync_enabled() {
        eyre::bail!("folder sync is off; run `maturity sync-folder <dir>` first");
    }
    Ok(())
}

fn first_profile(assessment: &Assessment) -> &str {
    assessment
        .selected_profiles()
        .first()
        .copied()
        .unwrap_or(ALL_PROFILES)
}

async fn print_progress(controller: &AssessmentController, out: &mut impl Write) -> Result<()> {
    let Some(current) = controller.current().await else {
        return Ok(());
    };
    let done = progress(&current, controller.catalog(), first_profile(&current));
    writeln!(
        out,
        "{}: {}/{} answered ({:.0}%)",
        current.key(),
        done.answered,
        done.total,
        done.percentage()
    )?;
    Ok(())
}

fn print_sync_report(report: &SyncReport, out: &mut impl Write) -> Result<()> {
    print_import_report(&report.import, out)?;
    let export = &report.export;
    writeln!(
        out,
        "exported: {} written, {} unchanged, {} failed, {} orphans removed",
        export.written, export.unchanged, export.failed, export.orphans_deleted
    )?;
    Ok(())
}

fn print_import_report(report: &ImportReport, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "imported: {} added, {} updated, {} unchanged, {} skipped while editing, {} invalid",
        report.added.len(),
        report.adopted.len(),
        report.unchanged,
        report.skipped_editing.len(),
        report.invalid
    )?;
    Ok(())
}

fn print_catalog(
    catalog: &QuestionCatalog,
    profile: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    if json {
        writeln!(out, "{}", catalog.to_questions_json()?)?;
        return Ok(());
    }
    for theme in &catalog.themes {
        writeln!(out, "{theme}")?;
        for q in catalog.questions_for_theme(theme) {
            if profile.is_some_and(|p| !q.is_visible_to(p)) {
                continue;
            }
            writeln!(out, "  [{}] (w{}) {}", q.id, q.weight, q.text)?;
        }
    }
    Ok(())
}

fn print_config(
    config: &MaturityConfig,
    path: &Path,
    init: bool,
    out: &mut impl Write,
) -> Result<()> {
    if init {
        save_config(config, path)?;
        writeln!(out, "wrote {}", path.display())?;
    } else {
        writeln!(out, "# {}", path.display())?;
    }
    writeln!(out, "{}", serde_json::to_string_pretty(config)?)?;
    Ok(())
}

fn write_backup(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, text).wrap_err_with(|| format!("failed to write {}", path.display()))
}

/// Print sync events until Ctrl-C.
async fn watch(controller: &AssessmentController, out: &mut impl Write) -> Result<()> {
    let mut events = controller.subscribe();
    writeln!(out, "watching the sync folder, Ctrl-C to stop")?;
    out.flush()?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(AppEvent::Imported { added, adopted }) => {
                    writeln!(out, "imported {added} new, {adopted} updated")?;
                }
                Ok(AppEvent::CurrentRefreshed(key)) => writeln!(out, "{key} refreshed")?,
                Ok(AppEvent::SyncDisabled { reason }) => {
                    writeln!(out, "sync disabled: {reason}")?;
                    break;
                }
                Ok(AppEvent::SaveStatusChanged(_)) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
        out.flush()?;
    }
    Ok(())
}
