// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transfer the night's output tree to the archive and tell the ingestion
//! service how many frames to expect.

use chrono::Utc;
use log::{error, info, warn};

use super::StageError;
use crate::{
    clients::{json_str, TrackingField},
    config::{ConfigError, KoaxfrConfig},
    io::{files::size_mb, find_files},
    pipeline::PipelineContext,
};

/// Compressed lev0 frames ready for ingestion.
fn lev0_frames(ctx: &PipelineContext) -> Result<Vec<std::path::PathBuf>, StageError> {
    if !ctx.dirs.lev0.is_dir() {
        return Ok(vec![]);
    }
    Ok(find_files(&ctx.dirs.lev0, "*.fits.gz")?)
}

fn run_checked(ctx: &PipelineContext, program: &str, args: Vec<String>) -> Result<(), StageError> {
    let output = ctx.clients.runner.run(program, &args)?;
    if output.success {
        Ok(())
    } else {
        Err(StageError::Transfer(format!(
            "{program} {} failed: {}",
            args.join(" "),
            output.stderr.trim()
        )))
    }
}

/// `rsync` the process directory into `<DIR>/<INSTR>/` on the archive host.
fn transfer(ctx: &PipelineContext, xfr: &KoaxfrConfig) -> Result<(), StageError> {
    let remote_dir = format!("{}/{}", xfr.dir.trim_end_matches('/'), ctx.code());
    let host = format!("{}@{}", xfr.account, xfr.server);
    info!("Transferring {} to {host}:{remote_dir}", ctx.dirs.process.display());

    run_checked(
        ctx,
        "ssh",
        vec![host.clone(), "mkdir".into(), "-p".into(), remote_dir.clone()],
    )?;
    run_checked(
        ctx,
        "rsync",
        vec![
            "-az".into(),
            ctx.dirs.process.display().to_string(),
            format!("{host}:{remote_dir}/"),
        ],
    )
}

/// Tell the ingestion service about the night. Any reply other than OK is
/// reported to the admin.
fn notify(ctx: &PipelineContext, num_files: usize) {
    let Some(url) = ctx.config.api.koaapi.as_deref() else {
        warn!("No API/KOAAPI configured; the archive won't be notified");
        return;
    };
    let params = [
        ("instrument", ctx.code().to_string()),
        ("ingestType", "lev0".to_string()),
        ("date", ctx.dirs.date.clone()),
        ("numFiles", num_files.to_string()),
    ];
    let reply = ctx.clients.http.get_json(url, &params);
    match reply.as_ref().and_then(|r| json_str(r, "stat")) {
        Some(stat) if stat == "OK" => info!("The archive acknowledged {num_files} files"),
        _ => {
            error!("The ingestion notification wasn't acknowledged: {reply:?}");
            ctx.email_admin(
                &format!("{} DEP ingestion error ({})", ctx.code(), ctx.ut_date_str()),
                &format!(
                    "The ingestion API didn't acknowledge {num_files} lev0 files for {} on {}.\nReply: {reply:?}",
                    ctx.code(),
                    ctx.ut_date_str()
                ),
            );
        }
    }
}

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let tracker = &ctx.clients.tracker;
    let frames = lev0_frames(ctx)?;
    if frames.is_empty() {
        info!("No lev0 frames to transfer");
        tracker.update(TrackingField::OndiskStat, "N/A");
        notify(ctx, 0);
        return Ok(());
    }

    let xfr = ctx
        .config
        .koaxfr
        .as_ref()
        .ok_or(ConfigError::MissingKey {
            section: "KOAXFR",
            key: "SERVER",
            stage: "koaxfr",
        })?;

    let mut size = 0.0;
    for frame in &frames {
        size += size_mb(frame)?;
    }
    transfer(ctx, xfr)?;

    tracker.update(TrackingField::OndiskStat, "DONE");
    tracker.update(
        TrackingField::OndiskTime,
        &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    tracker.update(TrackingField::FilesArch, &frames.len().to_string());
    tracker.update(TrackingField::Size, &format!("{size:.3}"));

    notify(ctx, frames.len());

    if let Some(to) = xfr.email_to.as_deref() {
        let from = xfr.email_from.as_deref().unwrap_or(to);
        let subject = format!("{} lev0 transfer {}", ctx.code(), ctx.dirs.date);
        let body = format!(
            "{} lev0 files ({size:.3} MB) transferred to {}:{}",
            frames.len(),
            xfr.server,
            xfr.dir
        );
        if let Err(e) = ctx.clients.mailer.send(from, to, &subject, &body) {
            warn!("Couldn't send the transfer email to {to}: {e}");
        }
    }
    Ok(())
}
