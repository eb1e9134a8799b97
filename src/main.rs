//! stagesync - staged transfer of experiment session data
//!
//! Fetches EEG data from the acquisition host PC, uploads whole session
//! directories (plus imaging and clinical EEG) to the remote archive, and
//! expires the local copy of transferred host data after a retention period.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stagesync::cli::{Args, Command, DestArgs, LogFormat, SessionArgs};
use stagesync::config::Settings;
use stagesync::connectivity;
use stagesync::credentials::{default_credentials_path, CredentialStore};
use stagesync::endpoint::{parse_remote_url, RemoteEndpoint};
use stagesync::log::JsonLogger;
use stagesync::logger::{Logger, NoopLogger, TextLogger};
use stagesync::paths::{available_sessions, discover, experiments_for, DataLayout, SessionId};
use stagesync::sweep::RetentionSweeper;
use stagesync::transport::SyncTransport;
use stagesync::{TransferError, Uploader};

fn main() -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nAborting!");
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let data_root = args.dataroot.clone().unwrap_or_else(|| settings.data_root());
    let logger = open_logger(&args.log_file, args.log_format);

    let ok = match &args.command {
        Command::Host(session) => {
            require_network(&args, &settings, None)?;
            let uploader = uploader(&args, &settings, &data_root, &session.subject, None, &logger);
            check_session(&settings, &data_root, session)?;
            uploader.fetch_host_data(&session.experiment, session.session)?
        }
        Command::Experiment { session, dest } => {
            require_network(&args, &settings, Some(dest))?;
            check_session(&settings, &data_root, session)?;
            let id = SessionId::new(&*session.subject, &*session.experiment, session.session);
            let endpoint = resolve_endpoint(&settings, dest)?.for_session(&id);
            let destination = destination(dest, &endpoint)?;
            let uploader = uploader(&args, &settings, &data_root, &session.subject, Some(endpoint), &logger);
            uploader.upload_experiment_data(&session.experiment, session.session, &destination)?
        }
        Command::Imaging(upload) => {
            require_network(&args, &settings, Some(&upload.dest))?;
            let endpoint = resolve_endpoint(&settings, &upload.dest)?;
            let endpoint = if upload.dest.dest.is_some() {
                endpoint
            } else {
                endpoint.with_remote_dir(&settings.imaging.remote_dir)
            };
            let destination = destination(&upload.dest, &endpoint)?;
            let uploader = uploader(&args, &settings, &data_root, &upload.subject, Some(endpoint), &logger);
            uploader.upload_imaging(&upload.source, &destination)?
        }
        Command::Clinical(upload) => {
            require_network(&args, &settings, Some(&upload.dest))?;
            let endpoint = resolve_endpoint(&settings, &upload.dest)?;
            let endpoint = if upload.dest.dest.is_some() {
                endpoint
            } else {
                endpoint.with_remote_dir(&settings.clinical.remote_dir)
            };
            let destination = destination(&upload.dest, &endpoint)?;
            let uploader = uploader(&args, &settings, &data_root, &upload.subject, Some(endpoint), &logger);
            uploader.upload_clinical_eeg(&upload.source, &destination)?
        }
        Command::Sweep { lifetime_days } => {
            let lifetime = lifetime_days.unwrap_or(settings.archive.lifetime_days);
            if lifetime < 0 {
                bail!("lifetime must be a non-negative number of days, got {lifetime}");
            }
            let archive = settings.archive_dir();
            let report = RetentionSweeper::new(&archive, lifetime, &*logger).sweep()?;
            println!(
                "Removed {} and kept {} entries under {}",
                report.removed.len(),
                report.kept.len(),
                archive.display()
            );
            true
        }
        Command::List {
            subject,
            experiment,
        } => {
            list(&settings, &data_root, subject.as_deref(), experiment.as_deref())?;
            true
        }
        Command::Status(session) => {
            let layout = DataLayout::new(&data_root);
            let id = SessionId::new(&*session.subject, &*session.experiment, session.session);
            let state = stagesync::SessionState::inspect(&layout, &settings.archive_dir(), &id)?;
            println!("{id}: {state}");
            true
        }
    };

    if !ok {
        eprintln!("Transfer failed; see {}", args.log_file.display());
        std::process::exit(1);
    }
    Ok(())
}

fn open_logger(path: &Path, format: LogFormat) -> Arc<dyn Logger> {
    let opened: Result<Arc<dyn Logger>> = match format {
        LogFormat::Text => TextLogger::new(path).map(|l| Arc::new(l) as Arc<dyn Logger>),
        LogFormat::Json => JsonLogger::new(path).map(|l| Arc::new(l) as Arc<dyn Logger>),
    };
    match opened {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e:#}", path.display());
            Arc::new(NoopLogger)
        }
    }
}

/// Fail early when the network is down, unless the run stays on this machine.
fn require_network(args: &Args, settings: &Settings, dest: Option<&DestArgs>) -> Result<()> {
    let local = dest.map_or(false, |d| d.local_dir.is_some());
    if args.offline || local {
        return Ok(());
    }
    connectivity::check(&settings.connectivity.probe, settings.connectivity.timeout())
        .context("No network connection; check the network or pass --offline")
}

fn resolve_endpoint(settings: &Settings, dest: &DestArgs) -> Result<RemoteEndpoint> {
    let mut endpoint = settings.remote.endpoint();
    if let Some(url) = &dest.dest {
        endpoint = parse_remote_url(url, &endpoint.key)
            .with_context(|| format!("invalid remote destination '{url}', expected user@host:dir"))?;
    }
    if let Some(key) = &dest.ssh_key {
        endpoint.key = key.clone();
    }
    Ok(endpoint)
}

fn destination(dest: &DestArgs, endpoint: &RemoteEndpoint) -> Result<String> {
    match &dest.local_dir {
        Some(dir) => {
            if !dir.is_dir() {
                return Err(TransferError::NotFound(dir.clone()))
                    .context("local upload directory must already exist");
            }
            Ok(dir.to_string_lossy().into_owned())
        }
        None => {
            if endpoint.hostname.is_empty() {
                bail!("no remote host configured; set remote.hostname or pass --dest user@host:dir");
            }
            Ok(endpoint.url())
        }
    }
}

fn uploader(
    args: &Args,
    settings: &Settings,
    data_root: &Path,
    subject: &str,
    endpoint: Option<RemoteEndpoint>,
    logger: &Arc<dyn Logger>,
) -> Uploader {
    let endpoint = endpoint.unwrap_or_else(|| settings.remote.endpoint());
    let transport = SyncTransport::new(endpoint, logger.clone()).with_commands(
        settings.remote.sync_local.clone(),
        settings.remote.sync_remote.clone(),
    );
    let passwords = CredentialStore::new(default_credentials_path(), |message: &str| {
        rpassword::prompt_password(message).map_err(TransferError::Io)
    });
    Uploader::new(
        subject,
        DataLayout::new(data_root),
        settings.archive_dir(),
        Box::new(transport),
        logger.clone(),
    )
    .with_host(settings.host_pc.clone(), Box::new(passwords))
    .with_calibration_experiment(settings.calibration_experiment.clone())
    .show_progress(!args.quiet)
}

/// Reject sessions with no session log, except for the calibration experiment.
fn check_session(settings: &Settings, data_root: &Path, session: &SessionArgs) -> Result<()> {
    if session.experiment == settings.calibration_experiment {
        return Ok(());
    }
    let sessions = available_sessions(
        &session.subject,
        &session.experiment,
        data_root,
        settings.max_sessions,
    )?;
    if !sessions.contains(&session.session) {
        bail!(
            "no session log for {} {} session {} under {} (available: {:?})",
            session.subject,
            session.experiment,
            session.session,
            data_root.display(),
            sessions
        );
    }
    Ok(())
}

fn list(
    settings: &Settings,
    data_root: &Path,
    subject: Option<&str>,
    experiment: Option<&str>,
) -> Result<()> {
    let discovered = discover(data_root)?;
    let subjects: Vec<String> = match subject {
        Some(s) => vec![s.to_string()],
        None => discovered.keys().cloned().collect(),
    };
    let layout = DataLayout::new(data_root);
    let archive: PathBuf = settings.archive_dir();
    for subject in subjects {
        println!("{subject}");
        let experiments = experiments_for(&discovered, &subject, &settings.calibration_experiment);
        for exp in experiments
            .iter()
            .filter(|e| experiment.map_or(true, |x| x == e.as_str()))
        {
            println!("  {exp}");
            let sessions = available_sessions(&subject, exp, data_root, settings.max_sessions)?;
            for session in sessions {
                let id = SessionId::new(&*subject, &**exp, session);
                let state = stagesync::SessionState::inspect(&layout, &archive, &id)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                println!("    session {session}: {state}");
            }
        }
    }
    Ok(())
}
