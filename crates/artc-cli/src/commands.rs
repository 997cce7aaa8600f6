//! One function per subcommand

use anyhow::{Context, Result};
use artc_artifact::{ArtifactId, ArtifactKind, ArtifactStatus, CreatedBy};
use artc_compiler::{CompilerContext, ErrorKind, ReplayModel};
use artc_core::{BuildOutcome, Workspace};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Inputs assembled into a compiler context
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ContextArgs {
    /// Registered artifact to include (repeatable)
    #[arg(long = "artifact")]
    artifacts: Vec<ArtifactId>,
    /// Project file to include, relative to the root (repeatable)
    #[arg(long = "file")]
    files: Vec<PathBuf>,
    /// File the pass is about; read and included automatically
    #[arg(long)]
    target: Option<PathBuf>,
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn context(ws: &Workspace, kind: ArtifactKind, args: &ContextArgs) -> Result<CompilerContext> {
    let mut context = ws.builder().context_for(kind, &args.artifacts)?;
    let root = &ws.config().project_root;
    for file in args.files.iter().chain(args.target.as_ref()) {
        let full = root.join(file);
        let content = std::fs::read_to_string(&full).with_context(|| format!("reading {}", full.display()))?;
        context.insert_file(file.to_string_lossy(), content);
    }
    if let Some(target) = &args.target {
        context = context.with_target_file(target.to_string_lossy());
    }
    Ok(context)
}

pub(crate) fn list(ws: &Workspace, kind: Option<ArtifactKind>, status: Option<ArtifactStatus>) -> Result<ExitCode> {
    let entries = ws.lifecycle().list();
    for entry in entries
        .iter()
        .filter(|e| kind.map_or(true, |k| e.artifact_type == k))
        .filter(|e| status.map_or(true, |s| e.status == s))
    {
        println!(
            "{}  {:<18} {:<8} {}",
            entry.id,
            entry.artifact_type,
            entry.status,
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn show(ws: &Workspace, id: ArtifactId) -> Result<ExitCode> {
    print_json(&ws.lifecycle().get(id)?)?;
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn create(ws: &Workspace, kind: ArtifactKind, payload: &Path, depends_on: Vec<ArtifactId>) -> Result<ExitCode> {
    let envelope = ws
        .lifecycle()
        .create_draft(kind, read_json(payload)?, depends_on, CreatedBy::Human)?;
    println!("{}", envelope.id());
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn modify(ws: &Workspace, id: ArtifactId, payload: &Path) -> Result<ExitCode> {
    let envelope = ws.lifecycle().modify(id, read_json(payload)?)?;
    println!("{} {}", envelope.id(), envelope.payload().content_hash().short());
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn discard(ws: &Workspace, id: ArtifactId) -> Result<ExitCode> {
    ws.lifecycle().discard(id)?;
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn approve(ws: &Workspace, id: ArtifactId, approver: &str) -> Result<ExitCode> {
    let envelope = ws.lifecycle().approve(id, approver)?;
    println!("{} {}", envelope.id(), envelope.status());
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn lock(ws: &Workspace, id: ArtifactId, approver: &str) -> Result<ExitCode> {
    let (_, manifest) = ws.lifecycle().lock(id, approver)?;
    print_json(&manifest)?;
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn verify(ws: &Workspace, id: Option<ArtifactId>) -> Result<ExitCode> {
    let lifecycle = ws.lifecycle();
    let plans: Vec<ArtifactId> = match id {
        Some(id) => vec![id],
        None => lifecycle
            .registry()
            .list_by_status(ArtifactStatus::Locked)
            .into_iter()
            .map(|e| e.id)
            .collect(),
    };

    let mut intact = true;
    for plan in plans {
        let report = lifecycle.verify(plan)?;
        if report.is_intact() {
            println!("{plan}: {} files intact", report.checked);
        } else {
            intact = false;
            for drift in &report.drift {
                println!("{plan}: {drift}");
            }
        }
    }

    match lifecycle.audit().verify_chain() {
        Ok(count) => println!("audit chain: {count} entries intact"),
        Err(e) => {
            intact = false;
            println!("audit chain: {e}");
        }
    }
    Ok(if intact { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

pub(crate) async fn build(ws: &Workspace, kind: ArtifactKind, response: &Path, args: &ContextArgs) -> Result<ExitCode> {
    let model = ReplayModel::from_file(response).with_context(|| format!("reading {}", response.display()))?;
    let context = context(ws, kind, args)?;
    match ws.builder().build(&context, &model).await? {
        BuildOutcome::Drafted { envelope, .. } => {
            println!("{} {} {}", envelope.id(), envelope.artifact_type(), envelope.status());
            Ok(ExitCode::SUCCESS)
        }
        BuildOutcome::Rejected { error, .. } => {
            println!("{}: {error}", error.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}

pub(crate) fn prompt(ws: &Workspace, kind: ArtifactKind, args: &ContextArgs) -> Result<ExitCode> {
    let context = context(ws, kind, args)?;
    print!("{}", ws.compiler().pass(kind).prepare(&context)?);
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn check_output(ws: &Workspace, kind: ArtifactKind, response: &Path) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(response).with_context(|| format!("reading {}", response.display()))?;
    match ws.compiler().pipeline().process(kind, &raw) {
        Ok(payload) => {
            print_json(payload.document())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if e.kind() == ErrorKind::Configuration {
                return Err(e.into());
            }
            println!("{}: {e}", e.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artc_core::ArtcConfig;

    #[test]
    fn context_reads_files_and_target_from_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/brief.md"), "# Brief").unwrap();
        let ws = Workspace::open(ArtcConfig::new().with_project_root(dir.path())).unwrap();

        let args = ContextArgs {
            artifacts: Vec::new(),
            files: vec![PathBuf::from("docs/brief.md")],
            target: None,
        };
        let context = context(&ws, ArtifactKind::ProjectPlan, &args).unwrap();
        assert_eq!(context.project_files()["docs/brief.md"], "# Brief");
        assert!(context.target_file().is_none());
    }
}
