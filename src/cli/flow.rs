//! Visitor flow commands: visit, claim, verify, webhook, open, gate, review

use serde_json::{Map, Value};

use super::Context;
use crate::error::{Error, Result};
use crate::gate::TaskState;
use crate::model::{Completion, CompletionStatus};
use crate::output::{emit_success, HumanOutput};
use crate::verify::{Submission, WebhookPayload};
use crate::visits::ClientMeta;

#[derive(serde::Serialize)]
struct CompletionListOutput {
    visit_id: String,
    total: usize,
    completions: Vec<Completion>,
}

#[derive(serde::Serialize)]
struct OpenOutput {
    visit_id: String,
    task_id: String,
    target: Option<String>,
    waited_secs: u64,
    completion: Option<Completion>,
}

fn completion_summary(human: &mut HumanOutput, row: &Completion) {
    human.push_summary("id", row.id.clone());
    human.push_summary("task", row.task_id.clone());
    human.push_summary("method", row.method.to_string());
    human.push_summary("status", row.status.to_string());
}

pub fn run_visit(
    ctx: &Context,
    link_id: &str,
    ip: String,
    user_agent: Option<String>,
    referer: Option<String>,
) -> Result<()> {
    let app = ctx.open()?;
    let client = ClientMeta::new(ip, user_agent.as_deref(), referer.as_deref());
    let visit = app.record_visit(link_id, &client)?;

    let mut human = HumanOutput::new("linksy visit: recorded");
    human.push_summary("id", visit.id.clone());
    human.push_summary("link", visit.link_id.clone());
    human.push_next_step(format!("linksy gate {}", visit.id));

    emit_success(ctx.output, "visit", &visit, Some(&human))
}

pub fn run_claim(
    ctx: &Context,
    visit_id: String,
    task_id: String,
    proof_url: String,
    note: Option<String>,
) -> Result<()> {
    let app = ctx.open()?;
    let mut submission = Submission::new(visit_id, task_id);
    submission.proof_url = Some(proof_url);
    if let Some(note) = note {
        let mut meta = Map::new();
        meta.insert("note".to_string(), Value::String(note));
        submission.meta = Some(Value::Object(meta));
    }
    let row = app.claim(submission)?;

    let mut human = HumanOutput::new("linksy claim: submitted for review");
    completion_summary(&mut human, &row);
    human.push_next_step(format!("linksy review {} --status success", row.id));

    emit_success(ctx.output, "claim", &row, Some(&human))
}

pub fn run_verify(
    ctx: &Context,
    task_id: &str,
    visit_id: String,
    status: Option<String>,
    method: Option<String>,
) -> Result<()> {
    let app = ctx.open()?;
    let mut submission = Submission::new(visit_id, task_id);
    submission.status = status;
    submission.method = method;
    let row = app.verify(task_id, submission)?;

    let mut human = HumanOutput::new("linksy verify: recorded");
    completion_summary(&mut human, &row);

    emit_success(ctx.output, "verify", &row, Some(&human))
}

pub fn run_webhook(
    ctx: &Context,
    visit_id: String,
    task_id: String,
    status: Option<String>,
) -> Result<()> {
    let status = status
        .as_deref()
        .map(str::parse::<CompletionStatus>)
        .transpose()?;
    let app = ctx.open()?;
    let row = app.webhook(WebhookPayload {
        visit_id,
        task_id,
        status,
        meta: None,
    })?;

    let mut human = HumanOutput::new("linksy webhook: recorded");
    completion_summary(&mut human, &row);

    emit_success(ctx.output, "webhook", &row, Some(&human))
}

pub fn run_open(ctx: &Context, visit_id: &str, task_id: &str) -> Result<()> {
    let app = ctx.open()?;
    let runtime = tokio::runtime::Runtime::new()?;

    let ticket = runtime.block_on(async {
        let (ticket, scheduled) = app.open_task(visit_id, task_id)?;
        if !ctx.output.json && !ctx.output.quiet {
            if let Some(target) = &ticket.target {
                eprintln!("open {target}");
            }
            eprintln!("verifying in {}s...", ticket.verify_after_secs);
        }
        scheduled
            .await
            .map_err(|err| Error::OperationFailed(format!("timed verification aborted: {err}")))?;
        Ok::<_, Error>(ticket)
    })?;
    let completion = app
        .ledger()
        .for_visit(visit_id)?
        .into_iter()
        .rfind(|row| row.task_id == task_id);

    let mut human = HumanOutput::new("linksy open: verified");
    match &completion {
        Some(row) => completion_summary(&mut human, row),
        None => human.push_warning("no completion was recorded; see logs with RUST_LOG=warn"),
    }

    let output = OpenOutput {
        visit_id: visit_id.to_string(),
        task_id: task_id.to_string(),
        target: ticket.target,
        waited_secs: ticket.verify_after_secs,
        completion,
    };
    emit_success(ctx.output, "open", &output, Some(&human))
}

pub fn run_gate(ctx: &Context, visit_id: &str) -> Result<()> {
    let app = ctx.open()?;
    let view = app.gate(visit_id)?;

    let header = if view.unlocked {
        "linksy gate: unlocked"
    } else {
        "linksy gate: locked"
    };
    let mut human = HumanOutput::new(header).titled("Tasks");
    human.push_summary("visit", view.visit_id.clone());
    if let Some(destination) = &view.destination {
        human.push_summary("destination", destination.clone());
    }
    human.push_summary(
        "missing",
        if view.missing.is_empty() {
            "none".to_string()
        } else {
            view.missing.len().to_string()
        },
    );
    for task in &view.tasks {
        let state = match task.state {
            TaskState::None => "todo",
            TaskState::Pending => "pending",
            TaskState::Success => "done",
            TaskState::Failed => "failed",
        };
        let optional = if task.required { "" } else { " (optional)" };
        human.push_detail(format!("{state:<8} {} {}{optional}", task.id, task.label));
    }

    emit_success(ctx.output, "gate", &view, Some(&human))
}

pub fn run_review(
    ctx: &Context,
    completion_id: &str,
    status: &str,
    admin_token: Option<&str>,
) -> Result<()> {
    let status: CompletionStatus = status.parse()?;
    let app = ctx.open()?;
    let row = app.review(completion_id, status, admin_token)?;

    let mut human = HumanOutput::new("linksy review: updated");
    completion_summary(&mut human, &row);

    emit_success(ctx.output, "review", &row, Some(&human))
}

pub fn run_completions(ctx: &Context, visit_id: &str) -> Result<()> {
    let app = ctx.open()?;
    let rows = app.ledger().for_visit(visit_id)?;

    let mut human = HumanOutput::new("linksy completions").titled("Ledger");
    human.push_summary("visit", visit_id);
    human.push_summary("total", rows.len().to_string());
    for row in &rows {
        human.push_detail(format!(
            "#{} {} {} {} {}",
            row.seq,
            row.id,
            row.task_id,
            row.method,
            row.status
        ));
    }

    let output = CompletionListOutput {
        visit_id: visit_id.to_string(),
        total: rows.len(),
        completions: rows,
    };
    emit_success(ctx.output, "completions", &output, Some(&human))
}
