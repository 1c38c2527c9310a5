//! linksy task subcommand implementations
//!
//! Provides task management commands: add, edit, rm, kinds

use super::Context;
use crate::catalog::{known_kinds, KindInfo};
use crate::error::Result;
use crate::links::{NewTask, TaskUpdate};
use crate::model::Task;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct RemovedOutput {
    link_id: String,
    task_id: String,
    removed: bool,
}

#[derive(serde::Serialize)]
struct KindsOutput {
    kinds: &'static [KindInfo],
    custom_allowed: bool,
}

fn task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("id", task.id.clone());
    human.push_summary("type", task.kind.display_name());
    human.push_summary("label", task.label.clone());
    if let Some(target) = &task.target {
        human.push_summary("target", target.clone());
    }
    human.push_summary("required", task.required.to_string());
}

pub fn run_add(ctx: &Context, link_id: &str, input: NewTask) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let task = app.add_task(&user, link_id, input)?;

    let mut human = HumanOutput::new("linksy task add: added");
    task_summary(&mut human, &task);
    if task.kind.is_custom() {
        human.push_warning(format!("'{}' is not a built-in task type", task.kind));
    }
    if task.kind.expects_target() && task.target.is_none() {
        human.push_warning("this task type usually has a --target URL");
    }

    emit_success(ctx.output, "task add", &task, Some(&human))
}

pub fn run_edit(ctx: &Context, link_id: &str, task_id: &str, changes: TaskUpdate) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let task = app.update_task(&user, link_id, task_id, changes)?;

    let mut human = HumanOutput::new("linksy task edit: updated");
    task_summary(&mut human, &task);

    emit_success(ctx.output, "task edit", &task, Some(&human))
}

pub fn run_rm(ctx: &Context, link_id: &str, task_id: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    app.remove_task(&user, link_id, task_id)?;

    let mut human = HumanOutput::new("linksy task rm: removed");
    human.push_summary("id", task_id);

    let output = RemovedOutput {
        link_id: link_id.to_string(),
        task_id: task_id.to_string(),
        removed: true,
    };
    emit_success(ctx.output, "task rm", &output, Some(&human))
}

pub fn run_kinds(ctx: &Context) -> Result<()> {
    let kinds = known_kinds();

    let mut human = HumanOutput::new("Task types");
    for info in kinds {
        let target = if info.expects_target { " (target url)" } else { "" };
        human.push_detail(format!("{:<16} {}{target}", info.tag, info.display_name));
    }
    human.push_detail("any other [a-z0-9_] tag is accepted as a custom type");

    let output = KindsOutput {
        kinds,
        custom_allowed: true,
    };
    emit_success(ctx.output, "task kinds", &output, Some(&human))
}
