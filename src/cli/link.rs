//! linksy link and analytics commands

use super::Context;
use crate::error::Result;
use crate::links::{LinkUpdate, NewLink};
use crate::model::Link;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct LinkListOutput {
    total: usize,
    quota: usize,
    links: Vec<Link>,
}

#[derive(serde::Serialize)]
struct DeletedOutput {
    id: String,
    deleted: bool,
}

pub fn run_create(ctx: &Context, input: NewLink) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let link = app.create_link(&user, input)?;

    let mut human = HumanOutput::new("linksy link create: created");
    human.push_summary("id", link.id.clone());
    human.push_summary("slug", link.slug.clone());
    human.push_summary("destination", link.destination.clone());
    human.push_next_step(format!(
        "linksy task add {} --type join_telegram --label \"Join\" --target <url>",
        link.id
    ));

    emit_success(ctx.output, "link create", &link, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let links = app.list_links(&user)?;
    let quota = app.links().quota();

    let mut human = HumanOutput::new("linksy link list").titled("Links");
    human.push_summary("owned", format!("{} of {}", links.len(), quota));
    for link in &links {
        let title = link.title.as_deref().unwrap_or("-");
        human.push_detail(format!("{} {} {} ({})", link.id, link.slug, title, link.destination));
    }

    let output = LinkListOutput {
        total: links.len(),
        quota,
        links,
    };
    emit_success(ctx.output, "link list", &output, Some(&human))
}

pub fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let details = app.get_link(&user, id)?;

    let mut human = HumanOutput::new(format!("linksy link show: {}", details.link.slug)).titled("Tasks");
    human.push_summary("id", details.link.id.clone());
    human.push_summary("destination", details.link.destination.clone());
    if let Some(title) = &details.link.title {
        human.push_summary("title", title.clone());
    }
    if let Some(color) = &details.link.brand_color {
        human.push_summary("brand color", color.clone());
    }
    human.push_summary("created", details.link.created_at.to_rfc3339());
    for task in &details.tasks {
        let marker = if task.required { "required" } else { "optional" };
        human.push_detail(format!(
            "{} [{}] {} ({marker})",
            task.id,
            task.kind,
            task.label
        ));
    }

    emit_success(ctx.output, "link show", &details, Some(&human))
}

pub fn run_update(ctx: &Context, id: &str, changes: LinkUpdate) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let link = app.update_link(&user, id, changes)?;

    let mut human = HumanOutput::new("linksy link update: updated");
    human.push_summary("id", link.id.clone());
    human.push_summary("destination", link.destination.clone());
    human.push_summary("updated", link.updated_at.to_rfc3339());

    emit_success(ctx.output, "link update", &link, Some(&human))
}

pub fn run_delete(ctx: &Context, id: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    app.delete_link(&user, id)?;

    let mut human = HumanOutput::new("linksy link delete: deleted");
    human.push_summary("id", id);
    human.push_warning("the slug stays reserved");

    let output = DeletedOutput {
        id: id.to_string(),
        deleted: true,
    };
    emit_success(ctx.output, "link delete", &output, Some(&human))
}

pub fn run_analytics(ctx: &Context, link_id: &str) -> Result<()> {
    let user = ctx.require_user()?;
    let app = ctx.open()?;
    let response = app.analytics(&user, link_id)?;
    let report = &response.report;

    let mut human = HumanOutput::new("Analytics");
    human.push_summary("visits", report.total_visits.to_string());
    human.push_summary("completions", report.total_completions.to_string());
    human.push_summary("conversion", format!("{:.2}%", report.conversion_rate));
    for day in &report.chart_data {
        human.push_detail(format!("{} {}", day.date, day.visits));
    }

    emit_success(ctx.output, "analytics", &response, Some(&human))
}
