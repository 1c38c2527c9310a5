//! linksy slug helpers

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::slug;

#[derive(serde::Serialize)]
struct CheckOutput {
    slug: String,
    valid: bool,
    available: bool,
}

#[derive(serde::Serialize)]
struct GenerateOutput {
    input: String,
    slug: String,
}

pub fn run_check(ctx: &Context, candidate: &str) -> Result<()> {
    let valid = slug::is_valid_slug(candidate);
    let available = if valid {
        ctx.open()?.links().slug_available(candidate)?
    } else {
        false
    };

    let header = match (valid, available) {
        (false, _) => "linksy slug check: invalid",
        (true, false) => "linksy slug check: taken",
        (true, true) => "linksy slug check: available",
    };
    let mut human = HumanOutput::new(header).titled("Problems");
    human.push_summary("slug", candidate);
    if !valid {
        if let Err(err) = slug::validate_slug(candidate) {
            human.push_detail(err.to_string());
        }
        human.push_next_step(format!("linksy slug generate \"{candidate}\""));
    }

    let output = CheckOutput {
        slug: candidate.to_string(),
        valid,
        available,
    };
    emit_success(ctx.output, "slug check", &output, Some(&human))
}

pub fn run_generate(ctx: &Context, text: &str) -> Result<()> {
    let generated = slug::generate_slug(text)?;

    let mut human = HumanOutput::new(generated.clone());
    human.push_summary("from", text);

    let output = GenerateOutput {
        input: text.to_string(),
        slug: generated,
    };
    emit_success(ctx.output, "slug generate", &output, Some(&human))
}
