//! Terminal rendering of plans, results and diagnostics

use colored::{ColoredString, Colorize};
use ibmform_provider::{
    Action, ActionType, ApplyResult, AttributeChange, Diagnostic, Plan, Registry, UNKNOWN,
};
use serde_json::Value;

const MASKED: &str = "(sensitive value)";

fn symbol(action_type: ActionType) -> ColoredString {
    let symbol = action_type.symbol();
    match action_type {
        ActionType::Create => symbol.green(),
        ActionType::Update => symbol.yellow(),
        ActionType::Replace => symbol.magenta(),
        ActionType::Delete => symbol.red(),
        ActionType::Read => symbol.cyan(),
        ActionType::NoOp => symbol.normal(),
    }
}

fn render(value: Option<&Value>, sensitive: bool) -> String {
    match value {
        None | Some(Value::Null) => "null".dimmed().to_string(),
        Some(_) if sensitive => MASKED.dimmed().to_string(),
        Some(Value::String(s)) if s == UNKNOWN => UNKNOWN.dimmed().to_string(),
        Some(Value::String(s)) => format!("\"{}\"", s),
        Some(other) => other.to_string(),
    }
}

fn print_change(change: &AttributeChange, sensitive: bool, action_type: ActionType) {
    let after = render(change.after.as_ref(), sensitive);
    let line = match action_type {
        ActionType::Create => format!("      {} = {}", change.path, after),
        _ => format!(
            "      {} = {} => {}",
            change.path,
            render(change.before.as_ref(), sensitive),
            after
        ),
    };
    if change.requires_replace {
        println!("{} {}", line, "# forces replacement".red());
    } else {
        println!("{}", line);
    }
}

fn print_action(action: &Action, registry: &Registry) {
    let schema = registry.resource(&action.resource_type).ok().map(|r| r.schema());
    let id = action
        .resource_id
        .as_deref()
        .map(|id| format!(" ({})", id).dimmed().to_string())
        .unwrap_or_default();
    println!(
        "  {} {} will be {}{}",
        symbol(action.action_type),
        action.address.bold(),
        action.action_type,
        id
    );

    for change in &action.changes {
        let sensitive = schema
            .as_ref()
            .and_then(|s| s.get(&change.path))
            .is_some_and(|a| a.sensitive);
        print_change(change, sensitive, action.action_type);
    }
}

/// Print every action that changes something, then the summary
pub fn print_plan(plan: &Plan, registry: &Registry) {
    println!();
    for action in plan.actions.iter().filter(|a| a.action_type != ActionType::NoOp) {
        print_action(action, registry);
    }
    println!();
    if plan.has_changes {
        println!("{} {}", "Plan:".bold(), plan.summary());
    } else {
        println!("{}", "No changes. Infrastructure matches the manifest.".green());
    }
}

/// Print per-address outcomes and a one-line total
pub fn print_apply_result(result: &ApplyResult) {
    println!();
    for ok in &result.succeeded {
        println!("  {} {}: {}", "✓".green(), ok.address.cyan(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.address.cyan(),
            failed.error.as_deref().unwrap_or("failed").red()
        );
    }
    for skipped in &result.skipped {
        println!("  {} {}: {}", "-".yellow(), skipped.cyan(), "skipped".yellow());
    }

    println!();
    let seconds = result.duration_ms as f64 / 1000.0;
    if result.is_success() {
        println!(
            "{}",
            format!("✓ {} action(s) completed in {:.1}s", result.succeeded.len(), seconds)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✗ {} succeeded, {} failed, {} skipped ({:.1}s)",
                result.succeeded.len(),
                result.failed.len(),
                result.skipped.len(),
                seconds
            )
            .red()
            .bold()
        );
    }
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        if d.is_error() {
            eprintln!("  {} {}", "✗".red(), d);
        } else {
            eprintln!("  {} {}", "!".yellow(), d);
        }
    }
}
