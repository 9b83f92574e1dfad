use lotreg_core::{ChangeOp, Op};

use super::load_failed;
use crate::{print_json, CliError, Context, OutputFormat};

pub(crate) async fn run(ctx: &Context, id: &str) -> Result<(), CliError> {
    let lot = ctx.engine().load(id).await.map_err(load_failed)?;

    match ctx.output {
        OutputFormat::Json => {
            let value = serde_json::to_value(&lot.revisions)
                .map_err(|e| CliError::new(format!("serialization error: {e}")))?;
            print_json(&value);
        }
        OutputFormat::Text => {
            for (n, entry) in lot.revisions.iter().enumerate() {
                println!(
                    "#{} by {} (from {})",
                    n + 1,
                    entry.author,
                    entry.rev.as_deref().unwrap_or("new")
                );
                for change in &entry.changes {
                    println!("  {}", render_change(change));
                }
            }
        }
    }
    Ok(())
}

fn render_change(change: &ChangeOp) -> String {
    let op = match change.op {
        Op::Add => "add",
        Op::Remove => "remove",
        Op::Replace => "replace",
    };
    match &change.value {
        Some(value) => format!("{op} {} = {value}", change.path),
        None => format!("{op} {}", change.path),
    }
}
