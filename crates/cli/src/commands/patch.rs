use std::path::Path;

use serde_json::json;
use time::OffsetDateTime;

use super::{check_outcome, load_failed, read_json, receipt_json};
use crate::{print_json, CliError, Context, OutputFormat};

pub(crate) async fn run(
    ctx: &Context,
    id: &str,
    data: &Path,
    author: &str,
    keep_modified: bool,
) -> Result<(), CliError> {
    let data = read_json(data)?;
    let engine = ctx.engine();

    let mut lot = engine.load(id).await.map_err(load_failed)?;
    if keep_modified {
        lot.modified = Some(false);
    }

    let outcome = engine
        .patch(&mut lot, &data, author, OffsetDateTime::now_utc(), true)
        .await;
    let receipt = check_outcome(outcome)?;

    match (ctx.output, receipt) {
        (OutputFormat::Text, Some(receipt)) => println!("{} {}", receipt.lot_id, receipt.rev),
        (OutputFormat::Text, None) => println!("{id} unchanged"),
        (OutputFormat::Json, receipt) => print_json(&json!({
            "id": id,
            "receipt": receipt.as_ref().map(receipt_json),
        })),
    }
    Ok(())
}
