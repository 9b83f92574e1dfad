use std::path::Path;

use lotreg_core::Lot;
use serde_json::{json, Value};
use time::OffsetDateTime;

use super::{check_outcome, read_json, receipt_json};
use crate::{print_json, CliError, Context, OutputFormat};

pub(crate) async fn run(ctx: &Context, data: &Path, author: &str) -> Result<(), CliError> {
    let data = read_json(data)?;
    let now = OffsetDateTime::now_utc();

    let id = ctx
        .allocator()
        .allocate(now)
        .await
        .map_err(|e| CliError::new(e.to_string()))?
        .to_string();

    let mut lot = Lot::from_data(id.clone(), &data).map_err(|e| CliError::new(e.to_string()))?;
    let outcome = ctx
        .engine()
        .save(&mut lot, &Value::Object(Default::default()), author, now)
        .await;
    let receipt = check_outcome(outcome)?;

    match ctx.output {
        OutputFormat::Text => println!("{id}"),
        OutputFormat::Json => print_json(&json!({
            "id": id,
            "receipt": receipt.as_ref().map(receipt_json),
        })),
    }
    Ok(())
}
