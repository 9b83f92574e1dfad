use lotreg_core::LOT_DOC_TYPE;
use lotreg_engine::listing_view;
use lotreg_storage::{DocumentStore, StorageError};
use serde_json::Value;

use crate::{print_json, CliError, Context};

pub(crate) async fn run(ctx: &Context, id: &str, fields: &[String]) -> Result<(), CliError> {
    let doc = match ctx.store.get(id).await {
        Ok(doc) if doc.get("doc_type").and_then(Value::as_str) == Some(LOT_DOC_TYPE) => doc,
        Ok(_) | Err(StorageError::NotFound { .. }) => {
            return Err(CliError::new(format!("lot '{id}' not found")))
        }
        Err(e) => return Err(CliError::new(e.to_string())),
    };

    let value = doc.to_value();
    if fields.is_empty() {
        print_json(&value);
        return Ok(());
    }

    let data = value.as_object().cloned().unwrap_or_default();
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    print_json(&Value::Object(listing_view(&ctx.registry, &data, &fields)));
    Ok(())
}
