use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::{print_json, CliError, Context, OutputFormat};

pub(crate) async fn run(ctx: &Context, date: Option<&str>, count: u32) -> Result<(), CliError> {
    let now = match date {
        Some(d) => {
            let day = Date::parse(d, format_description!("[year]-[month]-[day]"))
                .map_err(|e| CliError::new(format!("invalid date '{d}': {e}")))?;
            OffsetDateTime::now_utc().replace_date(day)
        }
        None => OffsetDateTime::now_utc(),
    };

    let allocator = ctx.allocator();
    let mut ids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = allocator
            .allocate(now)
            .await
            .map_err(|e| CliError::new(e.to_string()))?;
        ids.push(id.to_string());
    }

    match ctx.output {
        OutputFormat::Text => {
            for id in &ids {
                println!("{id}");
            }
        }
        OutputFormat::Json => {
            print_json(&Value::Array(ids.into_iter().map(Value::String).collect()));
        }
    }
    Ok(())
}
