// src/cli/categories.rs

use crate::cli::classify::index_for;
use crate::cli::Format;
use anyhow::Result;
use libfilesort::Config;
use serde_json::json;

pub fn run(cfg: &Config, format: Format) -> Result<()> {
    let (table, index) = index_for(cfg)?;
    match format {
        Format::Text => {
            for (name, exts) in table.iter() {
                let list: Vec<&str> = exts.iter().map(String::as_str).collect();
                println!("{name}: {}", list.join(" "));
            }
            println!("{}: (everything else)", index.catch_all());
        }
        Format::Json => {
            let categories: serde_json::Map<String, serde_json::Value> = table
                .iter()
                .map(|(name, exts)| (name.to_string(), json!(exts)))
                .collect();
            let doc = json!({
                "categories": categories,
                "catch_all_category": index.catch_all(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
