use crate::workspace;

pub fn handle(resource_type: Option<&str>) -> anyhow::Result<()> {
    let document = workspace::offline_registry()?.schema_document()?;

    let selected = match resource_type {
        None => &document,
        Some(name) => ["resources", "data_sources"]
            .iter()
            .find_map(|kind| document[*kind].get(name))
            .ok_or_else(|| anyhow::anyhow!("unknown resource or data source type '{}'", name))?,
    };
    println!("{}", serde_json::to_string_pretty(selected)?);
    Ok(())
}
