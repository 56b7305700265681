use super::{json_pretty, EXIT_SUCCESS};

pub fn run(json: bool) -> Result<u8, String> {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", json_pretty(&serde_json::json!({ "version": version }))?);
    } else {
        println!("Version: {version}");
    }
    Ok(EXIT_SUCCESS)
}
