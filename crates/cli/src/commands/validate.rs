use std::path::Path;
use std::process;

use crate::config::{read_config, validate_config};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_validate(config_path: &Path, output: OutputFormat, quiet: bool) {
    let config = match read_config(config_path) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match validate_config(&config) {
        Ok(()) => {
            if !quiet {
                match output {
                    OutputFormat::Text => println!("valid"),
                    OutputFormat::Json => {
                        let json = serde_json::json!({
                            "valid": true,
                            "variant": config.variant.name,
                            "groups": config.variant.groups.len(),
                        });
                        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
                    }
                }
            }
        }
        Err(errors) => {
            match output {
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("invalid config");
                        for err in &errors {
                            eprintln!("  - {}", err);
                        }
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "valid": false,
                        "errors": errors
                    });
                    eprintln!(
                        "{}",
                        serde_json::to_string_pretty(&json).unwrap_or_default()
                    );
                }
            }
            process::exit(1);
        }
    }
}
