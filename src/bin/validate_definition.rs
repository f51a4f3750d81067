//! Validate a test definition file the way the editor does before saving.
//!
//! Usage: validate_definition <definition.json> [test-name]
//!
//! Prints one line per field error and per allocation warning, followed by
//! the serialized definition when everything validates. Exits 1 on errors.

use anyhow::{Context, Result};
use proctor_console::editor::DefinitionEditor;
use proctor_console::logging::{log, obj, v_str, Domain, Level};
use proctor_console::model::TestDefinition;
use std::fs;

fn run(path: &str, test_name: &str) -> Result<bool> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let definition: TestDefinition =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path))?;
    log(
        Level::Info,
        Domain::System,
        "validate_start",
        obj(&[("path", v_str(path)), ("test_name", v_str(test_name))]),
    );

    let editor = DefinitionEditor::new(test_name, definition, "", false);

    for alloc in editor.allocations().editors() {
        let bar = alloc.build_allocation_bar();
        let segments: Vec<_> = bar.segments.iter().map(|s| s.label.as_str()).collect();
        println!("allocation {}: {}", alloc.index(), segments.join(" | "));
        for w in &bar.warnings {
            println!("  warning: {}", w);
        }
    }

    match editor.validate() {
        Ok(()) => {
            let def = editor.to_definition()?;
            println!("{}", serde_json::to_string_pretty(&def)?);
            Ok(true)
        }
        Err(errors) => {
            for e in &errors {
                println!("error: {}: {}", e.field, e.msg);
            }
            Ok(false)
        }
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: validate_definition <definition.json> [test-name]");
        std::process::exit(2);
    };
    let test_name = args.next().unwrap_or_default();

    match run(&path, &test_name) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("validate_definition: {:#}", err);
            std::process::exit(2);
        }
    }
}
