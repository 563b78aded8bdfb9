//! Usage Rendering
//!
//! Text shown for `fef <command> -h` and for the global help listing.

use feflow_core::{CommandRegistry, CommandSource, CommandUsage, OptionSpec};

/// Binary name used in `Usage` lines.
pub const BIN_NAME: &str = "fef";

const SOURCE_SECTIONS: [(CommandSource, &str); 4] = [
    (CommandSource::Native, "Commands"),
    (CommandSource::Universal, "Universal commands"),
    (CommandSource::Plugin, "Plugin commands"),
    (CommandSource::Devkit, "Devkit commands"),
];

fn option_flags(option: &OptionSpec) -> String {
    let mut flags = match &option.alias {
        Some(alias) => format!("-{}, --{}", alias, option.name),
        None => format!("    --{}", option.name),
    };
    if let Some(type_label) = &option.type_label {
        flags.push_str(&format!(" <{}>", type_label));
    }
    flags
}

/// Two aligned columns, indented by two spaces.
fn render_table(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, right)| {
            if right.is_empty() {
                format!("  {}", left)
            } else {
                format!("  {:<width$}  {}", left, right, width = width)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Usage of a single command: header, description, `Usage` line and the
/// option table.
pub fn render_command_usage(name: &str, usage: &CommandUsage) -> String {
    let mut out = format!("{} {}\n", BIN_NAME, name);
    if !usage.description.is_empty() {
        out.push_str(&format!("\n  {}\n", usage.description));
    }
    out.push_str(&format!("\nUsage\n\n  $ {} {} [options]\n", BIN_NAME, name));

    if usage.has_options() {
        let rows: Vec<(String, String)> = usage
            .options
            .iter()
            .map(|option| {
                let mut description = option.description.clone();
                if let Some(default) = &option.default_value {
                    description.push_str(&format!(" (default: {})", default));
                }
                (option_flags(option), description.trim().to_string())
            })
            .collect();
        out.push_str(&format!("\nOptions\n\n{}\n", render_table(&rows)));
    }

    out.trim_end().to_string()
}

/// Every registered command, grouped by source.
pub fn render_global_help(registry: &CommandRegistry, version: &str) -> String {
    let mut out = format!(
        "{} {}\n\nUsage\n\n  $ {} <command> [options]\n",
        BIN_NAME, version, BIN_NAME
    );

    for (source, title) in SOURCE_SECTIONS {
        let mut commands = registry.by_source(source);
        if commands.is_empty() {
            continue;
        }
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        let rows: Vec<(String, String)> = commands
            .iter()
            .map(|cmd| (cmd.name().to_string(), cmd.description().to_string()))
            .collect();
        out.push_str(&format!("\n{}\n\n{}\n", title, render_table(&rows)));
    }

    out.push_str(&format!(
        "\nGlobal options\n\n{}\n",
        render_table(&[
            ("--debug".to_string(), "Print debug logs".to_string()),
            ("--silent".to_string(), "Only print errors".to_string()),
            ("--disable-check".to_string(), "Skip the update check".to_string()),
            ("--auto-update".to_string(), "Update without asking".to_string()),
            ("-h, --help".to_string(), "Show usage of a command".to_string()),
        ])
    ));
    out.trim_end().to_string()
}
