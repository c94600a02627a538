//! Option table rendering for the `options` command.

use crate::config::{ConfigOption, OptionGroups};
use crate::error::{Error, Result};
use std::fmt::Write;

/// Render option groups as a text table, optionally only `group`.
pub fn render_options(groups: &OptionGroups, group: Option<&str>) -> Result<String> {
    if let Some(group) = group
        && !groups.contains_key(group)
    {
        return Err(Error::UnknownGroup {
            group: group.to_string(),
            available: groups.keys().cloned().collect(),
        });
    }

    let key_width = groups
        .values()
        .flat_map(|options| options.keys())
        .map(String::len)
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (name, options) in groups {
        if group.is_some_and(|g| g != name) {
            continue;
        }
        let _ = writeln!(out, "[{name}]");
        for (key, option) in options {
            let _ = writeln!(out, "  {key:<key_width$}  {}", describe(option));
            if !option.help.is_empty() {
                let _ = writeln!(out, "  {:<key_width$}  {}", "", option.help);
            }
        }
        out.push('\n');
    }
    Ok(out)
}

fn describe(option: &ConfigOption) -> String {
    let mut line = format!("{} = {}", option.option_type, option.value);
    if option.nullable {
        line.push_str(" (nullable)");
    }
    if let Some(choices) = &option.choices {
        let listed: Vec<String> = choices.iter().map(ToString::to_string).collect();
        let _ = write!(line, " [choices: {}]", listed.join(", "));
    }
    line
}
