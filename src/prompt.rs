//! System prompt templating helpers.
//!
//! The full built-in prompt text lives in one template file and is rendered
//! from a single code path with runtime parameters (tools, working directory
//! and optional operator instructions).

use std::collections::BTreeMap;

use crate::tools::{BuiltinSpec, BUILTIN_TOOLS};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("templates/system_prompt.template");

const TOOL_CALL_EXAMPLE: &str = "<tool_call>
<tool_name>Read</tool_name>
<parameters>
<file_path>src/main.rs</file_path>
</parameters>
<tool_name>Grep</tool_name>
<parameters>
<pattern>fn main</pattern>
<path>src</path>
</parameters>
</tool_call>";

/// Parameters used to compile the system prompt template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemPromptParams<'a> {
    pub working_directory: &'a str,
    /// `(server.tool, description)` pairs discovered at startup.
    pub auxiliary_tools: &'a [(String, String)],
    pub custom_instructions: Option<&'a str>,
}

/// Render the single system prompt template using runtime parameters.
pub fn render_system_prompt(params: SystemPromptParams<'_>) -> String {
    let mut vars = BTreeMap::<&str, String>::new();
    vars.insert("WORKING_DIRECTORY", params.working_directory.to_string());
    vars.insert("TOOL_CALL_EXAMPLE", TOOL_CALL_EXAMPLE.to_string());
    vars.insert("BUILTIN_TOOLS_LIST", render_builtin_tools(BUILTIN_TOOLS));
    vars.insert(
        "AUXILIARY_TOOLS_BLOCK",
        render_auxiliary_tools(params.auxiliary_tools),
    );
    vars.insert(
        "CUSTOM_INSTRUCTIONS_BLOCK",
        render_custom_instructions(params.custom_instructions),
    );

    normalize_blank_lines(&render_template(SYSTEM_PROMPT_TEMPLATE, &vars))
}

fn render_template(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{key}}}}}");
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

/// One line per built-in tool: name, parameters, summary.
pub fn render_builtin_tools(tools: &[BuiltinSpec]) -> String {
    tools
        .iter()
        .map(|spec| {
            let mut params: Vec<String> = spec.required.iter().map(|p| format!("`{p}`")).collect();
            params.extend(spec.optional.iter().map(|p| format!("`{p}` (optional)")));
            format!(
                "- `{}` ({}): {}",
                spec.display_name,
                params.join(", "),
                spec.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_auxiliary_tools(tools: &[(String, String)]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let lines = tools
        .iter()
        .map(|(name, description)| {
            if description.trim().is_empty() {
                format!("- `{name}`")
            } else {
                format!("- `{name}`: {}", description.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "External tools (call them by their full `server.tool` name; pass each argument as a \
         parameter, JSON values are accepted):\n{lines}"
    )
}

fn render_custom_instructions(custom: Option<&str>) -> String {
    let Some(custom) = custom.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    format!("Additional operator instructions:\n{custom}")
}

fn normalize_blank_lines(text: &str) -> String {
    let mut out = String::new();
    let mut previous_blank = false;

    for line in text.lines() {
        let is_blank = line.trim().is_empty();
        if is_blank && previous_blank {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.trim_end());
        previous_blank = is_blank;
    }

    out.trim().to_string()
}
