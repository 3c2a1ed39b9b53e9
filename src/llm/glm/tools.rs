//! Canonical function declarations and tool config -> GLM tools and tool_choice

use serde_json::json;

use super::wire::{ChatTool, ChatToolChoice, FunctionDefinition, ToolChoiceMode};
use crate::llm::types::{FunctionCallingMode, FunctionDeclaration, Tool, ToolConfig};

/// Convert one declaration to a vendor function tool
///
/// Parameter schema precedence: `parameters_json_schema`, then legacy
/// `parameters`, then an empty object.
pub fn convert_declaration(decl: &FunctionDeclaration) -> ChatTool {
    let parameters = decl
        .parameters_json_schema
        .clone()
        .or_else(|| decl.parameters.clone())
        .unwrap_or_else(|| json!({}));

    ChatTool::Function {
        function: FunctionDefinition {
            name: decl.name.clone(),
            description: decl.description.clone(),
            parameters,
        },
    }
}

/// Names allowed by the tool config, if an allow-list was supplied
pub fn allowed_function_names(tool_config: Option<&ToolConfig>) -> Option<&[String]> {
    tool_config
        .and_then(|c| c.function_calling_config.as_ref())
        .and_then(|c| c.allowed_function_names.as_deref())
        .filter(|names| !names.is_empty())
}

/// Apply the allow-list; tools left without declarations are dropped
pub fn filter_tools(tools: &[Tool], allowed: Option<&[String]>) -> Vec<Tool> {
    tools
        .iter()
        .filter_map(|tool| {
            let declarations: Vec<FunctionDeclaration> = tool
                .function_declarations
                .iter()
                .filter(|d| allowed.map_or(true, |names| names.iter().any(|n| n == &d.name)))
                .cloned()
                .collect();

            if declarations.is_empty() {
                None
            } else {
                Some(Tool {
                    function_declarations: declarations,
                })
            }
        })
        .collect()
}

/// Convert canonical tools to the vendor tool list; `None` when nothing remains
pub fn convert_tools(tools: &[Tool], tool_config: Option<&ToolConfig>) -> Option<Vec<ChatTool>> {
    let allowed = allowed_function_names(tool_config);
    let converted: Vec<ChatTool> = filter_tools(tools, allowed)
        .iter()
        .flat_map(|tool| tool.function_declarations.iter().map(convert_declaration))
        .collect();

    if converted.is_empty() {
        None
    } else {
        Some(converted)
    }
}

/// Convert the function-calling mode to `tool_choice`
///
/// `AUTO` (or no mode) leaves the field out so the vendor default applies.
pub fn convert_tool_choice(tool_config: Option<&ToolConfig>) -> Option<ChatToolChoice> {
    let calling = tool_config.and_then(|c| c.function_calling_config.as_ref())?;

    match calling.mode {
        None | Some(FunctionCallingMode::Auto) => None,
        Some(FunctionCallingMode::None) => Some(ChatToolChoice::Mode(ToolChoiceMode::None)),
        Some(FunctionCallingMode::Any) | Some(FunctionCallingMode::Validated) => {
            match calling.allowed_function_names.as_deref() {
                Some([only]) => Some(ChatToolChoice::function(only.clone())),
                _ => Some(ChatToolChoice::Mode(ToolChoiceMode::Required)),
            }
        }
    }
}
