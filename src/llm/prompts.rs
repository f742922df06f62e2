use crate::language::Language;
use crate::tools::ToolName;

/// Instruction prompt for the tool-selection call.
///
/// `tool_listing` is the registry's "- name: description" block.  The model
/// must answer with exactly one wire name or `none`.
pub fn classifier_prompt(tool_listing: &str) -> String {
    let names: Vec<&str> = ToolName::ALL.iter().map(|t| t.as_str()).collect();
    format!(
        r#"You are a tool selector. Pick the single most suitable tool for the user's request.

AVAILABLE TOOLS:
{tool_listing}
RULES:
- Use {sports} for "maç" / "match" ONLY when it is about football.
- "Maçka", "maçkolik" and other names that merely contain "maç" are NOT football.
- Current information, prices, news -> {web}
- Definition of a person or concept -> {wiki}
- Temperature, forecast, weather -> {weather}
- Arithmetic -> {calc}
- A "temperature" setting of a language model is not weather.
- If you are not sure -> none

Reply with one word only: {names}, or none."#,
        sports = ToolName::SportsOdds,
        web = ToolName::WebSearch,
        wiki = ToolName::Wikipedia,
        weather = ToolName::Weather,
        calc = ToolName::Calculator,
        names = names.join(", "),
    )
}

/// System prompt for the final answer.
///
/// When `tool_data` is present it is embedded pretty-printed, with the
/// instruction to interpret it rather than show it.
pub fn compose_prompt(
    assistant_name: &str,
    language: Language,
    tool_data: Option<&serde_json::Value>,
) -> String {
    let mut prompt = format!(
        "You are {assistant_name}, a helpful assistant. Reply in {}.\n",
        language.name()
    );

    if let Some(data) = tool_data {
        let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
        prompt.push_str(&format!(
            "\nExplain the tool result below to the user in natural language. \
             Do not show the raw data; interpret it and make it easy to understand.\n\n\
             Tool result:\n{pretty}\n"
        ));
    }

    prompt.push_str(
        "\nRULES:\n\
         - Be brief and to the point\n\
         - Talk naturally\n\
         - Never paste JSON or field names\n\
         - Skip unnecessary detail\n",
    );
    prompt
}
