use minijinja::{context, Environment};
use regex::Regex;
use std::sync::LazyLock;

use super::models::SqlGenerationInput;
use super::LlmError;

const SQL_PROMPT: &str = r#"Please calculate proportion when asked to, generate a sql query that contains both the numbers and the proportion. Only output the sql query, do not attempt to generate an answer.
{% if example_prompt %}
You can refer to the following examples and instructions on how to generate a SQL statement:
{{ example_prompt }}
{% endif %}
Write a SQL query to answer the following question: {{ question }}
Use the table {{ primary.table_name }}. {{ primary.context_str }}
Please take note of the column names which are in quotes and their description.
{% if join_with %}
Do not use the two tables if you are not merging, be careful to differentiate which column names are in which table.
If the question requires joining or merging, join with the table {{ join_with.table_name }} to retrieve the required variables. {{ join_with.context_str }}
{% endif %}
Return only the query, in a ```sql code block.
"#;

pub fn render_prompt(input: &SqlGenerationInput) -> Result<String, LlmError> {
    let mut env = Environment::new();
    env.add_template("sql_prompt.txt", SQL_PROMPT)
        .map_err(|e| LlmError::ConfigError(format!("invalid prompt template: {}", e)))?;

    let template = env
        .get_template("sql_prompt.txt")
        .map_err(|e| LlmError::ConfigError(e.to_string()))?;

    template
        .render(context! {
            question => &input.question,
            example_prompt => input.example_prompt.as_deref().filter(|p| !p.trim().is_empty()),
            primary => &input.primary,
            join_with => &input.join_with,
        })
        .map_err(|e| LlmError::ConfigError(format!("failed to render prompt: {}", e)))
}

/// Pulls the SQL statement out of a model reply.
pub fn extract_sql(content: &str) -> Result<String, LlmError> {
    let sql = fenced_block(content)
        .or_else(|| after_sql_query_marker(content))
        .or_else(|| from_first_sql_line(content))
        .unwrap_or(content);

    let sql = sql.replace('`', "").trim().to_string();
    if sql.is_empty() {
        return Err(LlmError::ResponseError("model returned no SQL".to_string()));
    }
    Ok(sql)
}

fn fenced_block(content: &str) -> Option<&str> {
    if let Some(start) = content.find("```sql") {
        let body = &content[start + 6..];
        return Some(body.find("```").map_or(body, |end| &body[..end]));
    }

    let start = content.find("```")?;
    let body = &content[start + 3..];
    let end = body.find("```")?;
    Some(&body[..end])
}

// Replies in the "Question: ... SQLQuery: ..." format.
static SQL_QUERY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)SQLQuery:\s*(.+?)(?:\n\s*(?:SQLResult|Answer):|\z)")
        .expect("Invalid SQLQuery marker regex")
});

fn after_sql_query_marker(content: &str) -> Option<&str> {
    SQL_QUERY_MARKER
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

fn from_first_sql_line(content: &str) -> Option<&str> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start().to_uppercase();
        if trimmed.starts_with("SELECT") || trimmed.starts_with("WITH") {
            return Some(&content[offset..]);
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TableSchema;

    fn input(join: bool) -> SqlGenerationInput {
        SqlGenerationInput {
            question: "How many clients are on PrEP per county?".to_string(),
            example_prompt: Some("Join ON \"PatientPKHASH\" AND \"MFLCode\".".to_string()),
            primary: TableSchema::new("LinelistPrep", "PrEP line list", "\"County\": County"),
            join_with: join.then(|| TableSchema::new("LinelistPrepAssessments", "PrEP screening", "")),
        }
    }

    #[test]
    fn single_table_prompt_mentions_only_the_primary_table() {
        let prompt = render_prompt(&input(false)).unwrap();
        assert!(prompt.contains("How many clients are on PrEP per county?"));
        assert!(prompt.contains("Use the table LinelistPrep."));
        assert!(prompt.contains("description of the table: PrEP line list"));
        assert!(prompt.contains("Join ON \"PatientPKHASH\" AND \"MFLCode\"."));
        assert!(!prompt.contains("LinelistPrepAssessments"));
    }

    #[test]
    fn join_prompt_offers_the_second_table() {
        let prompt = render_prompt(&input(true)).unwrap();
        assert!(prompt.contains("join with the table LinelistPrepAssessments"));
        assert!(prompt.contains("Do not use the two tables if you are not merging"));
    }

    #[test]
    fn blank_examples_are_left_out() {
        let mut without_examples = input(false);
        without_examples.example_prompt = Some("  ".to_string());
        let prompt = render_prompt(&without_examples).unwrap();
        assert!(!prompt.contains("You can refer to"));
    }

    #[test]
    fn extracts_sql_code_blocks() {
        let reply = "Here you go:\n```sql\nSELECT County, COUNT(*) FROM LinelistPrep GROUP BY County;\n```\nThanks";
        assert_eq!(
            extract_sql(reply).unwrap(),
            "SELECT County, COUNT(*) FROM LinelistPrep GROUP BY County;"
        );
    }

    #[test]
    fn extracts_plain_code_blocks() {
        let reply = "```\nSELECT 1\n```";
        assert_eq!(extract_sql(reply).unwrap(), "SELECT 1");
    }

    #[test]
    fn extracts_after_sql_query_marker() {
        let reply = "Question: how many?\nSQLQuery: SELECT COUNT(*) FROM LinelistHEI\nSQLResult: 12";
        assert_eq!(extract_sql(reply).unwrap(), "SELECT COUNT(*) FROM LinelistHEI");
    }

    #[test]
    fn marker_extraction_is_repeatable_across_replies() {
        for table in ["LinelistHEI", "LineListPBFW"] {
            let reply = format!("SQLQuery: SELECT *\nFROM {}\nAnswer: none", table);
            assert_eq!(extract_sql(&reply).unwrap(), format!("SELECT *\nFROM {}", table));
        }
    }

    #[test]
    fn extracts_from_first_select_line() {
        let reply = "Sure.\nselect County\nfrom LinelistHEI";
        assert_eq!(extract_sql(reply).unwrap(), "select County\nfrom LinelistHEI");
    }

    #[test]
    fn empty_replies_are_errors() {
        assert!(extract_sql("```sql\n```").is_err());
        assert!(extract_sql("   ").is_err());
    }
}
