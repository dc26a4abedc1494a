//! Lexical ranking of candidate tables against a question.

use std::collections::HashSet;

use crate::metadata::TableSchema;

const NAME_WEIGHT: usize = 3;

const STOP_WORDS: &[&str] = &[
    "all", "and", "are", "does", "for", "from", "had", "has", "have", "how", "many", "much",
    "per", "that", "the", "their", "there", "these", "this", "was", "were", "what", "when",
    "where", "which", "who", "with",
];

/// Normalizes a word: lowercase, trailing plural `s` dropped.
fn normalize(word: &str) -> Option<String> {
    let mut word = word.to_lowercase();
    if word.len() < 3 || STOP_WORDS.contains(&word.as_str()) {
        return None;
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word.pop();
    }
    Some(word)
}

fn question_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter_map(normalize)
        .collect()
}

/// Splits `LineListTransHTS` / `Linelist_FACTART` into their words.
fn split_identifier(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                parts.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn name_tokens(table_name: &str) -> HashSet<String> {
    let mut tokens: HashSet<String> = split_identifier(table_name)
        .iter()
        .filter_map(|part| normalize(part))
        .collect();
    if let Some(whole) = normalize(table_name) {
        tokens.insert(whole);
    }
    tokens
}

fn context_tokens(context: &str) -> HashSet<String> {
    context
        .split(|c: char| !c.is_alphanumeric())
        .flat_map(split_identifier)
        .filter_map(|part| normalize(&part))
        .collect()
}

pub fn score(question: &str, table: &TableSchema) -> usize {
    let wanted = question_tokens(question);
    let names = name_tokens(&table.table_name);
    let context = context_tokens(&table.context_str);

    wanted
        .iter()
        .map(|token| {
            let mut points = 0;
            if names.contains(token) {
                points += NAME_WEIGHT;
            }
            if context.contains(token) {
                points += 1;
            }
            points
        })
        .sum()
}

/// The `top_k` most relevant tables, best first. Ties keep the given order.
pub fn select_tables(question: &str, tables: &[TableSchema], top_k: usize) -> Vec<TableSchema> {
    let mut scored: Vec<(usize, &TableSchema)> =
        tables.iter().map(|t| (score(question, t), t)).collect();
    // stable sort keeps configuration order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, table)| table.clone())
        .collect()
}
