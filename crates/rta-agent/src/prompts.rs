//! Prompt builders.
//!
//! Each collaborator operation is one system message carrying the policy
//! and one user message carrying the request.  Builders are pure so that
//! prompt content can be asserted without a model.

use rta_kernel::{CANNOT_ANSWER, Source};

use crate::llm::Message;

// ---------------------------------------------------------------------------
// Query generation
// ---------------------------------------------------------------------------

/// Convert a question into SQL over one source's table.
pub fn query_generation(question: &str, source: Source, schema: &[&str]) -> Vec<Message> {
    let system = format!(
        "You convert questions into a single PostgreSQL SELECT query.\n\
         Table: {table} ({columns})\n\
         The `utc` column holds the event timestamp.\n\
         Respond only with SQL. If the question cannot be answered from this table, \
         respond with exactly {CANNOT_ANSWER}.",
        table = source.table(),
        columns = schema.join(", "),
    );
    vec![Message::system(system), Message::user(format!("Question: {question}"))]
}

// ---------------------------------------------------------------------------
// Summarization
// ---------------------------------------------------------------------------

/// Words that mark a question as being about air quality.
const AIR_QUALITY_MARKERS: &[&str] = &["air quality", "aqi", "pollution", "air index"];

/// Whether the composite air-quality policy applies to `question`.
pub fn is_air_quality_question(question: &str) -> bool {
    let lowered = question.to_lowercase();
    AIR_QUALITY_MARKERS.iter().any(|m| lowered.contains(m))
}

const AIR_QUALITY_POLICY: &str = "\
For this air-quality question do not recite raw rows. Compute a composite index:\n\
1. Normalize four sub-measurements to 0..1 by dividing by their reference limits \
and capping at 1: pm2_5 / 35, pm1 / 25, tvoc / 500, eco2 / 1000.\n\
2. Average the four normalized values and multiply by 100.\n\
3. Classify the index: below 34 is good, 34 to 66 is moderate, above 66 is unhealthy.\n\
Report the index, its class, and the sub-measurement that contributes most.";

/// Summarize serialized query rows as an answer to `question`.
pub fn summarization(question: &str, result: &str) -> Vec<Message> {
    let mut system = String::from(
        "You explain database query results to a user. \
         Summarize the result in a clear and concise way, \
         answering the question directly.",
    );
    if is_air_quality_question(question) {
        system.push_str("\n\n");
        system.push_str(AIR_QUALITY_POLICY);
    }
    vec![
        Message::system(system),
        Message::user(format!("The user asked: \"{question}\"\nSQL Result: {result}")),
    ]
}

// ---------------------------------------------------------------------------
// Fallback and conversation
// ---------------------------------------------------------------------------

/// Answer from general knowledge.
pub fn fallback(question: &str) -> Vec<Message> {
    vec![
        Message::system(
            "Answer the user's question clearly and directly using your general knowledge. \
             Do not say you don't have access to real-time data. \
             Provide the best possible answer.",
        ),
        Message::user(question),
    ]
}

/// Reply to small talk.
pub fn conversation(message: &str) -> Vec<Message> {
    vec![
        Message::system(
            "You are a friendly real-time analytics assistant for healthcare, IoT and \
             stock data. Reply briefly to greetings and small talk, and invite the user \
             to ask about their data or to set up an alert.",
        ),
        Message::user(message),
    ]
}

// ---------------------------------------------------------------------------
// Condition translation
// ---------------------------------------------------------------------------

/// Convert an alert instruction into a comparison expression.
pub fn condition_translation(instruction: &str, vocabulary: &[&str]) -> Vec<Message> {
    let mut system = format!(
        "Convert the user's alert instruction into a boolean condition.\n\
         - Use only these field names: {fields}\n\
         - Use only the operators >, <, ==, !=, >=, <= combined with and / or and parentheses.\n\
         - Compare fields with numbers or quoted text only.\n",
        fields = vocabulary.join(", "),
    );
    if vocabulary.contains(&"fire_alarm") {
        system.push_str("- fire_alarm is 0 (normal) or 1 (triggered).\n");
    }
    system.push_str("- Output ONLY the expression. Do not explain.");

    vec![
        Message::system(system),
        Message::user(format!("Instruction: {instruction}")),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
