use std::fmt::Write as _;

use summary_flow::{Reply, StructuredSummary};

/// Plain-text rendering of a reply for terminal output.
pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::Summary(summary) => render_summary(summary),
        Reply::Answer { text, truncated } => {
            if *truncated {
                format!("{text}\n\n[answer cut short by the token limit]")
            } else {
                text.clone()
            }
        }
        Reply::Degraded {
            raw_text,
            reason,
            attempts,
            ..
        } => {
            let mut out = format!(
                "[unstructured output: {reason}, after {attempts} attempt(s)]\n"
            );
            if raw_text.trim().is_empty() {
                out.push_str("(the model returned no text)");
            } else {
                out.push_str(raw_text.trim());
            }
            out
        }
    }
}

pub fn render_summary(summary: &StructuredSummary) -> String {
    let mut out = String::new();

    out.push_str("Key takeaways\n");
    for takeaway in &summary.key_takeaways {
        let _ = writeln!(out, "  - {takeaway}");
    }

    if !summary.medications.is_empty() {
        out.push_str("\nMedications\n");
        for medication in &summary.medications {
            let _ = write!(out, "  - {}", medication.name);
            if !medication.explanation.is_empty() {
                let _ = write!(out, ": {}", medication.explanation);
            }
            out.push('\n');
            if let Some(dosage) = &medication.dosage {
                let _ = writeln!(out, "      dosage: {dosage}");
            }
            if let Some(administration) = &medication.administration {
                let _ = writeln!(out, "      how to take: {administration}");
            }
        }
    }

    if !summary.term_definitions.is_empty() {
        out.push_str("\nTerms\n");
        for (term, definition) in &summary.term_definitions {
            let _ = writeln!(out, "  - {term}: {definition}");
        }
    }

    if !summary.follow_up_questions.is_empty() {
        out.push_str("\nQuestions for your provider\n");
        for question in &summary.follow_up_questions {
            let _ = writeln!(out, "  - {question}");
        }
    }

    out
}
