//! Keyword classifier for injection-scanner output

use chrono::NaiveDate;

use crate::domain::entities::Finding;
use crate::domain::services::FindingClassifier;
use crate::domain::value_objects::Severity;

const MAX_DESCRIPTION_CHARS: usize = 2000;

pub const NO_INJECTION_DESCRIPTION: &str = "No SQL injection vulnerabilities detected.";

/// Flags output containing both `parameter` and `vulnerable`, the markers
/// sqlmap prints for a confirmed injection point. Negated summaries such as
/// "do not appear to be injectable" stay Info. Produces exactly one finding.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordInjectionClassifier;

impl FindingClassifier for KeywordInjectionClassifier {
    fn classify(&self, output: &str, date: NaiveDate) -> Vec<Finding> {
        let flagged = output.contains("parameter") && output.contains("vulnerable");

        let finding = if flagged {
            Finding {
                title: "SQL Injection".to_string(),
                severity: Severity::High,
                description: output.chars().take(MAX_DESCRIPTION_CHARS).collect(),
                date,
                mitigation: Some(
                    "Use parameterized queries or prepared statements and validate all user input."
                        .to_string(),
                ),
                references: Some(
                    "https://owasp.org/www-community/attacks/SQL_Injection".to_string(),
                ),
            }
        } else {
            Finding {
                title: "SQL Injection scan".to_string(),
                severity: Severity::Info,
                description: NO_INJECTION_DESCRIPTION.to_string(),
                date,
                mitigation: None,
                references: None,
            }
        };

        vec![finding]
    }
}
