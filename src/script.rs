use log::error;

use crate::{
    error::Result,
    sql::{
        engine::{Engine, Session},
        executor::ResultSet,
    },
};

/// One executed statement and what came of it
#[derive(Debug)]
pub struct StatementOutcome {
    pub sql: String,
    pub result: Result<ResultSet>,
}

/// Per-statement outcomes of a script run, in execution order
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub outcomes: Vec<StatementOutcome>,
}

impl ScriptReport {
    /// True when every statement succeeded
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Splits script text into statements on semicolons outside single-quoted
/// strings. Line comments (--) are stripped, blank statements are dropped,
/// and each statement keeps its terminating semicolon. A trailing chunk
/// without one still comes out as a statement.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            '-' if !in_string && chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' if !in_string => {
                current.push(';');
                let stmt = current.trim();
                if stmt != ";" {
                    statements.push(stmt.to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(format!("{};", tail));
    }
    statements
}

/// Runs every statement of the script in order. A failed statement is
/// logged and recorded, then the run continues; nothing is retried.
pub fn run_script<E: Engine + 'static>(session: &mut Session<E>, text: &str) -> ScriptReport {
    let mut report = ScriptReport::default();
    for sql in split_statements(text) {
        let result = session.execute(&sql);
        if let Err(err) = &result {
            error!("statement failed: {} ({})", err, sql);
        }
        report.outcomes.push(StatementOutcome { sql, result });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sql::{engine::kv::KVEngine, types::Value},
        storage::memory::MemoryEngine,
    };

    #[test]
    fn test_split_statements() {
        let text = "\
-- analysis script
CREATE TABLE t (a INT);

INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);
SELECT * FROM t -- inline comment
WHERE a > 0;
";
        assert_eq!(
            split_statements(text),
            vec![
                "CREATE TABLE t (a INT);",
                "INSERT INTO t VALUES (1);",
                "INSERT INTO t VALUES (2);",
                "SELECT * FROM t \nWHERE a > 0;",
            ]
        );
    }

    #[test]
    fn test_split_statements_quoted_semicolon() {
        let text = "INSERT INTO t VALUES ('a;b');SELECT 'x--y' FROM t";
        assert_eq!(
            split_statements(text),
            vec![
                "INSERT INTO t VALUES ('a;b');",
                "SELECT 'x--y' FROM t;",
            ]
        );
    }

    #[test]
    fn test_run_script_continues_after_error() -> Result<()> {
        let engine = KVEngine::new(MemoryEngine::new());
        let mut session = engine.session()?;
        let report = run_script(
            &mut session,
            "create table t (a int);\n\
             insert into t values (1);\n\
             select * from missing;\n\
             select a from t;",
        );
        assert_eq!(report.outcomes.len(), 4);
        assert!(!report.all_ok());
        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[2].result.is_err());

        // the statement after the failure still ran
        match &report.outcomes[3].result {
            Ok(ResultSet::Scan { rows, .. }) => {
                assert_eq!(rows, &vec![vec![Value::Integer(1)]]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        Ok(())
    }
}
