//! T-SQL text for procedure calls

use dbproc_core::{DbProcError, ProcedureCall, Result};

/// SQL Server accepts at most `server.database.schema.object`
const MAX_NAME_PARTS: usize = 4;

/// Quote a single identifier with brackets, doubling any closing bracket
pub(crate) fn quote_identifier(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// Split a possibly multi-part procedure name and quote each part.
///
/// Parts that are already bracketed are taken as-is (after unescaping), so
/// `[dbo].[Get.Users]` keeps the dot inside the second part.
pub(crate) fn quote_procedure_name(name: &str) -> Result<String> {
    let parts = split_name_parts(name)?;
    if parts.len() > MAX_NAME_PARTS {
        return Err(DbProcError::Execution(format!(
            "procedure name `{}` has more than {} parts",
            name, MAX_NAME_PARTS
        )));
    }
    Ok(parts
        .iter()
        .map(|p| quote_identifier(p))
        .collect::<Vec<_>>()
        .join("."))
}

fn split_name_parts(name: &str) -> Result<Vec<String>> {
    let invalid = |reason: &str| {
        DbProcError::Execution(format!("invalid procedure name `{}`: {}", name, reason))
    };

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracketed = false;
    let mut chars = name.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' if !bracketed && current.is_empty() => bracketed = true,
            ']' if bracketed => {
                if chars.peek() == Some(&']') {
                    chars.next();
                    current.push(']');
                } else {
                    bracketed = false;
                    match chars.peek() {
                        None | Some('.') => {}
                        Some(_) => return Err(invalid("text after closing bracket")),
                    }
                }
            }
            '.' if !bracketed => {
                if current.trim().is_empty() {
                    return Err(invalid("empty name part"));
                }
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if bracketed {
        return Err(invalid("unterminated bracket"));
    }
    if current.trim().is_empty() {
        return Err(invalid("empty name part"));
    }
    parts.push(current);
    Ok(parts)
}

/// Normalize a parameter name to the `@name` form T-SQL expects
pub(crate) fn parameter_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    let valid = !bare.is_empty()
        && bare
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'));
    if !valid {
        return Err(DbProcError::Execution(format!(
            "invalid parameter name `{}`",
            name
        )));
    }
    Ok(format!("@{}", bare))
}

/// Build the `EXEC` statement for a procedure call.
///
/// Values are never inlined: the i-th parameter is bound positionally as
/// `@P{i}`.
pub(crate) fn build_exec_statement(call: &ProcedureCall) -> Result<String> {
    let mut sql = format!("EXEC {}", quote_procedure_name(call.name())?);
    for (idx, param) in call.parameters().iter().enumerate() {
        let separator = if idx == 0 { " " } else { ", " };
        sql.push_str(separator);
        sql.push_str(&format!("{} = @P{}", parameter_name(&param.name)?, idx + 1));
    }
    Ok(sql)
}
