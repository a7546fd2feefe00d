use super::error::FilterError;
use super::types::{Condition, FilterWhereOptions, SqlParam};

/// Renders a `Condition` tree into a parameterized WHERE clause.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        where_data: Option<&Condition>,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data, options)
    }

    fn build(
        &mut self,
        where_data: Option<&Condition>,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut sql_conditions = vec![];
        if !options.include_inactive {
            sql_conditions.push("\"is_active\" = true".to_string());
        }
        if let Some(condition) = where_data {
            sql_conditions.push(self.render(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn render(&mut self, condition: &Condition) -> Result<String, FilterError> {
        match condition {
            Condition::Field { column, op, value } => {
                let quoted = quote_column(column)?;
                let placeholder = self.param(value.clone());
                Ok(format!("{} {} {}", quoted, op.to_sql(), placeholder))
            }
            Condition::Columns { left, op, right } => Ok(format!(
                "{} {} {}",
                quote_column(left)?,
                op.to_sql(),
                quote_column(right)?
            )),
            Condition::In { column, values } => {
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                let quoted = quote_column(column)?;
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                Ok(format!("{} IN ({})", quoted, params.join(", ")))
            }
            Condition::JsonContains { column, value } => {
                let quoted = quote_column(column)?;
                let placeholder = self.param(SqlParam::Json(value.clone()));
                Ok(format!("{} @> {}", quoted, placeholder))
            }
            Condition::And(parts) => self.render_group(parts, " AND ", "1=1"),
            Condition::Or(parts) => self.render_group(parts, " OR ", "1=0"),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.render(inner)?)),
        }
    }

    fn render_group(&mut self, parts: &[Condition], joiner: &str, empty: &str) -> Result<String, FilterError> {
        if parts.is_empty() {
            return Ok(empty.to_string());
        }
        let mut rendered = Vec::with_capacity(parts.len());
        for part in parts {
            rendered.push(format!("({})", self.render(part)?));
        }
        Ok(format!("({})", rendered.join(joiner)))
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Identifiers must be plain snake_case; they come from static entity specs.
pub fn validate_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn quote_column(name: &str) -> Result<String, FilterError> {
    if !validate_identifier(name) {
        return Err(FilterError::InvalidColumn(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::FilterOp;

    fn render(c: Condition) -> (String, Vec<SqlParam>) {
        FilterWhere::generate(Some(&c), 0, &FilterWhereOptions::default()).unwrap()
    }

    #[test]
    fn empty_filter_only_keeps_active_rows() {
        let (sql, params) = FilterWhere::generate(None, 0, &FilterWhereOptions::default()).unwrap();
        assert_eq!(sql, "\"is_active\" = true");
        assert!(params.is_empty());
    }

    #[test]
    fn include_inactive_drops_soft_delete_guard() {
        let options = FilterWhereOptions { include_inactive: true };
        let (sql, _) = FilterWhere::generate(None, 0, &options).unwrap();
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn or_of_contains_numbers_params_in_order() {
        let (sql, params) = render(Condition::Or(vec![
            Condition::contains("first_name", "ann"),
            Condition::contains("email", "ann"),
        ]));
        assert_eq!(
            sql,
            "\"is_active\" = true AND ((\"first_name\" ILIKE $1) OR (\"email\" ILIKE $2))"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn column_comparison_binds_nothing() {
        let (sql, params) = render(Condition::columns("current_stock", FilterOp::Lte, "min_stock"));
        assert_eq!(sql, "\"is_active\" = true AND \"current_stock\" <= \"min_stock\"");
        assert!(params.is_empty());
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, _) = FilterWhere::generate(
            Some(&Condition::eq("status", "open")),
            3,
            &FilterWhereOptions { include_inactive: true },
        )
        .unwrap();
        assert_eq!(sql, "\"status\" = $4");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, _) = render(Condition::is_in("status", vec![]));
        assert!(sql.ends_with("1=0"));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let err = FilterWhere::generate(
            Some(&Condition::eq("name\"; DROP TABLE users; --", "x")),
            0,
            &FilterWhereOptions::default(),
        );
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
        assert!(validate_identifier("serial_number"));
        assert!(!validate_identifier("SerialNumber"));
        assert!(!validate_identifier("1abc"));
    }
}
