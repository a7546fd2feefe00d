use super::error::FilterError;
use super::filter_where::quote_column;
use super::types::FilterOrderInfo;

pub struct FilterOrder;

impl FilterOrder {
    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(infos.len() + 1);
        for info in infos {
            parts.push(format!("{} {}", quote_column(&info.column)?, info.sort.to_sql()));
        }
        // Stable pagination when the entity order has ties
        if !infos.iter().any(|i| i.column == "id") {
            parts.push("\"id\" ASC".to_string());
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    #[test]
    fn renders_multi_column_order_with_id_tiebreak() {
        let sql = FilterOrder::generate(&[
            FilterOrderInfo::new("type", SortDirection::Asc),
            FilterOrderInfo::new("code", SortDirection::Asc),
        ])
        .unwrap();
        assert_eq!(sql, "ORDER BY \"type\" ASC, \"code\" ASC, \"id\" ASC");
    }

    #[test]
    fn empty_order_is_empty() {
        assert_eq!(FilterOrder::generate(&[]).unwrap(), "");
    }
}
