use sqlx::{postgres::PgRow, FromRow, PgConnection};

use crate::database::manager::DatabaseError;
use crate::filter::types::{SqlParam, SqlResult};
use crate::filter::{Filter, FilterData};

/// Binds a typed `SqlParam` onto any sqlx query flavour (query, query_as, query_scalar).
macro_rules! bind_sql_param {
    ($q:expr, $param:expr) => {
        match $param {
            SqlParam::Text(v) => $q.bind(v.clone()),
            SqlParam::Uuid(v) => $q.bind(*v),
            SqlParam::Bool(v) => $q.bind(*v),
            SqlParam::Int(v) => $q.bind(*v),
            SqlParam::Date(v) => $q.bind(*v),
            SqlParam::Timestamp(v) => $q.bind(*v),
            SqlParam::Json(v) => $q.bind(sqlx::types::Json(v.clone())),
        }
    };
}

pub(crate) use bind_sql_param;

pub struct QueryBuilder<T> {
    table_name: String,
    filter: Option<Filter>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        Filter::new(&name)?;
        Ok(Self {
            table_name: name,
            filter: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        let mut filter = Filter::new(&self.table_name)?;
        filter.assign(filter_data)?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub async fn select_all(self, conn: &mut PgConnection) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        log_query(&sql_result);
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_all(&mut *conn).await?)
    }

    pub async fn select_optional(self, conn: &mut PgConnection) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        log_query(&sql_result);
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_optional(&mut *conn).await?)
    }

    pub async fn count(self, conn: &mut PgConnection) -> Result<i64, DatabaseError> {
        let sql_result = match self.filter {
            Some(filter) => filter.to_count_sql()?,
            None => Filter::new(&self.table_name)?.to_count_sql()?,
        };
        log_query(&sql_result);
        let mut q = sqlx::query_scalar::<_, i64>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_one(&mut *conn).await?)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        match &self.filter {
            Some(filter) => Ok(filter.to_sql()?),
            None => Ok(Filter::new(&self.table_name)?.to_sql()?),
        }
    }
}

fn log_query(sql: &SqlResult) {
    if crate::config::CONFIG.list.debug_logging {
        tracing::debug!(query = %sql.query, params = sql.params.len(), "list query");
    }
}
