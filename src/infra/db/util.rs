use crate::application::repos::CatalogError;

pub fn map_sqlx_error(err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::PoolTimedOut => CatalogError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            CatalogError::Timeout
        }
        sqlx::Error::Database(db) => CatalogError::query(db.message()),
        other @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            CatalogError::Decode(other.to_string())
        }
        other @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed) => {
            CatalogError::transport(other)
        }
        other => CatalogError::query(other),
    }
}
