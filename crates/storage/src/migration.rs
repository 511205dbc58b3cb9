use sea_orm::sea_query::{ColumnDef, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use sui_watch_domain::storage::{StorageError, StorageResult};

use crate::entity::monitor;

/// Ensures the registry table exists so a fresh database reports "no
/// accounts" instead of a read error.
pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let monitor_table = Table::create()
        .if_not_exists()
        .table(monitor::Entity)
        .col(
            ColumnDef::new(monitor::Column::Id)
                .string_len(20)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(monitor::Column::Name)
                .string_len(100)
                .not_null(),
        )
        .col(
            ColumnDef::new(monitor::Column::Address)
                .string_len(200)
                .not_null(),
        )
        .col(
            ColumnDef::new(monitor::Column::AudioPath)
                .string_len(200)
                .null(),
        )
        .col(
            ColumnDef::new(monitor::Column::CreatedAt)
                .big_integer()
                .null()
                .default(0),
        )
        .col(
            ColumnDef::new(monitor::Column::UpdatedAt)
                .big_integer()
                .null()
                .default(0),
        )
        .to_owned();
    create_table(db, backend, monitor_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
