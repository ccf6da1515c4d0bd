use crate::entities::{access_log_entries, documents, link_viewers, links, users, viewer_sessions};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://linklapse.db?mode=rwc".to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(documents::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(links::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(viewer_sessions::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(link_viewers::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(access_log_entries::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        let stmt = builder.build(&stmt);
        let _ = db.execute(stmt).await;
    }

    // Hot paths: token lookup is covered by the unique constraint, the log
    // scan and truncation want (link_id, id)
    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_access_log_link_id ON access_log_entries(link_id, id);"
                .to_string(),
        ))
        .await;
    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_links_document_id ON links(document_id);".to_string(),
        ))
        .await;

    Ok(())
}
